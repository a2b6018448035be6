use crate::config::ServerConfig;
use crate::core_admin::{AdminError, AdminOutput, Console};
use crate::server::{ControlError, ServerController};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

fn console(root: &Path) -> Console {
    let config = ServerConfig {
        listen_port: 0,
        bind_address: "127.0.0.1".into(),
        root_path: root.to_path_buf(),
        users_file: None,
        bcrypt_cost: 4,
        ..ServerConfig::default()
    };
    Console::new(Arc::new(ServerController::from_config(config).unwrap()))
}

async fn run(console: &Console, line: &str) -> String {
    console
        .execute_line(line)
        .await
        .unwrap()
        .map(|output| output.to_string())
        .unwrap_or_default()
}

/// Logs in over a fresh control connection and returns the PASS reply code.
async fn try_login(addr: SocketAddr, user: &str, password: &str) -> String {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();

    for command in [format!("USER {}", user), format!("PASS {}", password)] {
        writer
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
    }
    line[..3].to_string()
}

#[tokio::test]
async fn test_add_authenticate_delete() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());
    let started = run(&console, "start-server").await;
    assert!(started.starts_with("Server started on"));
    let addr = console.controller().local_addr().unwrap();

    assert_eq!(
        run(&console, "add-user carol pa55 /").await,
        "User carol added with home /"
    );
    assert_eq!(try_login(addr, "carol", "pa55").await, "230");

    assert_eq!(run(&console, "delete-user carol").await, "User carol deleted");
    assert_eq!(try_login(addr, "carol", "pa55").await, "530");

    run(&console, "stop").await;
}

#[tokio::test]
async fn test_modify_and_disable_user() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());
    run(&console, "start").await;
    let addr = console.controller().local_addr().unwrap();

    run(&console, "adduser dave first").await;
    run(&console, "moduser dave second").await;
    assert_eq!(try_login(addr, "dave", "first").await, "530");
    assert_eq!(try_login(addr, "dave", "second").await, "230");

    run(&console, "modify-user dave enabled=no").await;
    assert_eq!(try_login(addr, "dave", "second").await, "530");
    assert!(run(&console, "list-users").await.contains("dave"));

    run(&console, "stop").await;
}

#[tokio::test]
async fn test_user_errors_are_reported() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());
    run(&console, "add-user erin x").await;

    let duplicate = console.execute_line("add-user erin y").await.unwrap_err();
    assert!(matches!(duplicate, AdminError::Control(ControlError::User(_))));
    let missing = console.execute_line("delete-user nobody").await.unwrap_err();
    assert!(matches!(missing, AdminError::Control(ControlError::User(_))));
    let invalid = console.execute_line("add-user bad/name x").await.unwrap_err();
    assert!(matches!(invalid, AdminError::Control(ControlError::User(_))));
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());

    let err = console.execute_line("stop").await.unwrap_err();
    assert!(matches!(err, AdminError::Control(ControlError::NotRunning)));

    run(&console, "start").await;
    let err = console.execute_line("start").await.unwrap_err();
    assert!(matches!(err, AdminError::Control(ControlError::AlreadyRunning)));
    let err = console.execute_line("dir /tmp").await.unwrap_err();
    assert!(matches!(err, AdminError::Control(ControlError::ServerRunning)));
    let err = console.execute_line("kick-client 999").await.unwrap_err();
    assert!(matches!(
        err,
        AdminError::Control(ControlError::ClientNotFound(999))
    ));
    run(&console, "stop").await;
}

#[tokio::test]
async fn test_status_clients_and_limits() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());
    assert!(run(&console, "status").await.contains("Status: stopped"));
    assert_eq!(run(&console, "listcon").await, "No clients connected");

    assert_eq!(run(&console, "maxconnect 3").await, "Max connections set to 3");
    assert_eq!(run(&console, "maxconnect").await, "Current max connections: 3");
    assert!(console.execute_line("maxconnect 0").await.is_err());

    run(&console, "start").await;
    let status = run(&console, "status").await;
    assert!(status.contains("Status: running"));
    assert!(status.contains("Active connections: 0/3"));
    run(&console, "stop").await;
}

#[tokio::test]
async fn test_logs_toggle_clear_and_save() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());
    let events = Arc::clone(console.controller().events());

    run(&console, "status").await;
    assert!(events.lines().iter().any(|l| l.contains("ADMIN status")));

    run(&console, "log clear").await;
    assert!(events.lines().is_empty());

    run(&console, "log off").await;
    run(&console, "status").await;
    assert!(!events.lines().iter().any(|l| l.contains("ADMIN status")));

    run(&console, "log on").await;
    run(&console, "adduser frank secret").await;
    let lines = events.lines();
    assert!(lines.iter().any(|l| l.contains("add-user frank ****")));
    assert!(!lines.iter().any(|l| l.contains("secret")));

    let out = root.path().join("events.log");
    let saved = run(&console, &format!("save-logs {}", out.display())).await;
    assert!(saved.starts_with("Saved"));
    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.contains("ADMIN"));
}

#[tokio::test]
async fn test_help_exit_and_unknown() {
    let root = tempfile::tempdir().unwrap();
    let console = console(root.path());
    assert!(run(&console, "help").await.contains("kick-client"));
    assert!(matches!(
        console.execute_line("exit").await.unwrap(),
        Some(AdminOutput::Exit)
    ));
    assert!(console.execute_line("").await.unwrap().is_none());
    assert!(matches!(
        console.execute_line("launch").await,
        Err(AdminError::UnknownCommand(_))
    ));
}

#[tokio::test]
async fn test_user_changes_leave_the_runtime_free() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        root_path: root.path().to_path_buf(),
        users_file: Some(root.path().join("users.toml")),
        bcrypt_cost: 10,
        ..ServerConfig::default()
    };
    let console = Console::new(Arc::new(ServerController::from_config(config).unwrap()));

    // Single-threaded runtime: the ticker only advances if the console yields
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let ticker = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(1)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    run(&console, "add-user gina pw").await;
    run(&console, "modify-user gina pw2").await;
    ticker.abort();

    assert!(ticks.load(Ordering::SeqCst) > 0);
    assert!(root.path().join("users.toml").exists());
}

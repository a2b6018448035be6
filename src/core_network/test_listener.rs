// End-to-end scenarios over real sockets on 127.0.0.1
use crate::config::ServerConfig;
use crate::server::ServerController;
use crate::state::ServerStatus;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Reads one reply line, or "" on end of stream.
    async fn reply(&mut self) -> String {
        let mut line = String::new();
        timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("reply timed out")
            .unwrap();
        line.trim_end().to_string()
    }

    async fn command(&mut self, line: &str) -> String {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
        self.reply().await
    }

    async fn login(&mut self, user: &str, password: &str) {
        assert!(self.reply().await.starts_with("220"));
        assert!(self.command(&format!("USER {}", user)).await.starts_with("331"));
        assert!(self.command(&format!("PASS {}", password)).await.starts_with("230"));
    }

    async fn pasv(&mut self) -> SocketAddr {
        let reply = self.command("PASV").await;
        assert!(reply.starts_with("227"), "{}", reply);
        let inner = &reply[reply.find('(').unwrap() + 1..reply.find(')').unwrap()];
        let n: Vec<u16> = inner.split(',').map(|p| p.parse().unwrap()).collect();
        SocketAddr::from((
            [n[0] as u8, n[1] as u8, n[2] as u8, n[3] as u8],
            n[4] * 256 + n[5],
        ))
    }
}

fn controller(root: &Path, max_connections: usize) -> ServerController {
    let config = ServerConfig {
        listen_port: 0,
        bind_address: "127.0.0.1".into(),
        pasv_address: "127.0.0.1".into(),
        root_path: root.to_path_buf(),
        max_connections,
        users_file: None,
        bcrypt_cost: 4,
        grace_period_secs: 1,
        ..ServerConfig::default()
    };
    let controller = ServerController::from_config(config).unwrap();
    controller.users().add("alice", "secret", "/").unwrap();
    controller
}

async fn wait_for_sessions(controller: &ServerController, count: usize) {
    timeout(WAIT, async {
        while controller.list_clients().len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session count never reached");
}

#[tokio::test]
async fn test_third_connection_over_capacity_gets_421() {
    let root = tempfile::tempdir().unwrap();
    let controller = controller(root.path(), 2);
    let addr = controller.start().await.unwrap();

    let mut first = Client::connect(addr).await;
    let mut second = Client::connect(addr).await;
    assert!(first.reply().await.starts_with("220"));
    assert!(second.reply().await.starts_with("220"));

    let mut third = Client::connect(addr).await;
    assert_eq!(third.reply().await, "421 Too many connections, try again later.");
    assert_eq!(third.reply().await, "");

    let status = controller.status();
    assert_eq!(status.active_connection_count, 2);
    assert_eq!(status.status, ServerStatus::Running);

    // A freed slot is usable again
    assert!(first.command("QUIT").await.starts_with("221"));
    wait_for_sessions(&controller, 1).await;
    let mut fourth = Client::connect(addr).await;
    assert!(fourth.reply().await.starts_with("220"));

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_kicked_client_is_gone_from_list() {
    let root = tempfile::tempdir().unwrap();
    let controller = controller(root.path(), 5);
    let addr = controller.start().await.unwrap();

    let mut client = Client::connect(addr).await;
    client.login("alice", "secret").await;
    let mut other = Client::connect(addr).await;
    assert!(other.reply().await.starts_with("220"));
    wait_for_sessions(&controller, 2).await;

    let clients = controller.list_clients();
    let alice = clients
        .iter()
        .find(|c| c.username.as_deref() == Some("alice"))
        .unwrap()
        .connection_id;

    controller.kick_client(alice).unwrap();
    assert!(!controller
        .list_clients()
        .iter()
        .any(|c| c.connection_id == alice));
    assert_eq!(client.reply().await, "421 Disconnected by administrator.");
    assert_eq!(client.reply().await, "");

    // The other session is untouched
    assert!(other.command("NOOP").await.starts_with("200"));
    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_with_transfer_in_progress_leaves_no_session() {
    let root = tempfile::tempdir().unwrap();
    let controller = controller(root.path(), 5);
    let addr = controller.start().await.unwrap();

    let mut idle = Client::connect(addr).await;
    idle.login("alice", "secret").await;

    // An upload whose data connection stays open without finishing
    let mut busy = Client::connect(addr).await;
    busy.login("alice", "secret").await;
    let data_addr = busy.pasv().await;
    busy.writer.write_all(b"STOR partial.bin\r\n").await.unwrap();
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    assert!(busy.reply().await.starts_with("150"));
    data.write_all(&[1u8; 512]).await.unwrap();
    wait_for_sessions(&controller, 2).await;

    timeout(WAIT, controller.stop()).await.unwrap().unwrap();

    assert_eq!(controller.list_clients().len(), 0);
    assert_eq!(controller.status().status, ServerStatus::Stopped);
    assert_eq!(idle.reply().await, "421 Server shutting down.");
    assert!(busy.reply().await.starts_with("426"));
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_transfers_add_to_byte_counter() {
    let root = tempfile::tempdir().unwrap();
    let controller = controller(root.path(), 5);
    let addr = controller.start().await.unwrap();

    let mut client = Client::connect(addr).await;
    client.login("alice", "secret").await;
    assert!(client.command("TYPE I").await.starts_with("200"));

    let payload = vec![42u8; 1000];
    let data_addr = client.pasv().await;
    client.writer.write_all(b"STOR up.bin\r\n").await.unwrap();
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    assert!(client.reply().await.starts_with("150"));
    data.write_all(&payload).await.unwrap();
    drop(data);
    assert!(client.reply().await.starts_with("226"));
    assert_eq!(std::fs::read(root.path().join("up.bin")).unwrap(), payload);

    let data_addr = client.pasv().await;
    client.writer.write_all(b"RETR up.bin\r\n").await.unwrap();
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    assert!(client.reply().await.starts_with("150"));
    let mut received = Vec::new();
    data.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, payload);
    assert!(client.reply().await.starts_with("226"));

    let status = controller.status();
    assert_eq!(status.bytes_transferred_total, 2000);
    assert_eq!(status.uploads, 1);
    assert_eq!(status.downloads, 1);

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_session_survives_errors() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("pub")).unwrap();
    let controller = controller(root.path(), 5);
    let addr = controller.start().await.unwrap();

    let mut client = Client::connect(addr).await;
    assert!(client.reply().await.starts_with("220"));
    assert!(client.command("PWD").await.starts_with("530"));
    assert!(client.command("USER alice").await.starts_with("331"));
    assert!(client.command("PASS wrong").await.starts_with("530"));
    assert!(client.command("USER alice").await.starts_with("331"));
    assert!(client.command("PASS secret").await.starts_with("230"));

    assert!(client.command("CWD pub").await.starts_with("250"));
    assert!(client.command("CWD ../../etc").await.starts_with("550"));
    assert_eq!(client.command("PWD").await, "257 \"/pub\" is the current directory.");
    assert!(client.command("XYZZY").await.starts_with("502"));
    assert!(client.command("RETR").await.starts_with("501"));
    assert!(client.command("NOOP").await.starts_with("200"));

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_non_utf8_line_ends_session() {
    let root = tempfile::tempdir().unwrap();
    let controller = controller(root.path(), 5);
    let addr = controller.start().await.unwrap();

    let mut client = Client::connect(addr).await;
    assert!(client.reply().await.starts_with("220"));
    client.writer.write_all(b"USER \xff\xfe\r\n").await.unwrap();
    assert!(client.reply().await.starts_with("500"));
    assert_eq!(client.reply().await, "");
    wait_for_sessions(&controller, 0).await;

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_idle_session_times_out() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        listen_port: 0,
        bind_address: "127.0.0.1".into(),
        root_path: root.path().to_path_buf(),
        users_file: None,
        bcrypt_cost: 4,
        idle_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let controller = ServerController::from_config(config).unwrap();
    let addr = controller.start().await.unwrap();

    let mut client = Client::connect(addr).await;
    assert!(client.reply().await.starts_with("220"));
    assert!(client.reply().await.starts_with("421"));
    wait_for_sessions(&controller, 0).await;

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_after_stop() {
    let root = tempfile::tempdir().unwrap();
    let controller = controller(root.path(), 5);
    controller.start().await.unwrap();
    controller.stop().await.unwrap();

    let addr = controller.start().await.unwrap();
    let mut client = Client::connect(addr).await;
    assert!(client.reply().await.starts_with("220"));
    controller.stop().await.unwrap();
}

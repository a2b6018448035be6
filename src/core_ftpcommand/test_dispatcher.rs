// Command dispatch against a temporary root, without sockets
use crate::config::ServerConfig;
use crate::core_auth::UserStore;
use crate::core_fs::Jail;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::{dispatch, CommandContext};
use crate::core_ftpcommand::reply::Reply;
use crate::core_log::EventLog;
use crate::core_network::data_channel::DataChannel;
use crate::session::Session;
use crate::state::ServerState;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
    root: TempDir,
    session: Session,
    state: Arc<ServerState>,
    users: Arc<UserStore>,
    jail: Jail,
    config: ServerConfig,
    events: EventLog,
    cancel: CancellationToken,
    out: Vec<u8>,
}

impl Harness {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("bob")).unwrap();
        std::fs::create_dir(root.path().join("pub")).unwrap();
        std::fs::write(root.path().join("a.txt"), b"hello world").unwrap();

        let users = UserStore::in_memory(4).unwrap();
        users.add("alice", "secret", "/").unwrap();
        users.add("bob", "hunter2", "/bob").unwrap();

        let jail = Jail::new(root.path()).unwrap();
        Self {
            session: Session::new(1, "127.0.0.1:50000".parse().unwrap()),
            state: Arc::new(ServerState::new(10)),
            users: Arc::new(users),
            jail,
            config: ServerConfig::default(),
            events: EventLog::default(),
            cancel: CancellationToken::new(),
            out: Vec::new(),
            root,
        }
    }

    async fn run(&mut self, line: &str) -> Reply {
        let command = match FtpCommand::parse(line) {
            Ok(command) => command,
            Err(e) => return Reply::from_response(&e.to_ftp_response()),
        };
        let mut ctx = CommandContext {
            writer: &mut self.out,
            session: &mut self.session,
            state: &self.state,
            users: &self.users,
            jail: &self.jail,
            config: &self.config,
            events: &self.events,
            cancel: &self.cancel,
        };
        dispatch(&mut ctx, command).await
    }

    async fn login(&mut self, user: &str, password: &str) {
        assert_eq!(self.run(&format!("USER {}", user)).await.code, 331);
        assert_eq!(self.run(&format!("PASS {}", password)).await.code, 230);
    }
}

#[tokio::test]
async fn test_commands_need_login() {
    let mut h = Harness::new();
    for line in ["PWD", "CWD pub", "RETR a.txt", "LIST", "PASV", "DELE a.txt"] {
        assert_eq!(h.run(line).await.code, 530, "{}", line);
    }
    assert_eq!(h.run("NOOP").await.code, 200);
    assert_eq!(h.run("SYST").await.to_string(), "215 UNIX Type: L8\r\n");
    assert_eq!(h.run("TYPE I").await.code, 200);
    assert!(h.root.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_login_sequence() {
    let mut h = Harness::new();
    assert_eq!(h.run("PASS secret").await.code, 503);
    assert_eq!(h.run("USER alice").await.code, 331);
    assert_eq!(h.run("PASS wrong").await.code, 530);
    assert!(!h.session.is_authenticated());

    // Unknown users get the same reply as wrong passwords
    assert_eq!(h.run("USER mallory").await.code, 331);
    let unknown = h.run("PASS secret").await;
    assert_eq!(unknown.to_string(), "530 Login incorrect.\r\n");

    h.login("alice", "secret").await;
    assert_eq!(h.session.username(), Some("alice"));
}

#[tokio::test]
async fn test_cwd_escape_leaves_state_intact() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;
    assert_eq!(h.run("CWD pub").await.code, 250);

    assert_eq!(h.run("CWD ../../etc").await.code, 550);
    assert_eq!(h.session.current_dir, "/pub");
    assert_eq!(h.run("CWD /missing").await.code, 550);
    assert_eq!(h.run("CDUP").await.code, 250);
    assert_eq!(h.session.current_dir, "/");
}

#[tokio::test]
async fn test_home_restriction() {
    let mut h = Harness::new();
    h.login("bob", "hunter2").await;
    assert_eq!(h.session.current_dir, "/bob");

    assert_eq!(h.run("CWD /").await.code, 550);
    assert_eq!(h.run("RETR /a.txt").await.code, 550);
    assert_eq!(h.run("CDUP").await.code, 550);
    assert_eq!(h.session.current_dir, "/bob");
    assert_eq!(h.run("MKD inbox").await.code, 257);
    assert!(h.root.path().join("bob/inbox").is_dir());
}

#[tokio::test]
async fn test_unknown_verb_keeps_session() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;
    assert_eq!(h.run("SITE CHMOD 777 a.txt").await.code, 502);
    assert_eq!(h.run("RETR").await.code, 501);
    assert_eq!(h.run("PORT 1,2,3").await.code, 501);
    assert!(h.session.is_authenticated());
    assert_eq!(h.run("PWD").await.code, 257);
}

#[tokio::test]
async fn test_rename_sequence() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;

    assert_eq!(h.run("RNTO b.txt").await.code, 503);

    assert_eq!(h.run("RNFR a.txt").await.code, 350);
    assert_eq!(h.run("NOOP").await.code, 200);
    assert_eq!(h.run("RNTO b.txt").await.code, 503);

    assert_eq!(h.run("RNFR a.txt").await.code, 350);
    assert_eq!(h.run("RNTO pub/b.txt").await.code, 250);
    assert!(!h.root.path().join("a.txt").exists());
    assert!(h.root.path().join("pub/b.txt").exists());

    assert_eq!(h.run("RNFR missing.txt").await.code, 550);
}

#[tokio::test]
async fn test_directory_and_file_operations() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;

    assert_eq!(h.run("SIZE a.txt").await.to_string(), "213 11\r\n");
    assert_eq!(h.run("SIZE pub").await.code, 550);

    let mkd = h.run("MKD new").await;
    assert_eq!(mkd.to_string(), "257 \"/new\" directory created.\r\n");
    assert_eq!(h.run("MKD new").await.code, 550);
    assert_eq!(h.run("MKD ../outside").await.code, 550);

    assert_eq!(h.run("DELE new").await.code, 550);
    assert_eq!(h.run("RMD new").await.code, 250);
    assert!(!h.root.path().join("new").exists());
    assert_eq!(h.run("RMD /").await.code, 550);

    assert_eq!(h.run("DELE a.txt").await.code, 250);
    assert_eq!(h.run("DELE a.txt").await.code, 550);
}

#[tokio::test]
async fn test_transfer_without_data_connection() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;
    assert_eq!(h.run("RETR a.txt").await.code, 425);
    assert_eq!(h.run("STOR b.txt").await.code, 425);
    assert_eq!(h.run("RETR missing.txt").await.code, 550);
    // Nothing preliminary was sent
    assert!(h.out.is_empty());
}

#[tokio::test]
async fn test_rest_applies_to_next_transfer_only() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;
    assert_eq!(h.run("REST 5").await.code, 350);
    assert_eq!(h.session.restart_offset, 5);
    assert_eq!(h.run("RETR a.txt").await.code, 425);
    assert_eq!(h.session.restart_offset, 0);
    assert_eq!(h.run("REST x").await.code, 501);
}

#[tokio::test]
async fn test_anonymous_is_read_only() {
    let mut h = Harness::new();
    h.state.set_allow_anonymous(true);
    h.login("anonymous", "guest@example.com").await;
    assert_eq!(h.session.current_dir, "/");

    assert_eq!(h.run("CWD pub").await.code, 250);
    assert_eq!(h.run("MKD x").await.code, 550);
    assert_eq!(h.run("STOR x.txt").await.code, 550);
    assert_eq!(h.run("DELE /a.txt").await.code, 550);
    assert_eq!(h.run("RNFR /a.txt").await.code, 550);
    assert_eq!(h.run("SIZE /a.txt").await.code, 213);
}

#[tokio::test]
async fn test_anonymous_refused_when_disabled() {
    let mut h = Harness::new();
    assert_eq!(h.run("USER anonymous").await.code, 331);
    assert_eq!(h.run("PASS guest").await.code, 530);
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn test_feat_and_quit() {
    let mut h = Harness::new();
    let feat = h.run("FEAT").await;
    assert_eq!(feat.code, 211);
    assert!(feat.lines.iter().any(|l| l == "SIZE"));

    assert_eq!(h.run("QUIT").await.code, 221);
    assert!(h.session.is_terminated());
}

#[tokio::test]
async fn test_commands_are_logged_without_password() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;
    let lines = h.events.lines();
    assert!(lines.iter().any(|l| l.contains("COMMAND #1 [-] USER alice")));
    assert!(lines.iter().any(|l| l.contains("PASS ****")));
    assert!(!lines.iter().any(|l| l.contains("secret")));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dele_and_rename_act_on_the_link_itself() {
    let mut h = Harness::new();
    let root = h.root.path().to_path_buf();
    std::os::unix::fs::symlink(root.join("a.txt"), root.join("pub/link")).unwrap();
    std::os::unix::fs::symlink(root.join("bob"), root.join("pub/dirlink")).unwrap();
    h.login("alice", "secret").await;

    assert_eq!(h.run("RNFR pub/link").await.code, 350);
    assert_eq!(h.run("RNTO pub/renamed").await.code, 250);
    assert!(std::fs::symlink_metadata(root.join("pub/renamed"))
        .unwrap()
        .file_type()
        .is_symlink());
    assert!(root.join("a.txt").is_file());

    assert_eq!(h.run("DELE pub/renamed").await.code, 250);
    assert!(std::fs::symlink_metadata(root.join("pub/renamed")).is_err());
    assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"hello world");

    // A link to a directory is not a directory for RMD
    assert_eq!(h.run("RMD pub/dirlink").await.code, 550);
    assert!(root.join("bob").is_dir());
    assert_eq!(h.run("DELE pub/dirlink").await.code, 250);
    assert!(root.join("bob").is_dir());
}

#[tokio::test]
async fn test_cancelled_session_sends_no_preliminary_reply() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;
    h.session.data_channel = Some(DataChannel::Active("127.0.0.1:9".parse().unwrap()));
    h.cancel.cancel();

    assert_eq!(h.run("RETR a.txt").await.code, 426);
    assert!(h.out.is_empty());
}

#[tokio::test]
async fn test_port_only_targets_the_client_host() {
    let mut h = Harness::new();
    h.login("alice", "secret").await;

    assert_eq!(h.run("PORT 10,0,0,1,4,1").await.code, 501);
    assert!(h.session.data_channel.is_none());
    assert_eq!(h.run("PORT 127,0,0,1,4,1").await.code, 200);
    assert!(matches!(
        h.session.data_channel,
        Some(DataChannel::Active(addr)) if addr.port() == 1025
    ));
}

#[tokio::test]
async fn test_opts_utf8_and_idle_abor() {
    let mut h = Harness::new();
    assert_eq!(h.run("OPTS UTF8 ON").await.to_string(), "200 UTF8 mode enabled.\r\n");
    assert_eq!(h.run("opts utf8 on").await.code, 200);
    assert_eq!(h.run("OPTS MLST type").await.code, 501);
    assert_eq!(h.run("OPTS").await.code, 501);

    h.login("alice", "secret").await;
    assert_eq!(h.run("REST 4").await.code, 350);
    h.session.data_channel = Some(DataChannel::Active("127.0.0.1:9".parse().unwrap()));
    assert_eq!(h.run("ABOR").await.code, 226);
    assert!(h.session.data_channel.is_none());
    assert_eq!(h.session.restart_offset, 0);
}

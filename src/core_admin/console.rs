use crate::core_admin::command::AdminCommand;
use crate::core_admin::error::AdminError;
use crate::core_auth::User;
use crate::core_log::LogEvent;
use crate::core_network::ClientInfo;
use crate::server::{ControlError, ServerController};
use crate::state::StatusReport;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_LOG_FILE: &str = "gestorftpd.log";

const HELP: &str = "Available commands:
  start-server, start            Start the server
  stop-server, stop              Stop the server
  status                         Show the server status
  set-root, dir [path]           Show or change the served root (stopped only)
  set-port <port>                Change the listening port (stopped only)
  set-max-connections, maxconnect [n]
                                 Show or change the connection limit
  list-clients, listcon          List connected clients
  kick-client, desuser <id>      Disconnect a client
  add-user, adduser <name> <password> [home]
                                 Add a user
  modify-user, moduser <name> <password>
  modify-user <name> [password=..] [home=..] [enabled=yes|no]
                                 Modify a user
  list-users, listuser           List users
  delete-user, elimuser <name>   Delete a user
  logs-on, logs-off              Enable or disable the event log (log on|off)
  clear-logs, clear              Clear the event log (log clear)
  save-logs [file]               Save the event log (log save [file])
  anonymous [on|off]             Show or toggle anonymous logins
  help                           Show this help
  exit, quit                     Leave the console";

/// What an administrative command produced, rendered with `Display`.
#[derive(Debug)]
pub enum AdminOutput {
    Message(String),
    Status(StatusReport),
    Clients(Vec<ClientInfo>),
    Users(Vec<User>),
    Help,
    Exit,
}

impl fmt::Display for AdminOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminOutput::Message(message) => f.write_str(message),
            AdminOutput::Status(report) => write!(f, "{}", report),
            AdminOutput::Clients(clients) if clients.is_empty() => {
                f.write_str("No clients connected")
            }
            AdminOutput::Clients(clients) => {
                write!(f, "Connected clients:")?;
                for client in clients {
                    write!(
                        f,
                        "\n  #{:<4} {:<22} {:<16} since {}",
                        client.connection_id,
                        client.peer_address,
                        client.username.as_deref().unwrap_or("-"),
                        client.connected_since.format("%Y-%m-%d %H:%M:%S")
                    )?;
                }
                Ok(())
            }
            AdminOutput::Users(users) if users.is_empty() => f.write_str("No users registered"),
            AdminOutput::Users(users) => {
                write!(f, "Registered users:")?;
                for user in users {
                    write!(f, "\n  {:<32} {}", user.username, user.home_path)?;
                    if !user.enabled {
                        write!(f, " (disabled)")?;
                    }
                }
                Ok(())
            }
            AdminOutput::Help => f.write_str(HELP),
            AdminOutput::Exit => f.write_str("Bye"),
        }
    }
}

/// Executes administrative commands against a controller.
pub struct Console {
    controller: Arc<ServerController>,
}

impl Console {
    pub fn new(controller: Arc<ServerController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<ServerController> {
        &self.controller
    }

    /// Parses and runs one console line. Blank lines produce `None`.
    pub async fn execute_line(&self, line: &str) -> Result<Option<AdminOutput>, AdminError> {
        match AdminCommand::parse(line)? {
            Some(command) => Ok(Some(self.execute(command).await?)),
            None => Ok(None),
        }
    }

    pub async fn execute(&self, command: AdminCommand) -> Result<AdminOutput, ControlError> {
        let text = command.to_string();
        self.controller
            .events()
            .record(LogEvent::Admin { command: &text });

        let controller = &self.controller;
        let output = match command {
            AdminCommand::StartServer => {
                let addr = controller.start().await?;
                AdminOutput::Message(format!("Server started on {}", addr))
            }
            AdminCommand::StopServer => {
                controller.stop().await?;
                AdminOutput::Message("Server stopped".into())
            }
            AdminCommand::Status => AdminOutput::Status(controller.status()),
            AdminCommand::SetRoot(None) => AdminOutput::Message(format!(
                "Current root path: {}",
                controller.config().root_path.display()
            )),
            AdminCommand::SetRoot(Some(path)) => {
                let root = controller.set_root_path(&path)?;
                AdminOutput::Message(format!("Root path set to {}", root.display()))
            }
            AdminCommand::SetPort(port) => {
                controller.set_port(port)?;
                AdminOutput::Message(format!("Listening port set to {}", port))
            }
            AdminCommand::SetMaxConnections(None) => AdminOutput::Message(format!(
                "Current max connections: {}",
                controller.state().max_connections()
            )),
            AdminCommand::SetMaxConnections(Some(max)) => {
                controller.set_max_connections(max)?;
                AdminOutput::Message(format!("Max connections set to {}", max))
            }
            AdminCommand::ListClients => AdminOutput::Clients(controller.list_clients()),
            AdminCommand::KickClient(id) => {
                controller.kick_client(id)?;
                AdminOutput::Message(format!("Client #{} disconnected", id))
            }
            AdminCommand::AddUser {
                username,
                credential,
                home,
            } => {
                let home = home.unwrap_or_else(|| String::from("/"));
                let users = Arc::clone(controller.users());
                let user =
                    off_runtime(move || users.add(&username, &credential, &home)).await??;
                AdminOutput::Message(format!(
                    "User {} added with home {}",
                    user.username, user.home_path
                ))
            }
            AdminCommand::ModifyUser { username, update } => {
                let users = Arc::clone(controller.users());
                let user = off_runtime(move || users.modify(&username, update)).await??;
                AdminOutput::Message(format!("User {} modified", user.username))
            }
            AdminCommand::ListUsers => AdminOutput::Users(controller.users().list()),
            AdminCommand::DeleteUser(username) => {
                let users = Arc::clone(controller.users());
                let name = username.clone();
                off_runtime(move || users.delete(&name)).await??;
                AdminOutput::Message(format!("User {} deleted", username))
            }
            AdminCommand::LogsOn => {
                controller.set_logging(true);
                AdminOutput::Message("Event logging enabled".into())
            }
            AdminCommand::LogsOff => {
                controller.set_logging(false);
                AdminOutput::Message("Event logging disabled".into())
            }
            AdminCommand::ClearLogs => {
                controller.events().clear();
                AdminOutput::Message("Event log cleared".into())
            }
            AdminCommand::SaveLogs(destination) => {
                let destination = destination.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
                let events = Arc::clone(controller.events());
                let target = destination.clone();
                let lines = off_runtime(move || events.save(&target)).await??;
                AdminOutput::Message(format!(
                    "Saved {} line(s) to {}",
                    lines,
                    destination.display()
                ))
            }
            AdminCommand::Anonymous(None) => AdminOutput::Message(format!(
                "Anonymous logins are {}",
                if controller.state().allow_anonymous() {
                    "allowed"
                } else {
                    "refused"
                }
            )),
            AdminCommand::Anonymous(Some(allow)) => {
                controller.set_anonymous(allow);
                AdminOutput::Message(format!(
                    "Anonymous logins {}",
                    if allow { "allowed" } else { "refused" }
                ))
            }
            AdminCommand::Help => AdminOutput::Help,
            AdminCommand::Exit => AdminOutput::Exit,
        };
        Ok(output)
    }
}

/// Runs bcrypt hashing and file writes on the blocking pool so sessions keep
/// being served meanwhile.
async fn off_runtime<T, F>(work: F) -> Result<T, ControlError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ControlError::Io(io::Error::other(e)))
}

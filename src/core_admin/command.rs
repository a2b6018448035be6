use crate::core_admin::error::AdminError;
use crate::core_auth::UserUpdate;
use std::fmt;
use std::path::PathBuf;

/// One line typed on the administration console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    StartServer,
    StopServer,
    Status,
    /// `None` shows the current root.
    SetRoot(Option<PathBuf>),
    SetPort(u16),
    /// `None` shows the current limit.
    SetMaxConnections(Option<usize>),
    ListClients,
    KickClient(u64),
    AddUser {
        username: String,
        credential: String,
        home: Option<String>,
    },
    ModifyUser {
        username: String,
        update: UserUpdate,
    },
    ListUsers,
    DeleteUser(String),
    LogsOn,
    LogsOff,
    ClearLogs,
    /// `None` saves to the default log file.
    SaveLogs(Option<PathBuf>),
    /// `None` shows whether anonymous logins are allowed.
    Anonymous(Option<bool>),
    Help,
    Exit,
}

const USAGE_SET_ROOT: &str = "set-root [path]";
const USAGE_SET_PORT: &str = "set-port <port>";
const USAGE_MAX_CONNECTIONS: &str = "set-max-connections [n]";
const USAGE_KICK: &str = "kick-client <id>";
const USAGE_ADD_USER: &str = "add-user <name> <password> [home]";
const USAGE_MODIFY_USER: &str =
    "modify-user <name> <password> | modify-user <name> [password=..] [home=..] [enabled=yes|no]";
const USAGE_DELETE_USER: &str = "delete-user <name>";
const USAGE_LOG: &str = "log on|off|clear|save [file]";
const USAGE_ANONYMOUS: &str = "anonymous [on|off]";

impl AdminCommand {
    /// Parses a console line. Only the command word is case-insensitive;
    /// names, passwords and paths are kept as typed.
    pub fn parse(line: &str) -> Result<Option<AdminCommand>, AdminError> {
        let mut parts = line.split_whitespace();
        let verb = match parts.next() {
            Some(verb) => verb.to_ascii_lowercase(),
            None => return Ok(None),
        };
        let args: Vec<&str> = parts.collect();

        let command = match verb.as_str() {
            "start-server" | "startserver" | "start" => AdminCommand::StartServer,
            "stop-server" | "stopserver" | "stop" => AdminCommand::StopServer,
            "status" => AdminCommand::Status,
            "set-root" | "dir" => AdminCommand::SetRoot(match args.as_slice() {
                [] => None,
                [path] => Some(PathBuf::from(path)),
                _ => return Err(AdminError::Usage(USAGE_SET_ROOT)),
            }),
            "set-port" | "port" => match args.as_slice() {
                [port] => AdminCommand::SetPort(
                    port.parse().map_err(|_| AdminError::Usage(USAGE_SET_PORT))?,
                ),
                _ => return Err(AdminError::Usage(USAGE_SET_PORT)),
            },
            "set-max-connections" | "maxconnect" => match args.as_slice() {
                [] => AdminCommand::SetMaxConnections(None),
                [n] => AdminCommand::SetMaxConnections(Some(
                    n.parse().map_err(|_| AdminError::Usage(USAGE_MAX_CONNECTIONS))?,
                )),
                _ => return Err(AdminError::Usage(USAGE_MAX_CONNECTIONS)),
            },
            "list-clients" | "listcon" => AdminCommand::ListClients,
            "kick-client" | "desuser" => match args.as_slice() {
                [id] => AdminCommand::KickClient(
                    id.trim_start_matches('#')
                        .parse()
                        .map_err(|_| AdminError::Usage(USAGE_KICK))?,
                ),
                _ => return Err(AdminError::Usage(USAGE_KICK)),
            },
            "add-user" | "adduser" => match args.as_slice() {
                [name, credential] => AdminCommand::AddUser {
                    username: name.to_string(),
                    credential: credential.to_string(),
                    home: None,
                },
                [name, credential, home] => AdminCommand::AddUser {
                    username: name.to_string(),
                    credential: credential.to_string(),
                    home: Some(home.to_string()),
                },
                _ => return Err(AdminError::Usage(USAGE_ADD_USER)),
            },
            "modify-user" | "moduser" => match args.split_first() {
                Some((name, fields)) if !fields.is_empty() => AdminCommand::ModifyUser {
                    username: name.to_string(),
                    update: parse_update(fields)?,
                },
                _ => return Err(AdminError::Usage(USAGE_MODIFY_USER)),
            },
            "list-users" | "listuser" => AdminCommand::ListUsers,
            "delete-user" | "elimuser" => match args.as_slice() {
                [name] => AdminCommand::DeleteUser(name.to_string()),
                _ => return Err(AdminError::Usage(USAGE_DELETE_USER)),
            },
            "logs-on" => AdminCommand::LogsOn,
            "logs-off" => AdminCommand::LogsOff,
            "clear-logs" | "clear" => AdminCommand::ClearLogs,
            "save-logs" => AdminCommand::SaveLogs(args.first().map(PathBuf::from)),
            "log" => parse_log(&args)?,
            "anonymous" => AdminCommand::Anonymous(match args.as_slice() {
                [] => None,
                [flag] => Some(parse_flag(flag).ok_or(AdminError::Usage(USAGE_ANONYMOUS))?),
                _ => return Err(AdminError::Usage(USAGE_ANONYMOUS)),
            }),
            "help" | "?" => AdminCommand::Help,
            "exit" | "quit" => AdminCommand::Exit,
            other => return Err(AdminError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn parse_log(args: &[&str]) -> Result<AdminCommand, AdminError> {
    let sub = args
        .first()
        .map(|s| s.to_ascii_lowercase())
        .ok_or(AdminError::Usage(USAGE_LOG))?;
    match sub.as_str() {
        "on" => Ok(AdminCommand::LogsOn),
        "off" => Ok(AdminCommand::LogsOff),
        "clear" => Ok(AdminCommand::ClearLogs),
        "save" => Ok(AdminCommand::SaveLogs(args.get(1).map(PathBuf::from))),
        _ => Err(AdminError::Usage(USAGE_LOG)),
    }
}

fn parse_update(fields: &[&str]) -> Result<UserUpdate, AdminError> {
    // A lone token without '=' is the new password
    if let [password] = fields {
        if !password.contains('=') {
            return Ok(UserUpdate {
                credential: Some(password.to_string()),
                ..UserUpdate::default()
            });
        }
    }

    let mut update = UserUpdate::default();
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .ok_or(AdminError::Usage(USAGE_MODIFY_USER))?;
        match key.to_ascii_lowercase().as_str() {
            "password" => update.credential = Some(value.to_string()),
            "home" => update.home_path = Some(value.to_string()),
            "enabled" => {
                update.enabled =
                    Some(parse_flag(value).ok_or(AdminError::Usage(USAGE_MODIFY_USER))?)
            }
            _ => return Err(AdminError::Usage(USAGE_MODIFY_USER)),
        }
    }
    Ok(update)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

// Used for the event log; credentials are masked
impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminCommand::StartServer => write!(f, "start-server"),
            AdminCommand::StopServer => write!(f, "stop-server"),
            AdminCommand::Status => write!(f, "status"),
            AdminCommand::SetRoot(Some(path)) => write!(f, "set-root {}", path.display()),
            AdminCommand::SetRoot(None) => write!(f, "set-root"),
            AdminCommand::SetPort(port) => write!(f, "set-port {}", port),
            AdminCommand::SetMaxConnections(Some(n)) => write!(f, "set-max-connections {}", n),
            AdminCommand::SetMaxConnections(None) => write!(f, "set-max-connections"),
            AdminCommand::ListClients => write!(f, "list-clients"),
            AdminCommand::KickClient(id) => write!(f, "kick-client {}", id),
            AdminCommand::AddUser { username, home, .. } => match home {
                Some(home) => write!(f, "add-user {} **** {}", username, home),
                None => write!(f, "add-user {} ****", username),
            },
            AdminCommand::ModifyUser { username, update } => {
                write!(f, "modify-user {}", username)?;
                if update.credential.is_some() {
                    write!(f, " password=****")?;
                }
                if let Some(home) = &update.home_path {
                    write!(f, " home={}", home)?;
                }
                if let Some(enabled) = update.enabled {
                    write!(f, " enabled={}", enabled)?;
                }
                Ok(())
            }
            AdminCommand::ListUsers => write!(f, "list-users"),
            AdminCommand::DeleteUser(name) => write!(f, "delete-user {}", name),
            AdminCommand::LogsOn => write!(f, "logs-on"),
            AdminCommand::LogsOff => write!(f, "logs-off"),
            AdminCommand::ClearLogs => write!(f, "clear-logs"),
            AdminCommand::SaveLogs(Some(path)) => write!(f, "save-logs {}", path.display()),
            AdminCommand::SaveLogs(None) => write!(f, "save-logs"),
            AdminCommand::Anonymous(Some(allow)) => {
                write!(f, "anonymous {}", if *allow { "on" } else { "off" })
            }
            AdminCommand::Anonymous(None) => write!(f, "anonymous"),
            AdminCommand::Help => write!(f, "help"),
            AdminCommand::Exit => write!(f, "exit"),
        }
    }
}

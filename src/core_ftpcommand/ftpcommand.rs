use crate::core_ftpcommand::error::FtpError;
use crate::session::TransferType;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// A parsed control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpCommand {
    User(String),
    Pass(String),
    Cwd(String),
    Cdup,
    Pwd,
    List(Option<String>),
    Nlst(Option<String>),
    Retr(String),
    Stor(String),
    Rnfr(String),
    Rnto(String),
    Dele(String),
    Mkd(String),
    Rmd(String),
    Size(String),
    Rest(u64),
    Type(TransferType),
    Pasv,
    Port(SocketAddr),
    Syst,
    Feat,
    Noop,
    Opts(String),
    Abor,
    Quit,
    Unknown(String),
}

impl FtpCommand {
    /// Parses one control line (without its line terminator).
    ///
    /// Unknown verbs parse to `Unknown`; a known verb with a bad or missing
    /// argument is a `CommandError`.
    pub fn parse(line: &str) -> Result<FtpCommand, FtpError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };
        if verb.is_empty() {
            return Err(FtpError::CommandError("Empty command.".into()));
        }

        let command = match verb.to_ascii_uppercase().as_str() {
            "USER" => FtpCommand::User(required(arg)?),
            "PASS" => FtpCommand::Pass(arg.to_string()),
            "CWD" | "XCWD" => FtpCommand::Cwd(required(arg)?),
            "CDUP" | "XCUP" => FtpCommand::Cdup,
            "PWD" | "XPWD" => FtpCommand::Pwd,
            "LIST" => FtpCommand::List(optional(arg)),
            "NLST" => FtpCommand::Nlst(optional(arg)),
            "RETR" => FtpCommand::Retr(required(arg)?),
            "STOR" => FtpCommand::Stor(required(arg)?),
            "RNFR" => FtpCommand::Rnfr(required(arg)?),
            "RNTO" => FtpCommand::Rnto(required(arg)?),
            "DELE" => FtpCommand::Dele(required(arg)?),
            "MKD" | "XMKD" => FtpCommand::Mkd(required(arg)?),
            "RMD" | "XRMD" => FtpCommand::Rmd(required(arg)?),
            "SIZE" => FtpCommand::Size(required(arg)?),
            "REST" => FtpCommand::Rest(
                arg.parse()
                    .map_err(|_| FtpError::CommandError("Invalid restart offset.".into()))?,
            ),
            "TYPE" => FtpCommand::Type(parse_type(arg)?),
            "PASV" => FtpCommand::Pasv,
            "PORT" => FtpCommand::Port(parse_port(arg)?),
            "SYST" => FtpCommand::Syst,
            "FEAT" => FtpCommand::Feat,
            "NOOP" => FtpCommand::Noop,
            "OPTS" => FtpCommand::Opts(required(arg)?),
            "ABOR" => FtpCommand::Abor,
            "QUIT" => FtpCommand::Quit,
            other => FtpCommand::Unknown(other.to_string()),
        };
        Ok(command)
    }

    pub fn verb(&self) -> &str {
        match self {
            FtpCommand::User(_) => "USER",
            FtpCommand::Pass(_) => "PASS",
            FtpCommand::Cwd(_) => "CWD",
            FtpCommand::Cdup => "CDUP",
            FtpCommand::Pwd => "PWD",
            FtpCommand::List(_) => "LIST",
            FtpCommand::Nlst(_) => "NLST",
            FtpCommand::Retr(_) => "RETR",
            FtpCommand::Stor(_) => "STOR",
            FtpCommand::Rnfr(_) => "RNFR",
            FtpCommand::Rnto(_) => "RNTO",
            FtpCommand::Dele(_) => "DELE",
            FtpCommand::Mkd(_) => "MKD",
            FtpCommand::Rmd(_) => "RMD",
            FtpCommand::Size(_) => "SIZE",
            FtpCommand::Rest(_) => "REST",
            FtpCommand::Type(_) => "TYPE",
            FtpCommand::Pasv => "PASV",
            FtpCommand::Port(_) => "PORT",
            FtpCommand::Syst => "SYST",
            FtpCommand::Feat => "FEAT",
            FtpCommand::Noop => "NOOP",
            FtpCommand::Opts(_) => "OPTS",
            FtpCommand::Abor => "ABOR",
            FtpCommand::Quit => "QUIT",
            FtpCommand::Unknown(verb) => verb,
        }
    }

    /// Commands allowed before login.
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            FtpCommand::User(_)
                | FtpCommand::Pass(_)
                | FtpCommand::Type(_)
                | FtpCommand::Syst
                | FtpCommand::Feat
                | FtpCommand::Noop
                | FtpCommand::Opts(_)
                | FtpCommand::Abor
                | FtpCommand::Quit
                | FtpCommand::Unknown(_)
        )
    }
}

// Used for the event log, so the credential never reaches it
impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpCommand::Pass(_) => write!(f, "PASS ****"),
            FtpCommand::User(arg)
            | FtpCommand::Cwd(arg)
            | FtpCommand::Retr(arg)
            | FtpCommand::Stor(arg)
            | FtpCommand::Rnfr(arg)
            | FtpCommand::Rnto(arg)
            | FtpCommand::Dele(arg)
            | FtpCommand::Mkd(arg)
            | FtpCommand::Rmd(arg)
            | FtpCommand::Size(arg)
            | FtpCommand::Opts(arg) => write!(f, "{} {}", self.verb(), arg),
            FtpCommand::List(Some(arg)) | FtpCommand::Nlst(Some(arg)) => {
                write!(f, "{} {}", self.verb(), arg)
            }
            FtpCommand::Rest(offset) => write!(f, "REST {}", offset),
            FtpCommand::Type(kind) => write!(f, "TYPE {}", kind),
            FtpCommand::Port(addr) => write!(f, "PORT {}", addr),
            _ => f.write_str(self.verb()),
        }
    }
}

fn required(arg: &str) -> Result<String, FtpError> {
    if arg.is_empty() {
        Err(FtpError::CommandError(
            "Syntax error in parameters or arguments.".into(),
        ))
    } else {
        Ok(arg.to_string())
    }
}

fn optional(arg: &str) -> Option<String> {
    // Options such as "-la" sent by common clients are not paths
    let path = arg
        .split_whitespace()
        .filter(|part| !part.starts_with('-'))
        .collect::<Vec<_>>()
        .join(" ");
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn parse_type(arg: &str) -> Result<TransferType, FtpError> {
    match arg.split_whitespace().next().map(|t| t.to_ascii_uppercase()) {
        Some(t) if t == "A" => Ok(TransferType::Ascii),
        Some(t) if t == "I" => Ok(TransferType::Image),
        _ => Err(FtpError::CommandError(format!(
            "Unsupported transfer type '{}'.",
            arg
        ))),
    }
}

/// Parses "h1,h2,h3,h4,p1,p2".
pub fn parse_port(arg: &str) -> Result<SocketAddr, FtpError> {
    let invalid = || FtpError::CommandError("Invalid PORT argument.".into());
    let parts = arg
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| invalid())?;
    if parts.len() != 6 {
        return Err(invalid());
    }
    let ip = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
    let port = u16::from(parts[4]) << 8 | u16::from(parts[5]);
    if port == 0 {
        return Err(invalid());
    }
    Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
}

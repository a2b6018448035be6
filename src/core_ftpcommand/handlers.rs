use crate::config::ServerConfig;
use crate::core_auth::UserStore;
use crate::core_fs::{Existence, FsError, Jail, Resolved};
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::{
    abor, cdup, cwd, dele, feat, list, mkd, noop, opts, pass, pwd, quit, rest, retr, rmd, rnfr,
    rnto, size, stor, syst, type_, user,
};
use crate::core_log::{EventLog, LogEvent};
use crate::core_network::{pasv, port};
use crate::session::Session;
use crate::state::ServerState;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Everything a command handler may touch while it runs.
///
/// `writer` is the control connection; handlers only use it for preliminary
/// (1xx) replies, the final reply is written by the caller.
pub struct CommandContext<'a, W> {
    pub writer: &'a mut W,
    pub session: &'a mut Session,
    pub state: &'a Arc<ServerState>,
    pub users: &'a Arc<UserStore>,
    pub jail: &'a Jail,
    pub config: &'a ServerConfig,
    pub events: &'a EventLog,
    /// Cancelled when the session is kicked or the server is force-stopped.
    pub cancel: &'a CancellationToken,
}

impl<W: AsyncWrite + Unpin + Send> CommandContext<'_, W> {
    /// Writes a 1xx reply. Gives up as soon as the session is cancelled.
    pub async fn send_preliminary(&mut self, code: u16, text: &str) -> Result<(), FtpError> {
        let line = Reply::new(code, text).to_string();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FtpError::TransferAborted(
                "session cancelled before the transfer started".into(),
            )),
            written = write_flush(&mut *self.writer, &line) => written,
        }
    }

    /// Resolves a client path against the session's directory and home.
    pub fn resolve(&self, requested: &str, existence: Existence) -> Result<Resolved, FtpError> {
        Ok(self.jail.resolve(
            self.session.home(),
            &self.session.current_dir,
            requested,
            existence,
        )?)
    }

    /// Refuses filesystem changes for read-only (anonymous) sessions.
    pub fn ensure_writable(&self, virtual_path: &str) -> Result<(), FtpError> {
        match &self.session.user {
            Some(user) if !user.read_only => Ok(()),
            _ => Err(FsError::PermissionDenied(virtual_path.to_string()).into()),
        }
    }
}

async fn write_flush<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), FtpError> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Runs one parsed command and returns the reply to send.
///
/// Handler errors are turned into replies here; none of them ends the session.
pub async fn dispatch<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    command: FtpCommand,
) -> Reply {
    ctx.session.commands_processed += 1;
    let text = command.to_string();
    ctx.events.record(LogEvent::Command {
        id: ctx.session.connection_id,
        user: ctx.session.username(),
        command: &text,
    });

    if command.requires_auth() && !ctx.session.is_authenticated() {
        return Reply::from_response(&FtpError::NotAuthenticated.to_ftp_response());
    }

    // RNTO must directly follow RNFR
    if !matches!(command, FtpCommand::Rnto(_)) {
        ctx.session.rename_from = None;
    }

    let result = match command {
        FtpCommand::User(name) => user::handle_user_command(ctx, name).await,
        FtpCommand::Pass(credential) => pass::handle_pass_command(ctx, credential).await,
        FtpCommand::Cwd(path) => cwd::handle_cwd_command(ctx, path).await,
        FtpCommand::Cdup => cdup::handle_cdup_command(ctx).await,
        FtpCommand::Pwd => pwd::handle_pwd_command(ctx).await,
        FtpCommand::List(path) => list::handle_list_command(ctx, path).await,
        FtpCommand::Nlst(path) => list::handle_nlst_command(ctx, path).await,
        FtpCommand::Retr(path) => retr::handle_retr_command(ctx, path).await,
        FtpCommand::Stor(path) => stor::handle_stor_command(ctx, path).await,
        FtpCommand::Rnfr(path) => rnfr::handle_rnfr_command(ctx, path).await,
        FtpCommand::Rnto(path) => rnto::handle_rnto_command(ctx, path).await,
        FtpCommand::Dele(path) => dele::handle_dele_command(ctx, path).await,
        FtpCommand::Mkd(path) => mkd::handle_mkd_command(ctx, path).await,
        FtpCommand::Rmd(path) => rmd::handle_rmd_command(ctx, path).await,
        FtpCommand::Size(path) => size::handle_size_command(ctx, path).await,
        FtpCommand::Rest(offset) => rest::handle_rest_command(ctx, offset).await,
        FtpCommand::Type(kind) => type_::handle_type_command(ctx, kind).await,
        FtpCommand::Pasv => pasv::handle_pasv_command(ctx).await,
        FtpCommand::Port(addr) => port::handle_port_command(ctx, addr).await,
        FtpCommand::Syst => syst::handle_syst_command(ctx).await,
        FtpCommand::Feat => feat::handle_feat_command(ctx).await,
        FtpCommand::Noop => noop::handle_noop_command(ctx).await,
        FtpCommand::Opts(option) => opts::handle_opts_command(ctx, option).await,
        FtpCommand::Abor => abor::handle_abor_command(ctx).await,
        FtpCommand::Quit => quit::handle_quit_command(ctx).await,
        FtpCommand::Unknown(verb) => Ok(Reply::new(
            502,
            format!("Command '{}' not implemented.", verb),
        )),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            let message = e.to_string();
            ctx.events.record(LogEvent::Error {
                id: Some(ctx.session.connection_id),
                message: &message,
            });
            Reply::from_response(&e.to_ftp_response())
        }
    }
}

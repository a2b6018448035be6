use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::io::AsyncWrite;

/// Handles the QUIT FTP command. The connection closes after the 221 is sent.
pub async fn handle_quit_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    info!("Session #{} quit", ctx.session.connection_id);
    ctx.session.terminate();
    Ok(Reply::new(221, "Goodbye."))
}

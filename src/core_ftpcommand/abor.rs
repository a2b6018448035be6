use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::io::AsyncWrite;

/// Handles the ABOR FTP command.
///
/// Commands run one at a time, so an ABOR is only read once no transfer is
/// in progress. What is left to abort is a prepared data channel and a
/// pending REST offset.
pub async fn handle_abor_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    if ctx.session.data_channel.take().is_some() {
        info!(
            "Session #{}: prepared data channel dropped by ABOR",
            ctx.session.connection_id
        );
    }
    ctx.session.restart_offset = 0;
    Ok(Reply::new(226, "Abort successful."))
}

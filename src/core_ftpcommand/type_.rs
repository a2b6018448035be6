use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use crate::session::TransferType;
use log::debug;
use tokio::io::AsyncWrite;

/// Handles the TYPE FTP command.
///
/// The type is recorded on the session; files are sent byte for byte in both modes.
pub async fn handle_type_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    kind: TransferType,
) -> Result<Reply, FtpError> {
    ctx.session.transfer_type = kind;
    debug!("Session #{} switched to type {}", ctx.session.connection_id, kind);
    let name = match kind {
        TransferType::Ascii => "ASCII",
        TransferType::Image => "binary",
    };
    Ok(Reply::new(200, format!("Switching to {} mode.", name)))
}

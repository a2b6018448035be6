use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::io::AsyncWrite;

/// Handles the REST FTP command. The offset applies to the next RETR or STOR only.
pub async fn handle_rest_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    offset: u64,
) -> Result<Reply, FtpError> {
    ctx.session.restart_offset = offset;
    Ok(Reply::new(
        350,
        format!("Restarting at {}. Send STOR or RETR to initiate transfer.", offset),
    ))
}

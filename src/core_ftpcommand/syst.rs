use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::io::AsyncWrite;

pub async fn handle_syst_command<W: AsyncWrite + Unpin + Send>(
    _ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    Ok(Reply::new(215, "UNIX Type: L8"))
}

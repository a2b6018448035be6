use crate::core_ftpcommand::cwd::change_directory;
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::io::AsyncWrite;

/// Handles the CDUP FTP command, a CWD to the parent directory.
pub async fn handle_cdup_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    change_directory(ctx, "..")
}

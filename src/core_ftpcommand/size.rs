use crate::core_fs::{Existence, FsError};
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::fs;
use tokio::io::AsyncWrite;

/// Handles the SIZE FTP command: the size in bytes of a plain file.
pub async fn handle_size_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let resolved = ctx.resolve(&path, Existence::MustExist)?;
    let metadata = fs::metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;
    if !metadata.is_file() {
        return Err(FsError::NotFound(resolved.virtual_path).into());
    }
    Ok(Reply::new(213, metadata.len().to_string()))
}

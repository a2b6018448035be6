use crate::core_fs::{Existence, FsError};
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::fs;
use tokio::io::AsyncWrite;

/// Handles the DELE (Delete File) FTP command.
///
/// Deletes a plain file inside the user's home. Directories are refused;
/// RMD removes those. A symbolic link is removed itself, never its target.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `path` - The file to delete.
///
/// # Returns
///
/// 250 once the file is gone.
pub async fn handle_dele_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let resolved = ctx.resolve(&path, Existence::Entry)?;
    ctx.ensure_writable(&resolved.virtual_path)?;

    let metadata = fs::symlink_metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;
    if metadata.is_dir() {
        return Err(FsError::PermissionDenied(resolved.virtual_path).into());
    }

    fs::remove_file(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;

    info!("File deleted: {}", resolved.virtual_path);
    Ok(Reply::new(250, format!("\"{}\" file deleted.", resolved.virtual_path)))
}

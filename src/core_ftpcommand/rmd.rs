use crate::core_fs::{Existence, FsError, Jail};
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::fs;
use tokio::io::AsyncWrite;

/// Handles the RMD (Remove Directory) FTP command.
///
/// Removes an empty directory. The user's home itself cannot be removed.
pub async fn handle_rmd_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let resolved = ctx.resolve(&path, Existence::Entry)?;
    ctx.ensure_writable(&resolved.virtual_path)?;

    if resolved.virtual_path == ctx.session.home() || resolved.virtual_path == "/" {
        return Err(FsError::PermissionDenied(resolved.virtual_path).into());
    }
    let metadata = fs::symlink_metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;
    if !metadata.is_dir() {
        return Err(FsError::NotFound(resolved.virtual_path).into());
    }

    fs::remove_dir(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;

    // Step out of a directory that no longer exists
    if Jail::is_within(&resolved.virtual_path, &ctx.session.current_dir) {
        ctx.session.current_dir = ctx.session.home().to_string();
    }
    info!("Directory removed: {}", resolved.virtual_path);
    Ok(Reply::new(250, "Directory removed."))
}

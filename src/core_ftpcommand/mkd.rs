use crate::core_fs::{Existence, FsError};
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::{info, warn};
use tokio::fs;
use tokio::io::AsyncWrite;

/// Handles the MKD (Make Directory) FTP command.
///
/// Creates one directory inside the user's home. The parent must exist.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `path` - The directory to create.
///
/// # Returns
///
/// 257 with the virtual path of the new directory.
pub async fn handle_mkd_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let resolved = ctx.resolve(&path, Existence::MayCreate)?;
    ctx.ensure_writable(&resolved.virtual_path)?;

    if resolved.real_path.exists() {
        warn!("Directory already exists: {}", resolved.virtual_path);
        return Err(FsError::PermissionDenied(resolved.virtual_path).into());
    }

    fs::create_dir(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;

    info!("Directory created successfully: {}", resolved.virtual_path);
    Ok(Reply::new(
        257,
        format!(
            "\"{}\" directory created.",
            resolved.virtual_path.replace('"', "\"\"")
        ),
    ))
}

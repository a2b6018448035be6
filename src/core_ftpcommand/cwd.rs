use crate::core_fs::{Existence, FsError};
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::io::AsyncWrite;

/// Handles the CWD (Change Working Directory) FTP command.
///
/// The target must be an existing directory inside the user's home. On any
/// failure the current directory is left unchanged.
pub async fn handle_cwd_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    change_directory(ctx, &path)
}

pub(crate) fn change_directory<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: &str,
) -> Result<Reply, FtpError> {
    let resolved = ctx.resolve(path, Existence::MustExist)?;
    if !resolved.real_path.is_dir() {
        return Err(FsError::NotFound(resolved.virtual_path).into());
    }

    info!(
        "Session #{} changed directory to {}",
        ctx.session.connection_id, resolved.virtual_path
    );
    ctx.session.current_dir = resolved.virtual_path;
    Ok(Reply::new(250, "Directory successfully changed."))
}

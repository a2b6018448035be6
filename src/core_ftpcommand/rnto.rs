use crate::core_fs::Existence;
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::fs;
use tokio::io::AsyncWrite;

/// Handles the RNTO (Rename To) FTP command.
///
/// Renames the path given by the preceding RNFR. Both ends are resolved again
/// here, so a source that changed in between is checked a second time.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `path` - The new name of the file or directory.
///
/// # Returns
///
/// 250 on success, 503 without a preceding RNFR.
pub async fn handle_rnto_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let from = ctx
        .session
        .rename_from
        .take()
        .ok_or_else(|| FtpError::BadSequence("RNFR required first.".into()))?;

    let source = ctx.resolve(&from, Existence::Entry)?;
    let target = ctx.resolve(&path, Existence::MayCreate)?;
    ctx.ensure_writable(&target.virtual_path)?;

    fs::rename(&source.real_path, &target.real_path)
        .await
        .map_err(|e| fs_error(e, &target.virtual_path))?;

    info!("Renamed {} to {}", source.virtual_path, target.virtual_path);
    Ok(Reply::new(250, "Rename successful."))
}

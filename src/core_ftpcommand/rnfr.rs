use crate::core_fs::Existence;
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::io::AsyncWrite;

/// Handles the RNFR (Rename From) FTP command.
///
/// Remembers an existing source path for the RNTO that must follow.
pub async fn handle_rnfr_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let resolved = ctx.resolve(&path, Existence::Entry)?;
    ctx.ensure_writable(&resolved.virtual_path)?;

    info!("Rename source set to {}", resolved.virtual_path);
    ctx.session.rename_from = Some(resolved.virtual_path);
    Ok(Reply::new(350, "File exists, ready for destination name."))
}

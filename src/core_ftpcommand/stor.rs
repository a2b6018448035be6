use crate::core_fs::{Existence, FsError};
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::{copy_with_cancel, open_data_connection};
use log::{info, warn};
use std::io::SeekFrom;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// Handles the STOR (Store File) FTP command.
///
/// Receives a file from the data connection into the user's home. Without a
/// REST offset the target is truncated; with one, writing starts at that
/// offset. A transfer cut short keeps what was received so far.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `path` - The file to store.
///
/// # Returns
///
/// 226 when the upload completed, 426 if it was cut short.
pub async fn handle_stor_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let offset = ctx.session.take_restart_offset();

    // 1. Secure path construction
    let resolved = ctx.resolve(&path, Existence::MayCreate)?;
    ctx.ensure_writable(&resolved.virtual_path)?;
    if resolved.real_path.is_dir() {
        return Err(FsError::PermissionDenied(resolved.virtual_path).into());
    }
    if ctx.session.data_channel.is_none() {
        return Err(FtpError::NoDataConnection);
    }

    // 2. Open the target
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(offset == 0)
        .open(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    // 3. Data transfer
    let announcement = format!("Ok to send data for {}.", resolved.virtual_path);
    let mut data = open_data_connection(ctx, &announcement).await?;

    let received = match copy_with_cancel(
        &mut data,
        &mut file,
        ctx.config.transfer_buffer_size,
        ctx.cancel,
    )
    .await
    {
        Ok(received) => received,
        Err(e) => {
            warn!("Upload of {} aborted: {}", resolved.virtual_path, e);
            let _ = file.flush().await;
            return Err(e);
        }
    };
    file.sync_all().await?;

    ctx.state.record_upload(received);
    info!(
        "File stored successfully: {} ({} bytes)",
        resolved.virtual_path, received
    );
    Ok(Reply::new(226, "Transfer complete."))
}

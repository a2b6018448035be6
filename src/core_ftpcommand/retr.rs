use crate::core_fs::{Existence, FsError};
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::{copy_with_cancel, open_data_connection};
use log::{info, warn};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// Handles the RETR (Retrieve) FTP command.
///
/// Sends a file inside the user's home over the data connection, starting at
/// the offset given by a preceding REST. The byte count is added to the
/// server-wide counter once the transfer completes.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `path` - The file to retrieve.
///
/// # Returns
///
/// 226 when the whole file was sent, 426 if the transfer was cut short.
pub async fn handle_retr_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: String,
) -> Result<Reply, FtpError> {
    let offset = ctx.session.take_restart_offset();
    let resolved = ctx.resolve(&path, Existence::MustExist)?;

    if !resolved.real_path.is_file() {
        return Err(FsError::NotFound(resolved.virtual_path).into());
    }
    if ctx.session.data_channel.is_none() {
        return Err(FtpError::NoDataConnection);
    }

    let mut file = File::open(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    let announcement = format!("Opening data connection for {}.", resolved.virtual_path);
    let mut data = open_data_connection(ctx, &announcement).await?;
    info!("Sending file: {:?} from offset {}", resolved.real_path, offset);

    let sent = match copy_with_cancel(
        &mut file,
        &mut data,
        ctx.config.transfer_buffer_size,
        ctx.cancel,
    )
    .await
    {
        Ok(sent) => sent,
        Err(e) => {
            warn!("Download of {} aborted: {}", resolved.virtual_path, e);
            return Err(e);
        }
    };
    let _ = data.shutdown().await;

    ctx.state.record_download(sent);
    info!(
        "File transfer completed successfully: {} ({} bytes)",
        resolved.virtual_path, sent
    );
    Ok(Reply::new(226, "Transfer complete."))
}

use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Takes the prepared data channel, announces the transfer with a 150 reply
/// and opens the data connection.
pub async fn open_data_connection<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    announcement: &str,
) -> Result<TcpStream, FtpError> {
    let channel = ctx
        .session
        .data_channel
        .take()
        .ok_or(FtpError::NoDataConnection)?;

    ctx.send_preliminary(150, announcement).await?;

    let wait = ctx.config.data_timeout();
    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(FtpError::TransferAborted("session cancelled".into())),
        opened = channel.open(wait) => opened.map_err(|e| {
            warn!("Failed to open data connection: {}", e);
            FtpError::NoDataConnection
        }),
    }
}

/// Copies `reader` into `writer` until EOF or until `cancel` fires.
///
/// Returns the number of bytes copied.
pub async fn copy_with_cancel<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, FtpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total: u64 = 0;

    loop {
        let bytes_read = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FtpError::TransferAborted(format!("cancelled after {} bytes", total)));
            }
            read = reader.read(&mut buffer) => {
                read.map_err(|e| FtpError::TransferAborted(e.to_string()))?
            }
        };
        if bytes_read == 0 {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FtpError::TransferAborted(format!("cancelled after {} bytes", total)));
            }
            written = writer.write_all(&buffer[..bytes_read]) => {
                written.map_err(|e| FtpError::TransferAborted(e.to_string()))?
            }
        }
        total += bytes_read as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FtpError::TransferAborted(e.to_string()))?;
    debug!("Copied {} bytes", total);
    Ok(total)
}

use crate::core_fs::Existence;
use crate::core_ftpcommand::error::{fs_error, FtpError};
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use crate::core_ftpcommand::utils::{copy_with_cancel, open_data_connection};
use chrono::{DateTime, Local};
use log::info;
use std::fs::Metadata;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Handles the LIST FTP command.
///
/// Sends a `ls -l` style listing of a directory (or of a single file) over
/// the data connection.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `path` - Optional path to list, the current directory when absent.
///
/// # Returns
///
/// 226 once the listing was sent.
pub async fn handle_list_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: Option<String>,
) -> Result<Reply, FtpError> {
    let entries = collect_entries(ctx, path.as_deref()).await?;
    let listing: String = entries
        .iter()
        .map(|(name, meta)| format!("{}\r\n", format_long_entry(name, meta)))
        .collect();
    send_listing(ctx, listing).await
}

/// Handles the NLST FTP command: names only, one per line.
pub async fn handle_nlst_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    path: Option<String>,
) -> Result<Reply, FtpError> {
    let entries = collect_entries(ctx, path.as_deref()).await?;
    let listing: String = entries
        .iter()
        .map(|(name, _)| format!("{}\r\n", name))
        .collect();
    send_listing(ctx, listing).await
}

async fn collect_entries<W: AsyncWrite + Unpin + Send>(
    ctx: &CommandContext<'_, W>,
    path: Option<&str>,
) -> Result<Vec<(String, Metadata)>, FtpError> {
    let resolved = ctx.resolve(path.unwrap_or("."), Existence::MustExist)?;
    let metadata = fs::metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;

    if !metadata.is_dir() {
        let name = file_name(&resolved.real_path);
        return Ok(vec![(name, metadata)]);
    }

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(&resolved.real_path)
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?;
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| fs_error(e, &resolved.virtual_path))?
    {
        // Entries that vanish or cannot be stat'ed are skipped
        if let Ok(meta) = entry.metadata().await {
            entries.push((entry.file_name().to_string_lossy().into_owned(), meta));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

async fn send_listing<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    listing: String,
) -> Result<Reply, FtpError> {
    let mut data = open_data_connection(ctx, "Here comes the directory listing.").await?;
    let mut reader = listing.as_bytes();
    copy_with_cancel(
        &mut reader,
        &mut data,
        ctx.config.transfer_buffer_size,
        ctx.cancel,
    )
    .await?;
    let _ = data.shutdown().await;
    info!("Directory listing sent to session #{}", ctx.session.connection_id);
    Ok(Reply::new(226, "Directory send OK."))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("/"))
}

/// One line of a long listing, e.g.
/// `-rw-r--r-- 1 ftp ftp 2134 Jan 01 00:00 file1.txt`.
pub fn format_long_entry(name: &str, metadata: &Metadata) -> String {
    let kind = if metadata.is_dir() { 'd' } else { '-' };
    let perms = permissions(metadata);
    let modified = metadata
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());
    format!(
        "{}{} 1 ftp ftp {:>12} {} {}",
        kind,
        perms,
        metadata.len(),
        modified.format("%b %d %H:%M"),
        name
    )
}

#[cfg(unix)]
fn permissions(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = metadata.permissions().mode();
    let flags = ['r', 'w', 'x'];
    (0..9)
        .map(|i| {
            if mode & (1 << (8 - i)) != 0 {
                flags[i % 3]
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(not(unix))]
fn permissions(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        String::from("r--r--r--")
    } else {
        String::from("rw-rw-rw-")
    }
}

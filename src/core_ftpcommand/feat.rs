use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::io::AsyncWrite;

/// Handles the FEAT FTP command with the extensions this server understands.
pub async fn handle_feat_command<W: AsyncWrite + Unpin + Send>(
    _ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    let features = ["SIZE", "REST STREAM", "PASV", "UTF8"];
    Ok(Reply::multiline(
        211,
        "Features:",
        features.iter().map(|f| f.to_string()).collect(),
    ))
}

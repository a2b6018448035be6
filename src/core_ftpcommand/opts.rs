use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::io::AsyncWrite;

/// Handles the OPTS FTP command. Paths are always UTF-8, so `UTF8 ON` is the
/// only option and it changes nothing.
pub async fn handle_opts_command<W: AsyncWrite + Unpin + Send>(
    _ctx: &mut CommandContext<'_, W>,
    option: String,
) -> Result<Reply, FtpError> {
    let upper = option.to_ascii_uppercase();
    let words: Vec<&str> = upper.split_whitespace().collect();
    match words.as_slice() {
        ["UTF8", "ON"] | ["UTF8"] => Ok(Reply::new(200, "UTF8 mode enabled.")),
        _ => Err(FtpError::CommandError(format!(
            "Option '{}' not supported.",
            option
        ))),
    }
}

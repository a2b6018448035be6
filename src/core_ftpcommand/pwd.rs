use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use tokio::io::AsyncWrite;

pub async fn handle_pwd_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    // Quotes inside the path are doubled
    let quoted = ctx.session.current_dir.replace('"', "\"\"");
    Ok(Reply::new(257, format!("\"{}\" is the current directory.", quoted)))
}

use crate::constants::ANONYMOUS_USERNAME;
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::info;
use tokio::io::AsyncWrite;

/// Handles the USER FTP command.
///
/// Stores the name for the following PASS. A USER sent while logged in
/// starts a new login; the old one is dropped.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `username` - The username provided by the client.
///
/// # Returns
///
/// A 331 reply asking for the password.
pub async fn handle_user_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    username: String,
) -> Result<Reply, FtpError> {
    info!("Received USER command with username: {}", username);

    if ctx.session.is_authenticated() {
        ctx.session.logout();
        ctx.state
            .sessions
            .set_username(ctx.session.connection_id, None);
    }

    let anonymous = is_anonymous(&username);
    ctx.session.pending_username = Some(if anonymous {
        ANONYMOUS_USERNAME.to_string()
    } else {
        username
    });

    if anonymous && ctx.state.allow_anonymous() {
        info!("Anonymous login initiated");
        Ok(Reply::new(
            331,
            "Anonymous login okay, send your complete email address as password.",
        ))
    } else {
        Ok(Reply::new(331, "User name okay, need password."))
    }
}

pub fn is_anonymous(username: &str) -> bool {
    username.eq_ignore_ascii_case(ANONYMOUS_USERNAME) || username.eq_ignore_ascii_case("ftp")
}

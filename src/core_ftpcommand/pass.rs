use crate::constants::ANONYMOUS_USERNAME;
use crate::core_auth::AuthenticatedUser;
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// Handles the PASS FTP command.
///
/// Checks the credential against the user store for the name given by USER.
/// Password hashing is slow on purpose, so verification runs on the blocking
/// pool. Unknown users and wrong passwords produce the same 530.
///
/// # Arguments
///
/// * `ctx` - The command context of the session.
/// * `credential` - The password provided by the client.
///
/// # Returns
///
/// 230 when logged in, or an `FtpError` (503 without USER, 530 on failure).
pub async fn handle_pass_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    credential: String,
) -> Result<Reply, FtpError> {
    let username = ctx
        .session
        .pending_username
        .take()
        .ok_or_else(|| FtpError::BadSequence("Login with USER first.".into()))?;

    let user = if username == ANONYMOUS_USERNAME {
        if !ctx.state.allow_anonymous() {
            warn!("Anonymous login refused for session #{}", ctx.session.connection_id);
            return Err(FtpError::AuthFailure);
        }
        AuthenticatedUser {
            username: username.clone(),
            home_path: String::from("/"),
            read_only: true,
        }
    } else {
        let users = Arc::clone(ctx.users);
        let name = username.clone();
        let verified =
            tokio::task::spawn_blocking(move || users.authenticate(&name, &credential)).await;
        match verified {
            Ok(Ok(user)) => AuthenticatedUser::from(&user),
            Ok(Err(_)) => {
                warn!("Failed login for user {}", username);
                return Err(FtpError::AuthFailure);
            }
            Err(e) => {
                error!("Password verification task failed: {}", e);
                return Err(FtpError::AuthFailure);
            }
        }
    };

    ctx.state
        .sessions
        .set_username(ctx.session.connection_id, Some(user.username.clone()));
    ctx.session.login(user);
    info!("User {} logged in", username);

    Ok(Reply::new(230, format!("User {} logged in, proceed.", username)))
}

use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use crate::core_network::data_channel::{same_host, DataChannel};
use log::{info, warn};
use std::net::SocketAddr;
use tokio::io::AsyncWrite;

/// Handles the PORT (Active Mode) FTP command.
///
/// The address was validated while parsing; the connection itself is made by
/// the next transfer. Only the client's own host is accepted as a target.
pub async fn handle_port_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
    addr: SocketAddr,
) -> Result<Reply, FtpError> {
    info!(
        "Received PORT command with IP: {} and port: {}",
        addr.ip(),
        addr.port()
    );
    let peer = ctx.session.peer_address.ip();
    if !same_host(addr.ip(), peer) {
        warn!(
            "Refused PORT to {} from session #{} at {}",
            addr, ctx.session.connection_id, peer
        );
        return Err(FtpError::CommandError(
            "PORT address must be the client's own address.".into(),
        ));
    }

    ctx.session.data_channel = Some(DataChannel::Active(addr));
    Ok(Reply::new(200, "PORT command successful."))
}

use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::handlers::CommandContext;
use crate::core_ftpcommand::reply::Reply;
use crate::core_network::data_channel::DataChannel;
use log::{debug, error};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;

/// Handles the PASV FTP command.
///
/// Opens a listener on an ephemeral port of the configured passive address and
/// keeps it on the session until the next transfer accepts on it.
pub async fn handle_pasv_command<W: AsyncWrite + Unpin + Send>(
    ctx: &mut CommandContext<'_, W>,
) -> Result<Reply, FtpError> {
    let pasv_ip: Ipv4Addr = ctx.config.pasv_address.parse().map_err(|_| {
        error!("Invalid passive address: {}", ctx.config.pasv_address);
        FtpError::NoDataConnection
    })?;

    let (listener, reply) = setup_pasv_listener(IpAddr::V4(pasv_ip)).await.map_err(|e| {
        error!("Failed to set up passive listener: {}", e);
        FtpError::NoDataConnection
    })?;

    // A previous PASV listener, if any, is dropped here
    ctx.session.data_channel = Some(DataChannel::Passive {
        listener,
        owner: ctx.session.peer_address.ip(),
    });
    Ok(reply)
}

/// Sets up a passive mode (PASV) listener.
/// Returns the listener and the 227 reply announcing it.
pub async fn setup_pasv_listener(pasv_ip: IpAddr) -> std::io::Result<(TcpListener, Reply)> {
    let listener = TcpListener::bind(SocketAddr::new(pasv_ip, 0)).await?;
    let addr = listener.local_addr()?;
    let reply = Reply::new(227, pasv_reply_text(pasv_ip, addr.port()));
    debug!(
        "PASV listener set up on IP: {}, Port: {}",
        pasv_ip,
        addr.port()
    );
    Ok((listener, reply))
}

fn pasv_reply_text(ip: IpAddr, port: u16) -> String {
    let octets = match ip {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(_) => [127, 0, 0, 1],
    };
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    )
}

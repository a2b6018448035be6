use log::{debug, warn};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout_at, Instant};

/// A data connection prepared by PASV or PORT, opened by the next transfer.
#[derive(Debug)]
pub enum DataChannel {
    /// PASV: we listen, the client connects. Only `owner` may connect.
    Passive { listener: TcpListener, owner: IpAddr },
    /// PORT: the client listens, we connect.
    Active(SocketAddr),
}

impl DataChannel {
    /// Opens the data stream, giving up after `wait`.
    ///
    /// A passive channel drops connections from hosts other than its owner
    /// and keeps waiting for the owner until `wait` runs out.
    pub async fn open(self, wait: Duration) -> io::Result<TcpStream> {
        let deadline = Instant::now() + wait;
        let stream = match self {
            DataChannel::Passive { listener, owner } => loop {
                let (stream, addr) = timeout_at(deadline, listener.accept())
                    .await
                    .map_err(|_| timed_out())??;
                if same_host(addr.ip(), owner) {
                    debug!("Accepted data connection from: {}", addr);
                    break stream;
                }
                warn!(
                    "Dropped data connection from {}, channel belongs to {}",
                    addr, owner
                );
            },
            DataChannel::Active(addr) => {
                let stream = timeout_at(deadline, TcpStream::connect(addr))
                    .await
                    .map_err(|_| timed_out())??;
                debug!("Connected data channel to: {}", addr);
                stream
            }
        };
        Ok(stream)
    }
}

/// Compares hosts, treating IPv4-mapped IPv6 addresses as their IPv4 form.
pub fn same_host(a: IpAddr, b: IpAddr) -> bool {
    a.to_canonical() == b.to_canonical()
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "data connection timed out")
}

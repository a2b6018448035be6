use crate::config::ServerConfig;
use crate::constants::{
    BANNER, CAPACITY_EXCEEDED_REPLY, IDLE_TIMEOUT_REPLY, KICKED_REPLY, MAX_COMMAND_LINE,
    SHUTDOWN_REPLY,
};
use crate::core_auth::UserStore;
use crate::core_fs::Jail;
use crate::core_ftpcommand::error::FtpError;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::{dispatch, CommandContext};
use crate::core_ftpcommand::reply::Reply;
use crate::core_log::{EventLog, LogEvent};
use crate::core_network::registry::SessionGuard;
use crate::session::Session;
use crate::state::ServerState;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const FAREWELL_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything shared by the accept loop and the sessions of one server run.
pub struct RunContext {
    pub state: Arc<ServerState>,
    pub users: Arc<UserStore>,
    pub jail: Arc<Jail>,
    pub config: Arc<ServerConfig>,
    pub events: Arc<EventLog>,
    /// Root token of the run. Every session token is a child of it.
    pub shutdown: CancellationToken,
    /// Cancelled first on stop: no new connections, idle sessions leave.
    pub drain: CancellationToken,
    pub tracker: TaskTracker,
}

/// Accepts connections until the run is drained.
///
/// Accept errors are logged, made visible in the status report, and retried
/// after a short pause; they never end the loop.
pub async fn accept_loop(listener: TcpListener, run: Arc<RunContext>) {
    loop {
        let accepted = tokio::select! {
            _ = run.drain.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, peer)) => handle_accept(socket, peer, &run),
            Err(e) => {
                let message = format!("accept failed: {}", e);
                error!("{}", message);
                run.state.set_accept_error(message.clone());
                run.events.record(LogEvent::Error {
                    id: None,
                    message: &message,
                });
                tokio::select! {
                    _ = run.drain.cancelled() => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }
    info!("Accept loop stopped");
}

fn handle_accept(mut socket: TcpStream, peer: SocketAddr, run: &Arc<RunContext>) {
    let cancel = run.shutdown.child_token();
    let max = run.state.max_connections();

    match run.state.sessions.try_register(peer, max, cancel) {
        Ok(guard) => {
            run.events.record(LogEvent::Connect {
                id: guard.connection_id(),
                peer,
            });
            let tracker = run.tracker.clone();
            let run = Arc::clone(run);
            tracker.spawn(async move { run_session(socket, peer, guard, run).await });
        }
        Err(full) => {
            warn!("Rejecting {}: {}", peer, full);
            run.events.record(LogEvent::Rejected { peer });
            run.tracker.spawn(async move {
                let _ = timeout(
                    REJECT_WRITE_TIMEOUT,
                    socket.write_all(CAPACITY_EXCEEDED_REPLY.as_bytes()),
                )
                .await;
                let _ = socket.shutdown().await;
            });
        }
    }
}

/// Drives one control connection until it ends. The guard keeps the session
/// registered and is dropped (unregistering it) when this returns.
pub async fn run_session(
    socket: TcpStream,
    peer: SocketAddr,
    guard: SessionGuard,
    run: Arc<RunContext>,
) {
    let connection_id = guard.connection_id();
    let cancel = guard.cancel_token().clone();
    let _ = socket.set_nodelay(true);
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut session = Session::new(connection_id, peer);

    let reason = match serve(&mut reader, &mut write_half, &mut session, &cancel, &run).await {
        Ok(reason) => reason.to_string(),
        Err(e) => {
            debug!("Session #{} ended with error: {}", connection_id, e);
            format!("error: {}", e)
        }
    };
    let _ = write_half.shutdown().await;

    run.events.record(LogEvent::Disconnect {
        id: connection_id,
        peer,
        reason: &reason,
    });
    drop(guard);
}

/// The command loop of one session. Returns why the session ended.
pub async fn serve<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &mut Session,
    cancel: &CancellationToken,
    run: &RunContext,
) -> Result<&'static str, FtpError>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    send_reply(writer, BANNER, cancel).await?;
    let idle = run.config.idle_timeout();

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return if run.shutdown.is_cancelled() {
                    send_farewell(writer, SHUTDOWN_REPLY).await;
                    Ok("server shutdown")
                } else {
                    send_farewell(writer, KICKED_REPLY).await;
                    Ok("kicked by administrator")
                };
            }
            _ = run.drain.cancelled() => {
                send_farewell(writer, SHUTDOWN_REPLY).await;
                return Ok("server stopping");
            }
            read = timeout(idle, read_command_line(reader, MAX_COMMAND_LINE)) => match read {
                Err(_) => {
                    send_farewell(writer, IDLE_TIMEOUT_REPLY).await;
                    return Ok("idle timeout");
                }
                Ok(Ok(None)) => return Ok("client closed connection"),
                Ok(Ok(Some(line))) => line,
                Ok(Err(e)) if e.is_fatal() => {
                    warn!("Session #{}: {}", session.connection_id, e);
                    let reply = Reply::from_response(&e.to_ftp_response());
                    send_farewell(writer, &reply.to_string()).await;
                    return Ok("protocol violation");
                }
                Ok(Err(e)) => return Err(e),
            }
        };

        let reply = match FtpCommand::parse(&line) {
            Ok(command) => {
                let mut ctx = CommandContext {
                    writer: &mut *writer,
                    session: &mut *session,
                    state: &run.state,
                    users: &run.users,
                    jail: run.jail.as_ref(),
                    config: run.config.as_ref(),
                    events: run.events.as_ref(),
                    cancel,
                };
                dispatch(&mut ctx, command).await
            }
            Err(e) => Reply::from_response(&e.to_ftp_response()),
        };
        send_reply(writer, &reply.to_string(), cancel).await?;

        if session.is_terminated() {
            return Ok("client quit");
        }
    }
}

/// Reads one control line of at most `limit` bytes.
///
/// Returns `None` on a clean end of stream, `ProtocolViolation` for an
/// over-long or non UTF-8 line.
pub async fn read_command_line<R>(reader: &mut R, limit: usize) -> Result<Option<String>, FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buffer)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if !buffer.ends_with(b"\n") && buffer.len() > limit {
        return Err(FtpError::ProtocolViolation(format!(
            "command line longer than {} bytes",
            limit
        )));
    }

    let line = String::from_utf8(buffer)
        .map_err(|_| FtpError::ProtocolViolation("command line is not UTF-8".into()))?;
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), FtpError> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes a reply unless the session is cancelled first. A reply that was
/// already due when the session got cancelled (a 426 for the aborted
/// transfer) still gets a short bounded attempt.
pub async fn send_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
    cancel: &CancellationToken,
) -> Result<(), FtpError> {
    if cancel.is_cancelled() {
        return match timeout(FAREWELL_WRITE_TIMEOUT, send_line(writer, line)).await {
            Ok(written) => written,
            Err(_) => Err(cancelled_write()),
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(cancelled_write()),
        written = send_line(writer, line) => written,
    }
}

/// Last line before closing. A client that does not read gets dropped anyway.
async fn send_farewell<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) {
    if timeout(FAREWELL_WRITE_TIMEOUT, send_line(writer, line))
        .await
        .is_err()
    {
        debug!("Client did not take the closing reply");
    }
}

fn cancelled_write() -> FtpError {
    FtpError::Io(std::io::Error::new(
        std::io::ErrorKind::Interrupted,
        "control write cancelled",
    ))
}

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::util::error::{ControlError, Result};

/// A live TCP connection to a device.
///
/// The read half sits behind a shared lock so a background task can own a reference
/// to it while the caller keeps the connection for later commands.
#[derive(Debug)]
pub struct Connection {
    reader: Arc<Mutex<BufReader<OwnedReadHalf>>>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl Connection {
    /// Dials `address`, giving up after `connect_timeout`.
    pub async fn open(address: &str, connect_timeout: Duration) -> Result<Self> {
        let stream = match timeout(connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ControlError::Connection {
                    address: address.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ControlError::Connection {
                    address: address.to_string(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect timed out after {:?}", connect_timeout),
                    ),
                })
            }
        };
        // Frames are small and latency matters more than throughput.
        stream.set_nodelay(true).map_err(|source| ControlError::Connection {
            address: address.to_string(),
            source,
        })?;
        let peer = stream.peer_addr().map_err(|source| ControlError::Connection {
            address: address.to_string(),
            source,
        })?;
        debug!("Connected to {}", peer);

        let (read_half, write_half) = stream.into_split();
        Ok(Connection {
            reader: Arc::new(Mutex::new(BufReader::new(read_half))),
            writer: write_half,
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Writes one complete frame.
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame).await.map_err(ControlError::Io)?;
        self.writer.flush().await.map_err(ControlError::Io)
    }

    /// Shared handle to the buffered read half, for a background reader task.
    pub(crate) fn reader(&self) -> Arc<Mutex<BufReader<OwnedReadHalf>>> {
        Arc::clone(&self.reader)
    }

    /// Shuts down the write side and drops the socket. Errors are ignored.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Ignoring error while closing connection to {}: {}", self.peer, e);
        }
        debug!("Closed connection to {}", self.peer);
    }
}

/// The device closed the connection before sending any byte of a response.
#[derive(Debug, Error)]
#[error("connection closed by device")]
pub(crate) struct PeerClosed;

/// Reads bytes up to and including the next `\n`.
///
/// A connection closed before anything arrived is reported as [`PeerClosed`]; one
/// closed in the middle of a line is a plain `UnexpectedEof`. Both carry that kind.
pub(crate) async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line).await?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, PeerClosed));
    }
    if line.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("connection closed after {} bytes of an unterminated line", read),
        ));
    }
    Ok(line)
}

/// Whether `error` shows the socket was already dead when the command went out,
/// so no part of an answer was consumed.
pub(crate) fn is_stale_socket(error: &io::Error) -> bool {
    match error.kind() {
        io::ErrorKind::UnexpectedEof => error
            .get_ref()
            .map_or(false, |inner| inner.is::<PeerClosed>()),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_closed_is_stale() {
        let closed = io::Error::new(io::ErrorKind::UnexpectedEof, PeerClosed);
        assert!(is_stale_socket(&closed));
        assert_eq!(closed.to_string(), "connection closed by device");

        let truncated = io::Error::new(io::ErrorKind::UnexpectedEof, "unterminated line");
        assert!(!is_stale_socket(&truncated));

        assert!(is_stale_socket(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_stale_socket(&io::Error::from(io::ErrorKind::TimedOut)));
    }
}

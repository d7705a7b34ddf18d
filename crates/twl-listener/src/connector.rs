//! Opening the byte stream behind a channel session.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use twl_core::{ChannelName, ListenerConfig};

/// Opens one bidirectional stream per channel.
///
/// The listener only needs a byte stream, so anything that can be read
/// and written (TCP, TLS, in-memory pipes) can stand behind a session.
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a fresh connection for `channel`.
    fn connect(
        &self,
        channel: &ChannelName,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connection to the chat server.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Creates a connector for a `host:port` address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Creates a connector for the server named in `config`.
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self::new(config.server_addr())
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, channel: &ChannelName) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        // PONG replies go out without coalescing delay.
        stream.set_nodelay(true)?;
        debug!(channel = %channel, addr = %self.addr, "TCP connection open");
        Ok(stream)
    }
}

//! One joined channel: its connection's write side and its log sink.
//!
//! A session is created by [`ChannelSession::join`], which opens the
//! connection, sends the `PASS` / `NICK` / `JOIN` handshake and opens the
//! log file. The read side of the connection is handed back to the caller
//! so it can be watched for readiness. No acknowledgement is read at join
//! time; the server starts sending channel traffic on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use twl_core::{ChannelName, CloseReason, Identity, ListenerConfig, SessionState};
use twl_protocol::{handshake, ChunkDecoder, Command, Inbound};

use crate::connector::Connector;
use crate::error::{timed_out, ListenError};
use crate::sink::LogSink;

/// What handling one received chunk did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Text appended to the log (bytes of text)
    Logged(usize),
    /// Keep-alive challenge answered, nothing logged
    Ponged,
    /// Nothing to do: the chunk only held part of a character
    Pending,
    /// Bytes were not valid UTF-8 and were dropped
    Skipped,
}

/// Per-channel counters reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub chunks_logged: u64,
    pub bytes_logged: u64,
    pub pings_answered: u64,
    pub decode_errors: u64,
}

/// Final state of a closed channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelName,
    pub state: SessionState,
    pub close_reason: CloseReason,
    pub log_path: PathBuf,
    #[serde(flatten)]
    pub stats: ChannelStats,
}

/// A joined channel.
///
/// Owns the write side of the connection and the log sink exclusively.
/// Closing consumes the session, so a closed session can never be polled
/// or written again.
#[derive(Debug)]
pub struct ChannelSession<W> {
    name: ChannelName,
    writer: W,
    sink: LogSink,
    state: SessionState,
    decoder: ChunkDecoder,
    stats: ChannelStats,
    write_timeout: Duration,
}

/// A session together with the read side of its connection.
pub struct Joined<S> {
    pub session: ChannelSession<WriteHalf<S>>,
    pub reader: ReadHalf<S>,
}

impl<S> ChannelSession<WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Connects, sends the join handshake and opens the channel's log.
    ///
    /// The session counts as joined only after all three commands were
    /// written. Any failure is returned to the caller, which decides
    /// whether to continue with other channels.
    pub async fn join<C>(
        connector: &C,
        identity: &Identity,
        channel: &ChannelName,
        log_root: &Path,
        config: &ListenerConfig,
    ) -> Result<Joined<S>, ListenError>
    where
        C: Connector<Stream = S>,
    {
        let connection_error = |source: std::io::Error| ListenError::Connection {
            channel: channel.clone(),
            source,
        };

        let stream = timeout(config.connect_timeout(), connector.connect(channel))
            .await
            .map_err(|_| connection_error(timed_out("connect")))?
            .map_err(connection_error)?;

        let (reader, mut writer) = tokio::io::split(stream);

        for command in handshake(identity, channel) {
            debug!(channel = %channel, command = %command, "Sending handshake command");
            write_command(&mut writer, &command, config.write_timeout())
                .await
                .map_err(connection_error)?;
        }

        let sink = LogSink::open(log_root, channel, config.log_format)
            .await
            .map_err(|source| ListenError::LogSetup {
                channel: channel.clone(),
                path: LogSink::path_for(log_root, channel),
                source,
            })?;

        let session = ChannelSession::joined(channel.clone(), writer, sink, config.write_timeout());
        info!(channel = %channel, log = %session.sink.path().display(), "Open channel");

        Ok(Joined { session, reader })
    }
}

impl<W> ChannelSession<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps an already handshaken connection and an open sink.
    pub(crate) fn joined(
        name: ChannelName,
        writer: W,
        sink: LogSink,
        write_timeout: Duration,
    ) -> Self {
        let state = SessionState::Unjoined
            .transition(SessionState::Joined)
            .unwrap_or(SessionState::Joined);
        Self {
            name,
            writer,
            sink,
            state,
            decoder: ChunkDecoder::new(),
            stats: ChannelStats::default(),
            write_timeout,
        }
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handles one chunk read from the connection.
    ///
    /// A chunk containing the keep-alive challenge is answered right away
    /// on this connection and not logged. The reply may take at most
    /// `allowance`, capped by the configured write timeout. Anything else
    /// is appended to the log verbatim. Undecodable chunks are dropped and
    /// counted; only write failures are returned as errors.
    pub async fn handle_chunk(
        &mut self,
        bytes: &[u8],
        allowance: Duration,
    ) -> Result<ChunkOutcome, ListenError> {
        let text = match self.decoder.decode(bytes) {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(ChunkOutcome::Pending),
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(channel = %self.name, error = %e, "Dropping undecodable chunk");
                return Ok(ChunkOutcome::Skipped);
            }
        };

        match Inbound::classify(text) {
            Inbound::KeepAlive => {
                let limit = allowance.min(self.write_timeout);
                write_command(&mut self.writer, &Command::Pong, limit)
                    .await
                    .map_err(|source| self.io_error(source))?;
                self.stats.pings_answered += 1;
                debug!(channel = %self.name, "Answered keep-alive");
                Ok(ChunkOutcome::Ponged)
            }
            Inbound::Text(text) => {
                self.sink
                    .append(&text)
                    .await
                    .map_err(|source| self.io_error(source))?;
                self.stats.chunks_logged += 1;
                self.stats.bytes_logged += text.len() as u64;
                Ok(ChunkOutcome::Logged(text.len()))
            }
        }
    }

    /// Closes the connection and the log, returning the channel's report.
    pub async fn close(self, reason: CloseReason) -> ChannelReport {
        let limit = self.write_timeout;
        self.close_within(reason, limit).await
    }

    /// Like [`close`](Self::close), but gives the connection shutdown at
    /// most `allowance`.
    pub async fn close_within(
        mut self,
        reason: CloseReason,
        allowance: Duration,
    ) -> ChannelReport {
        if let Some(next) = self.state.transition(SessionState::Closed) {
            self.state = next;
        }

        let limit = allowance.min(self.write_timeout);
        match timeout(limit, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(channel = %self.name, error = %e, "Connection shutdown failed"),
            Err(_) => debug!(channel = %self.name, "Connection shutdown timed out"),
        }

        if self.decoder.pending_len() > 0 {
            debug!(
                channel = %self.name,
                bytes = self.decoder.pending_len(),
                "Dropping incomplete character at close"
            );
        }

        let log_path = self.sink.path().to_path_buf();
        if let Err(e) = self.sink.close().await {
            warn!(channel = %self.name, error = %e, "Failed to flush log");
        }

        info!(channel = %self.name, reason = %reason, "Close channel");

        ChannelReport {
            channel: self.name,
            state: self.state,
            close_reason: reason,
            log_path,
            stats: self.stats,
        }
    }

    fn io_error(&self, source: std::io::Error) -> ListenError {
        ListenError::ChannelIo {
            channel: self.name.clone(),
            source,
        }
    }
}

/// Writes one command and flushes, bounded by `limit`.
async fn write_command<W>(writer: &mut W, command: &Command, limit: Duration) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let wire = command.to_wire();
    timeout(limit, async {
        writer.write_all(wire.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| timed_out(command.verb()))?
}

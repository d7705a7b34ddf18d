//! Errors raised while joining and polling channels.

use std::io;
use std::path::PathBuf;

use twl_core::ChannelName;

/// Errors that can occur in listener operations.
///
/// `Connection` and `LogSetup` happen while joining and abort the whole
/// `listen` call. `ChannelIo` happens on an already joined channel; the
/// listener closes that channel and keeps polling the others.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("Failed to join channel {channel}: {source}")]
    Connection {
        channel: ChannelName,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open log {path} for channel {channel}: {source}")]
    LogSetup {
        channel: ChannelName,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on channel {channel}: {source}")]
    ChannelIo {
        channel: ChannelName,
        #[source]
        source: io::Error,
    },

    #[error("No channels to listen to")]
    NoChannels,
}

impl ListenError {
    /// Returns the channel the error belongs to, if any.
    pub fn channel(&self) -> Option<&ChannelName> {
        match self {
            ListenError::Connection { channel, .. }
            | ListenError::LogSetup { channel, .. }
            | ListenError::ChannelIo { channel, .. } => Some(channel),
            ListenError::NoChannels => None,
        }
    }
}

/// Builds a `TimedOut` error for an operation that exceeded its bound.
pub(crate) fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{what} timed out"))
}

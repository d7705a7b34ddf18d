//! twitch-listener - multiplexed channel listener
//!
//! This crate joins a set of chat channels, one connection each, and
//! records everything they receive to per-channel log files for a bounded
//! duration:
//! - `connector` - opening the byte stream for a channel
//! - `session` - the join handshake and per-channel handling of chunks
//! - `readiness` - waiting on all connections at once
//! - `pacing` - the global tick budget derived from the rate limit
//! - `listener` - the polling loop tying it together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Listener                          │
//! │                                                          │
//! │  join ──▶ ChannelSession (write half + LogSink) × N      │
//! │                 ▲                                        │
//! │                 │ chunks, in join order                  │
//! │  ReaderPool ────┘   (read half × N, bounded wait)        │
//! │                                                          │
//! │  Pacer: sleep(budget - tick) after every tick            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate does not use `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()`; channel failures are
//! reported, not propagated as panics.

pub mod connector;
pub mod error;
pub mod listener;
pub mod pacing;
pub mod readiness;
pub mod session;
pub mod sink;
pub mod summary;

pub use connector::{Connector, TcpConnector};
pub use error::ListenError;
pub use listener::Listener;
pub use pacing::{Pacer, RateLimit};
pub use readiness::{ReadEvent, ReadOutcome, Readiness, ReaderPool};
pub use session::{ChannelReport, ChannelSession, ChannelStats, ChunkOutcome, Joined};
pub use sink::LogSink;
pub use summary::ListenSummary;

//! twitch-listener core - shared domain types
//!
//! This crate provides the types shared between the wire protocol
//! (`twl-protocol`) and the listener (`twl-listener`):
//! - `Identity` - credentials sent during the join handshake
//! - `ChannelName` / `ChannelList` - validated, ordered channel sets
//! - `SessionState` - lifecycle of one joined channel
//! - `ListenerConfig` - endpoint, buffer, timeout and rate-limit settings
//!
//! Production code is panic-free: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()` or `todo!()`.

pub mod channel;
pub mod config;
pub mod error;
pub mod identity;
pub mod state;

// Re-exports for convenience
pub use channel::{ChannelList, ChannelName};
pub use config::{ListenerConfig, LogFormat, RateLimitConfig};
pub use error::{CoreError, CoreResult};
pub use identity::{normalize_token, Identity, TOKEN_PREFIX};
pub use state::{CloseReason, SessionState};

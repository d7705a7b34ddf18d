//! twitch-listener protocol - the IRC subset spoken to the chat server
//!
//! This crate covers the few commands the listener sends (`PASS`, `NICK`,
//! `JOIN`, `PONG`) and the handling of raw received chunks: UTF-8
//! decoding across read boundaries and keep-alive detection. Received chat
//! content is otherwise not interpreted.

pub mod chunk;
pub mod command;

pub use chunk::{ChunkDecoder, DecodeError, Inbound};
pub use command::{handshake, Command, PING_CHALLENGE, PONG_REPLY, SERVER_NAME};

//! Lifecycle of one channel session.

use std::fmt;

use serde::Serialize;

/// State machine for a channel session: `Unjoined -> Joined -> Closed`.
///
/// Each transition happens at most once; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unjoined,
    Joined,
    Closed,
}

impl SessionState {
    /// Returns the next state if `next` is a legal transition from `self`.
    #[must_use]
    pub fn transition(self, next: SessionState) -> Option<SessionState> {
        match (self, next) {
            (SessionState::Unjoined, SessionState::Joined)
            | (SessionState::Joined, SessionState::Closed) => Some(next),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Unjoined => "unjoined",
            SessionState::Joined => "joined",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Why a session left the `Joined` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CloseReason {
    /// The requested listening duration elapsed
    DurationElapsed,
    /// The caller cancelled the listener
    Cancelled,
    /// The server closed the connection
    Eof,
    /// Reading or writing the connection failed
    Io(String),
    /// Setting up a later channel failed and the whole join was abandoned
    JoinAborted,
}

impl CloseReason {
    /// Returns true for reasons caused by a connection fault.
    pub fn is_failure(&self) -> bool {
        matches!(self, CloseReason::Eof | CloseReason::Io(_))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::DurationElapsed => f.write_str("duration elapsed"),
            CloseReason::Cancelled => f.write_str("cancelled"),
            CloseReason::Eof => f.write_str("connection closed by server"),
            CloseReason::Io(e) => write!(f, "i/o error: {e}"),
            CloseReason::JoinAborted => f.write_str("join aborted"),
        }
    }
}

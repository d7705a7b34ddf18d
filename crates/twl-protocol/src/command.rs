//! Outbound commands.

use std::fmt;

use twl_core::{ChannelName, Identity};

/// Server name used in keep-alive messages.
pub const SERVER_NAME: &str = "tmi.twitch.tv";

/// Keep-alive challenge sent by the server.
pub const PING_CHALLENGE: &str = "PING :tmi.twitch.tv\r\n";

/// Reply the server expects for [`PING_CHALLENGE`].
pub const PONG_REPLY: &str = "PONG :tmi.twitch.tv\r\n";

/// A command written to the chat connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `PASS <token>` - authenticates with the normalized token
    Pass(String),
    /// `NICK <nickname>`
    Nick(String),
    /// `JOIN <target>` - target already carries the `#`
    Join(String),
    /// Keep-alive reply
    Pong,
}

impl Command {
    /// Returns the exact bytes put on the wire, terminator included.
    pub fn to_wire(&self) -> String {
        match self {
            Command::Pass(token) => format!("PASS {token}\n"),
            Command::Nick(nick) => format!("NICK {nick}\n"),
            Command::Join(target) => format!("JOIN {target}\n"),
            Command::Pong => PONG_REPLY.to_string(),
        }
    }

    /// Returns the command verb.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Pass(_) => "PASS",
            Command::Nick(_) => "NICK",
            Command::Join(_) => "JOIN",
            Command::Pong => "PONG",
        }
    }
}

// Display never prints the token.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(_) => write!(f, "PASS <redacted>"),
            Command::Nick(nick) => write!(f, "NICK {nick}"),
            Command::Join(target) => write!(f, "JOIN {target}"),
            Command::Pong => write!(f, "PONG :{SERVER_NAME}"),
        }
    }
}

/// Builds the join handshake for one channel: `PASS`, `NICK`, `JOIN`.
pub fn handshake(identity: &Identity, channel: &ChannelName) -> [Command; 3] {
    [
        Command::Pass(identity.token().to_string()),
        Command::Nick(identity.nickname().to_string()),
        Command::Join(channel.irc_target()),
    ]
}

//! Credentials used to authenticate each channel connection.

use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Prefix the chat server expects in front of every access token.
pub const TOKEN_PREFIX: &str = "oauth:";

/// Returns `token` carrying [`TOKEN_PREFIX`] exactly once.
///
/// Tokens that already start with the prefix are returned unchanged, so
/// `normalize_token(&normalize_token(t)) == normalize_token(t)`.
pub fn normalize_token(token: &str) -> String {
    if token.starts_with(TOKEN_PREFIX) {
        token.to_string()
    } else {
        format!("{TOKEN_PREFIX}{token}")
    }
}

/// Account identity used for the `PASS` / `NICK` part of the handshake.
///
/// Immutable once constructed. The token is always normalized and is never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    nickname: String,
    token: String,
    client_id: String,
}

impl Identity {
    /// Builds an identity, rejecting an empty nickname or token.
    ///
    /// The client id is kept for callers that need it; it is not sent over
    /// the chat connection.
    pub fn new(
        nickname: impl Into<String>,
        token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> CoreResult<Self> {
        let nickname = nickname.into().trim().to_string();
        let token = token.into().trim().to_string();

        if nickname.is_empty() {
            return Err(CoreError::InvalidCredential {
                field: "nickname",
                reason: "must not be empty".to_string(),
            });
        }
        if nickname.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidCredential {
                field: "nickname",
                reason: "must not contain whitespace".to_string(),
            });
        }
        // A bare prefix carries no secret at all.
        if token.is_empty() || token == TOKEN_PREFIX {
            return Err(CoreError::InvalidCredential {
                field: "token",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            nickname,
            token: normalize_token(&token),
            client_id: client_id.into(),
        })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Returns the normalized token (always starts with `oauth:`).
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("nickname", &self.nickname)
            .field("token", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

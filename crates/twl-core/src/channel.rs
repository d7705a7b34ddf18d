//! Channel names and the ordered set of channels to join.

use std::fmt;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

/// A channel to join, as given by the caller.
///
/// The stored name keeps the caller's spelling (it names the log file);
/// the wire target is always lower-cased and prefixed with `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Validates and wraps a channel name.
    ///
    /// Surrounding whitespace and a single leading `#` are stripped.
    /// Names that are empty afterwards, or that contain whitespace, commas
    /// or path separators, are rejected.
    pub fn new(name: impl AsRef<str>) -> CoreResult<Self> {
        let raw = name.as_ref();
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed);

        if trimmed.is_empty() {
            return Err(CoreError::InvalidChannel {
                name: raw.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, ',' | '/' | '\\' | '#'))
        {
            return Err(CoreError::InvalidChannel {
                name: raw.to_string(),
                reason: format!("contains forbidden character {bad:?}"),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `JOIN` target: `#` followed by the lower-cased name.
    #[must_use]
    pub fn irc_target(&self) -> String {
        format!("#{}", self.0.to_lowercase())
    }

    /// Returns the log file name: `<name>.log`.
    #[must_use]
    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.0)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered set of channels. Iteration order is join order.
///
/// Two names that only differ in case join the same IRC channel, so the
/// later one is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList {
    channels: Vec<ChannelName>,
}

impl ChannelList {
    /// Builds the list from raw names, validating each one.
    pub fn parse<I, S>(names: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for name in names {
            list.push(ChannelName::new(name)?);
        }
        Ok(list)
    }

    /// Appends a channel unless an equivalent one is already present.
    ///
    /// Returns `false` when the channel was a duplicate.
    pub fn push(&mut self, channel: ChannelName) -> bool {
        let target = channel.irc_target();
        if self.channels.iter().any(|c| c.irc_target() == target) {
            tracing::debug!(channel = %channel, "Skipping duplicate channel");
            return false;
        }
        self.channels.push(channel);
        true
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChannelName> {
        self.channels.iter()
    }
}

impl<'a> IntoIterator for &'a ChannelList {
    type Item = &'a ChannelName;
    type IntoIter = std::slice::Iter<'a, ChannelName>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

impl FromIterator<ChannelName> for ChannelList {
    fn from_iter<T: IntoIterator<Item = ChannelName>>(iter: T) -> Self {
        let mut list = Self::default();
        for channel in iter {
            list.push(channel);
        }
        list
    }
}

//! What one `listen` call did.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::ChannelReport;

/// Summary returned by `Listener::listen`.
///
/// Serializable so callers can print or store it.
#[derive(Debug, Clone, Serialize)]
pub struct ListenSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Time spent in the polling loop
    pub elapsed_ms: u64,
    /// Polling loop iterations
    pub ticks: u64,
    /// Total pacing sleep
    pub paced_ms: u64,
    /// True when the cancellation token ended the loop early
    pub cancelled: bool,
    /// One report per channel, in join order
    pub channels: Vec<ChannelReport>,
}

impl ListenSummary {
    /// Channels that were closed by a connection fault before the end.
    pub fn failed_channels(&self) -> impl Iterator<Item = &ChannelReport> {
        self.channels.iter().filter(|c| c.close_reason.is_failure())
    }

    /// Total text bytes appended across all channels.
    pub fn bytes_logged(&self) -> u64 {
        self.channels.iter().map(|c| c.stats.bytes_logged).sum()
    }

    /// Total keep-alive challenges answered across all channels.
    pub fn pings_answered(&self) -> u64 {
        self.channels.iter().map(|c| c.stats.pings_answered).sum()
    }
}

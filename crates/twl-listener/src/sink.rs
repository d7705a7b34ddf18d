//! Append-only log file per channel.
//!
//! File operations go through `tokio::fs` and run on the blocking pool.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use twl_core::{ChannelName, LogFormat};

/// Write-only text sink for one channel, stored at `<log_root>/<channel>.log`.
///
/// Every append is flushed so the file can be followed while listening.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
    format: LogFormat,
}

impl LogSink {
    /// Opens (creating if needed) the channel's log file in append mode.
    ///
    /// `log_root` is created when missing.
    pub async fn open(
        log_root: &Path,
        channel: &ChannelName,
        format: LogFormat,
    ) -> io::Result<Self> {
        fs::create_dir_all(log_root).await?;
        let path = Self::path_for(log_root, channel);
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            format,
        })
    }

    /// Returns where the sink is defined to live, without opening it.
    pub fn path_for(log_root: &Path, channel: &ChannelName) -> PathBuf {
        log_root.join(channel.log_file_name())
    }

    /// Appends `text` and flushes.
    pub async fn append(&mut self, text: &str) -> io::Result<()> {
        if let LogFormat::Timestamped = self.format {
            let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            self.writer.write_all(format!("[{stamp}] ").as_bytes()).await?;
        }
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await
    }

    /// Flushes and releases the file.
    pub async fn close(mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

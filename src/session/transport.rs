//! Transport contract shared by the console and automation back ends.

use std::time::{Duration, Instant};

use crate::chunk::Chunk;
use crate::session::error::TransportError;

/// One submitted line and the raw text captured for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Line as sent.
    pub sent: String,
    /// Raw output captured after sending it.
    pub raw: String,
}

/// Ordered record of what one chunk sent and got back.
///
/// Recording stops at the first line that reported an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTranscript {
    entries: Vec<TranscriptEntry>,
}

impl SessionTranscript {
    /// Records one exchange.
    pub fn record(&mut self, sent: impl Into<String>, raw: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            sent: sent.into(),
            raw: raw.into(),
        });
    }

    /// Recorded exchanges in order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of lines sent.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was sent.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when `line` was sent.
    pub fn sent(&self, line: &str) -> bool {
        self.entries.iter().any(|entry| entry.sent == line)
    }
}

/// Log-formatted text captured for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCapture {
    /// Output in session log format: echoes as `. <line>`, then output.
    pub text: String,
    /// Return code of the first failing line, or `0`.
    pub return_code: i32,
    /// Per-line exchange record.
    pub transcript: SessionTranscript,
}

/// A transport error with whatever was captured before it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TransportFailure {
    /// What went wrong.
    #[source]
    pub error: TransportError,
    /// Capture up to the failure.
    pub partial: RawCapture,
}

impl TransportFailure {
    /// Wraps `error` with a partial capture.
    pub fn new(error: TransportError, partial: RawCapture) -> Self {
        Self { error, partial }
    }
}

impl From<TransportError> for TransportFailure {
    fn from(error: TransportError) -> Self {
        Self::new(error, RawCapture::default())
    }
}

/// Moves one chunk through the statistics process.
pub trait Transport {
    /// Submits `chunk` and captures its output.
    ///
    /// For indirect chunks the include script must already be on disk.
    fn run(&mut self, chunk: &Chunk) -> Result<RawCapture, TransportFailure>;

    /// Discards buffered state after a failed call.
    fn reset(&mut self);

    /// Ends the process session.
    fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// Overall deadline of one call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Starts a deadline of `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Time left, or a timeout error naming `waiting_for`.
    pub fn remaining(&self, waiting_for: &'static str) -> Result<Duration, TransportError> {
        let elapsed = self.started.elapsed();
        if elapsed >= self.limit {
            return Err(TransportError::Timeout {
                waiting_for,
                elapsed_ms: elapsed.as_millis(),
            });
        }
        Ok(self.limit - elapsed)
    }
}

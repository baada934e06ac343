//! Message-based transport over an automation API and a session log file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::cache::CachePaths;
use crate::chunk::Chunk;
use crate::session::decode::Utf8Carry;
use crate::session::error::TransportError;
use crate::session::reconcile::join_wrapped_echoes;
use crate::session::transport::{Deadline, RawCapture, Transport, TransportFailure};

/// Log name used for the session log.
pub const LOG_NAME: &str = "stata_kernel_log";

/// Number of numbered log files tried before giving up.
pub const LOG_ATTEMPTS: u32 = 15;

/// Value returned by a generic automation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationValue {
    /// Boolean result.
    Bool(bool),
    /// Integer result.
    Int(i64),
    /// Any other result text.
    Text(String),
}

impl AutomationValue {
    /// Resolves raw command output to the narrowest value type.
    pub fn resolve(raw: &str) -> Self {
        let raw = raw.trim_end_matches(['\r', '\n']);
        match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => raw
                .trim()
                .parse()
                .map_or_else(|_| Self::Text(raw.to_string()), Self::Int),
        }
    }
}

/// Request/response interface of the statistics application.
pub trait AutomationApi {
    /// Runs `command` and waits for it; returns its return code.
    fn submit_and_wait(&mut self, command: &str) -> Result<i32, TransportError>;

    /// Starts `command` without waiting.
    fn submit_async(&mut self, command: &str) -> Result<(), TransportError>;

    /// Returns `true` while a command is running.
    fn poll_busy(&mut self) -> Result<bool, TransportError>;

    /// Return code of the most recent asynchronous command.
    fn last_error_code(&mut self) -> Result<i32, TransportError>;

    /// Issues any other named command.
    fn generic_command(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<AutomationValue, TransportError>;

    /// Blocks until the application is idle, when the API can signal it.
    ///
    /// Returns `None` when unsupported, in which case the transport polls
    /// [`AutomationApi::poll_busy`].
    fn wait_until_idle(&mut self, _timeout: Duration) -> Option<Result<(), TransportError>> {
        None
    }
}

/// Drives an [`AutomationApi`] and tails the session log for output.
pub struct AutomationTransport<A: AutomationApi> {
    api: A,
    log_path: PathBuf,
    log_offset: u64,
    decoder: Utf8Carry,
    timeout: Duration,
    poll_interval: Duration,
}

impl<A: AutomationApi> AutomationTransport<A> {
    /// Opens the session log and returns the transport.
    ///
    /// Numbered log files are tried in turn, since another running
    /// application may hold one open.
    pub fn open(
        mut api: A,
        cache: &CachePaths,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, TransportError> {
        api.submit_and_wait(&format!("cap log close {LOG_NAME}"))?;

        let mut opened = None;
        for index in 0..LOG_ATTEMPTS {
            let path = cache.log_file(index);
            let command = format!(
                "log using `\"{}\"', replace text name({LOG_NAME})",
                path.to_string_lossy().replace('\\', "/")
            );
            let code = api.submit_and_wait(&command)?;
            if code == 0 {
                opened = Some(path);
                break;
            }
            warn!(code, path = %path.display(), "log file unavailable");
            thread::sleep(poll_interval);
        }
        let log_path = opened.ok_or_else(|| TransportError::LogUnavailable {
            directory: cache.root().to_path_buf(),
            attempts: LOG_ATTEMPTS,
        })?;

        let log_offset = std::fs::metadata(&log_path)
            .map(|metadata| metadata.len())
            .map_err(|source| TransportError::io("reading log metadata", source))?;
        debug!(path = %log_path.display(), "session log opened");

        Ok(Self {
            api,
            log_path,
            log_offset,
            decoder: Utf8Carry::new(),
            timeout,
            poll_interval,
        })
    }

    /// Path of the open session log.
    pub fn log_path(&self) -> &std::path::Path {
        &self.log_path
    }

    /// Borrows the API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Reads log text appended since the last read.
    fn read_log(&mut self) -> Result<String, TransportError> {
        let mut file = File::open(&self.log_path)
            .map_err(|source| TransportError::io("opening session log", source))?;
        file.seek(SeekFrom::Start(self.log_offset))
            .map_err(|source| TransportError::io("seeking session log", source))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| TransportError::io("reading session log", source))?;
        self.log_offset += bytes.len() as u64;
        Ok(self.decoder.decode(&bytes))
    }

    fn wait_idle(&mut self, deadline: &Deadline) -> Result<(), TransportError> {
        let remaining = deadline.remaining("idle application")?;
        if let Some(result) = self.api.wait_until_idle(remaining) {
            return result;
        }
        let mut polls = 0u32;
        while self.api.poll_busy()? {
            polls += 1;
            let remaining = deadline.remaining("idle application")?;
            thread::sleep(self.poll_interval.min(remaining));
        }
        trace!(polls, "application idle");
        Ok(())
    }

    /// Tails the log until a line echoing `sentinel` shows up.
    ///
    /// The echo may be wrapped over `> ` continuation lines when it is
    /// longer than the line size.
    fn tail_until(
        &mut self,
        sentinel: &str,
        deadline: &Deadline,
        collected: &mut String,
    ) -> Result<(), TransportError> {
        loop {
            collected.push_str(&self.read_log()?);
            let normalized = collected.replace("\r\n", "\n");
            if join_wrapped_echoes(&normalized)
                .iter()
                .any(|line| echoes(line, sentinel))
            {
                return Ok(());
            }
            let remaining = deadline.remaining("sentinel echo")?;
            thread::sleep(self.poll_interval.min(remaining));
        }
    }

    fn run_lines(&mut self, chunk: &Chunk, capture: &mut RawCapture) -> Result<(), TransportError> {
        let deadline = Deadline::after(self.timeout);
        let lines: Vec<&str> = chunk.submission_lines().collect();
        let Some((sentinel, statements)) = lines.split_last() else {
            return Ok(());
        };

        for line in statements {
            debug!(line = *line, indirect = chunk.requires_indirection, "submitting");
            let code = if chunk.requires_indirection {
                self.api.submit_async(line)?;
                self.wait_idle(&deadline)?;
                self.api.last_error_code()?
            } else {
                self.api.submit_and_wait(line)?
            };
            let raw = self.read_log()?;
            capture.text.push_str(&raw);
            capture.transcript.record(*line, raw);
            if code != 0 {
                warn!(code, line = *line, "command failed; remaining lines dropped");
                capture.return_code = code;
                break;
            }
        }

        // The sentinel also runs after a failure so the log is known to be
        // flushed up to that point.
        self.api.submit_async(sentinel)?;
        let mut tail = String::new();
        self.tail_until(sentinel, &deadline, &mut tail)?;
        capture.text.push_str(&tail);
        capture.transcript.record(*sentinel, tail);
        Ok(())
    }
}

/// Returns `true` when `line` is the log echo of `submitted`.
fn echoes(line: &str, submitted: &str) -> bool {
    line.strip_prefix('.')
        .is_some_and(|rest| rest.trim() == submitted.trim())
}

impl<A: AutomationApi> Transport for AutomationTransport<A> {
    fn run(&mut self, chunk: &Chunk) -> Result<RawCapture, TransportFailure> {
        let mut capture = RawCapture::default();
        match self.run_lines(chunk, &mut capture) {
            Ok(()) => Ok(capture),
            Err(error) => Err(TransportFailure::new(error, capture)),
        }
    }

    fn reset(&mut self) {
        if let Ok(metadata) = std::fs::metadata(&self.log_path) {
            self.log_offset = metadata.len();
        }
        self.decoder = Utf8Carry::new();
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        self.api.submit_and_wait(&format!("cap log close {LOG_NAME}"))?;
        self.api.submit_async("exit, clear")
    }
}

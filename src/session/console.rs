//! Character-stream transport over a line-oriented console process.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::chunk::Chunk;
use crate::session::error::TransportError;
use crate::session::transport::{Deadline, RawCapture, Transport, TransportFailure};

/// Text the console prints when it is ready for the next line.
pub const READY_PROMPT: &str = "\n. ";

/// Pager marker shown while output is held back.
const MORE_MARKER: &str = "--more--";

/// Longest single wait on the channel, so the deadline is rechecked.
const READ_SLICE: Duration = Duration::from_millis(250);

/// Return code reported for a break when the console prints none.
pub const BREAK_CODE: i32 = 1;

static ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^r\((\d+)\);").expect("valid error code pattern"));

/// Bidirectional text channel to a console process.
pub trait LineChannel {
    /// Writes `line` followed by a newline.
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Interrupts whatever the process is running.
    fn send_break(&mut self) -> Result<(), TransportError>;

    /// Waits up to `timeout` for more output.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// [`TransportError::Closed`] once the process output has ended.
    fn read(&mut self, timeout: Duration) -> Result<Option<String>, TransportError>;

    /// Ends the process.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Returns the code of the first `r(<code>);` line in `raw`.
pub fn error_code(raw: &str) -> Option<i32> {
    ERROR_CODE
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .and_then(|code| code.as_str().parse().ok())
}

/// What ended one read of the console.
enum Reply {
    /// The ready prompt came back; holds the text before it.
    Prompt(String),
    /// Output stopped at the pager; holds the text shown so far.
    Paged(String),
}

/// Returns `true` when the last line shown is the pager marker.
fn ends_with_pager(buffer: &str) -> bool {
    let shown = buffer.trim_end();
    let last_line = shown.rsplit('\n').next().unwrap_or(shown);
    last_line.trim_start() == MORE_MARKER
}

/// Drives a console process one physical line at a time.
pub struct ConsoleTransport<C: LineChannel> {
    channel: C,
    timeout: Duration,
    buffer: String,
}

impl<C: LineChannel> ConsoleTransport<C> {
    /// Wraps `channel`; each call must finish within `timeout`.
    pub fn new(channel: C, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            buffer: String::new(),
        }
    }

    /// Waits for the first ready prompt and returns the banner before it.
    ///
    /// A pager stop during startup is dismissed until the prompt shows.
    pub fn start(&mut self) -> Result<String, TransportError> {
        let deadline = Deadline::after(self.timeout);
        let mut banner = String::new();
        loop {
            if let Some(text) = self.take_through_prompt() {
                banner.push_str(&text);
                break;
            }
            if ends_with_pager(&self.buffer) {
                let shown = self.buffer.trim_end().trim_end_matches(MORE_MARKER).to_string();
                banner.push_str(&shown);
                self.buffer.clear();
                self.channel.send_line("q")?;
                continue;
            }
            let remaining = deadline.remaining("startup prompt")?;
            if let Some(text) = self.channel.read(remaining.min(READ_SLICE))? {
                self.append(&text);
            }
        }
        debug!(bytes = banner.len(), "console ready");
        Ok(banner.trim().to_string())
    }

    /// Borrows the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    /// Takes the buffered text when it ends with the ready prompt, without
    /// the trailing `". "`.
    fn take_through_prompt(&mut self) -> Option<String> {
        if !self.buffer.ends_with(READY_PROMPT) && self.buffer != READY_PROMPT[1..] {
            return None;
        }
        let mut text = std::mem::take(&mut self.buffer);
        text.truncate(text.len() - 2);
        Some(text)
    }

    fn read_reply(&mut self, deadline: &Deadline) -> Result<Reply, TransportError> {
        loop {
            if self.buffer.ends_with(READY_PROMPT) {
                // Output that already arrived belongs to the same reply.
                match self.channel.read(Duration::ZERO)? {
                    Some(more) => {
                        self.append(&more);
                        continue;
                    }
                    None => {
                        if let Some(text) = self.take_through_prompt() {
                            trace!(bytes = text.len(), "prompt matched");
                            return Ok(Reply::Prompt(text));
                        }
                    }
                }
            }
            if ends_with_pager(&self.buffer) {
                trace!("pager stop");
                return Ok(Reply::Paged(std::mem::take(&mut self.buffer)));
            }
            let remaining = deadline.remaining("ready prompt")?;
            match self.channel.read(remaining.min(READ_SLICE)) {
                Ok(Some(text)) => self.append(&text),
                Ok(None) => {}
                Err(TransportError::Closed) if !self.buffer.is_empty() => {
                    return Err(TransportError::MissingPrompt);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn read_until_prompt(&mut self, deadline: &Deadline) -> Result<String, TransportError> {
        let mut text = String::new();
        loop {
            match self.read_reply(deadline)? {
                Reply::Prompt(rest) => {
                    text.push_str(&rest);
                    return Ok(text);
                }
                // A pager stop while settling is not user output.
                Reply::Paged(shown) => {
                    text.push_str(&shown);
                    self.channel.send_line("q")?;
                }
            }
        }
    }

    fn push_reply(capture: &mut RawCapture, raw: &str, echoed: bool) {
        if echoed {
            capture.text.push_str(". ");
        }
        capture.text.push_str(raw);
        if !raw.ends_with('\n') {
            capture.text.push('\n');
        }
    }

    /// Sends `line` and reads its reply.
    ///
    /// Returns the error code the reply carried. A pager stop is broken
    /// out of: the sentinel is sent right away and the break code is
    /// returned, with the sentinel echo already captured.
    fn exchange(
        &mut self,
        line: &str,
        sentinel: &str,
        deadline: &Deadline,
        capture: &mut RawCapture,
    ) -> Result<Option<i32>, TransportError> {
        debug!(line, "sending line");
        self.channel.send_line(line)?;
        match self.read_reply(deadline)? {
            Reply::Prompt(raw) => {
                Self::push_reply(capture, &raw, true);
                let code = error_code(&raw);
                capture.transcript.record(line, raw);
                Ok(code)
            }
            Reply::Paged(shown) => {
                warn!(line, "pager stop during execution; sending break");
                Self::push_reply(capture, &shown, true);
                capture.transcript.record(line, shown);

                self.channel.send_break()?;
                let broken = self.read_until_prompt(deadline)?;
                Self::push_reply(capture, &broken, false);
                let code = error_code(&broken).unwrap_or(BREAK_CODE);

                self.channel.send_line(sentinel)?;
                let tail = self.read_until_prompt(deadline)?;
                Self::push_reply(capture, &tail, true);
                capture.transcript.record(sentinel, tail);
                Ok(Some(code))
            }
        }
    }

    fn run_lines(&mut self, chunk: &Chunk, capture: &mut RawCapture) -> Result<(), TransportError> {
        let deadline = Deadline::after(self.timeout);
        let lines: Vec<&str> = chunk.submission_lines().collect();
        let Some((sentinel, statements)) = lines.split_last() else {
            return Ok(());
        };

        for line in statements {
            if let Some(code) = self.exchange(line, sentinel, &deadline, capture)? {
                warn!(code, line = *line, "error marker found; remaining lines dropped");
                capture.return_code = code;
                return Ok(());
            }
        }
        self.exchange(sentinel, sentinel, &deadline, capture)?;
        Ok(())
    }
}

impl<C: LineChannel> Transport for ConsoleTransport<C> {
    fn run(&mut self, chunk: &Chunk) -> Result<RawCapture, TransportFailure> {
        let mut capture = RawCapture::default();
        match self.run_lines(chunk, &mut capture) {
            Ok(()) => Ok(capture),
            Err(error) => Err(TransportFailure::new(error, capture)),
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        while let Ok(Some(_)) = self.channel.read(Duration::ZERO) {}
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        self.channel.send_line("exit, clear")?;
        self.channel.close()
    }
}

//! Scripted stand-ins for the console process and the automation API.

use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stata_engine::session::{
    AutomationApi, AutomationValue, LineChannel, SessionConfig, TransportError,
};

pub fn config_in(cache: &Path) -> SessionConfig {
    SessionConfig {
        cache_directory: cache.to_path_buf(),
        timeout_ms: 2_000,
        poll_interval_ms: 1,
        ..SessionConfig::default()
    }
}

/// Console emulator: echoes each line, prints its scripted output, then
/// shows the ready prompt.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    pub sent: Vec<String>,
    pub breaks: u32,
    replies: HashMap<String, String>,
    paged: HashMap<String, String>,
    pending: VecDeque<String>,
    unresponsive: bool,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        let mut console = Self::default();
        console.pending.push_back("  ___  ____  ____\n Statistics\n\n. ".to_string());
        console
    }

    pub fn with_banner(banner: &str) -> Self {
        let mut console = Self::default();
        console.pending.push_back(banner.to_string());
        console
    }

    pub fn unresponsive() -> Self {
        Self {
            unresponsive: true,
            ..Self::default()
        }
    }

    pub fn reply(mut self, line: &str, output: &str) -> Self {
        self.replies.insert(line.to_string(), output.to_string());
        self
    }

    /// Shows `output` for `line` and then stops at the pager.
    pub fn paged(mut self, line: &str, output: &str) -> Self {
        self.paged.insert(line.to_string(), output.to_string());
        self
    }
}

impl LineChannel for ScriptedConsole {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.sent.push(line.to_string());
        if self.unresponsive {
            return Ok(());
        }
        let mut reply = format!("{line}\n");
        if let Some(output) = self.paged.get(line) {
            reply.push_str(output);
            reply.push_str("\n--more--");
            self.pending.push_back(reply);
            return Ok(());
        }
        if let Some(output) = self.replies.get(line) {
            reply.push_str(output);
            reply.push('\n');
        }
        reply.push_str(". ");
        self.pending.push_back(reply);
        Ok(())
    }

    fn send_break(&mut self) -> Result<(), TransportError> {
        self.breaks += 1;
        self.pending.push_back("--Break--\nr(1);\n\n. ".to_string());
        Ok(())
    }

    fn read(&mut self, _timeout: Duration) -> Result<Option<String>, TransportError> {
        Ok(self.pending.pop_front())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Automation emulator that writes echoes and output to the session log.
#[derive(Debug, Default)]
pub struct ScriptedAutomation {
    pub submitted: Vec<String>,
    pub polls: u32,
    outputs: HashMap<String, (String, i32)>,
    log: Option<PathBuf>,
    failing_log_attempts: u32,
    busy_polls: u32,
    remaining_busy: u32,
    last_code: i32,
    mute: bool,
    wrap_width: Option<usize>,
}

impl ScriptedAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, command: &str, output: &str, code: i32) -> Self {
        self.outputs
            .insert(command.to_string(), (output.to_string(), code));
        self
    }

    pub fn failing_log_attempts(mut self, attempts: u32) -> Self {
        self.failing_log_attempts = attempts;
        self
    }

    pub fn busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Wraps echoes longer than `width` over `> ` continuation lines.
    pub fn wrap_at(mut self, width: usize) -> Self {
        self.wrap_width = Some(width);
        self
    }

    /// Stops writing to the log, as if the application hung.
    pub fn muted(mut self) -> Self {
        self.mute = true;
        self
    }

    fn execute(&mut self, command: &str) -> i32 {
        let (output, code) = self
            .outputs
            .get(command)
            .cloned()
            .unwrap_or_default();
        if let (Some(log), false) = (&self.log, self.mute) {
            let mut file = OpenOptions::new()
                .append(true)
                .open(log)
                .expect("session log should be open");
            let echo = format!(". {command}");
            let mut text = match self.wrap_width {
                Some(width) => wrap_echo(&echo, width),
                None => echo,
            };
            text.push('\n');
            if !output.is_empty() {
                text.push_str(&output);
                text.push('\n');
            }
            file.write_all(text.as_bytes()).expect("log write should succeed");
        }
        self.last_code = code;
        code
    }
}

fn wrap_echo(echo: &str, width: usize) -> String {
    let chars: Vec<char> = echo.chars().collect();
    if chars.len() <= width {
        return echo.to_string();
    }
    let mut wrapped: String = chars[..width].iter().collect();
    for piece in chars[width..].chunks(width - 2) {
        wrapped.push_str("\n> ");
        wrapped.extend(piece);
    }
    wrapped
}

impl AutomationApi for ScriptedAutomation {
    fn submit_and_wait(&mut self, command: &str) -> Result<i32, TransportError> {
        self.submitted.push(command.to_string());
        if command.starts_with("cap log close") {
            return Ok(0);
        }
        if command.starts_with("log using") {
            if self.failing_log_attempts > 0 {
                self.failing_log_attempts -= 1;
                return Ok(604);
            }
            let path = command
                .split("`\"")
                .nth(1)
                .and_then(|rest| rest.split("\"'").next())
                .expect("log command should quote its path");
            std::fs::write(path, "").expect("log file should be creatable");
            self.log = Some(PathBuf::from(path));
            return Ok(0);
        }
        Ok(self.execute(command))
    }

    fn submit_async(&mut self, command: &str) -> Result<(), TransportError> {
        self.submitted.push(command.to_string());
        self.execute(command);
        self.remaining_busy = self.busy_polls;
        Ok(())
    }

    fn poll_busy(&mut self) -> Result<bool, TransportError> {
        self.polls += 1;
        if self.remaining_busy > 0 {
            self.remaining_busy -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn last_error_code(&mut self) -> Result<i32, TransportError> {
        Ok(self.last_code)
    }

    fn generic_command(
        &mut self,
        _name: &str,
        _value: Option<&str>,
    ) -> Result<AutomationValue, TransportError> {
        Ok(AutomationValue::Text(String::new()))
    }
}

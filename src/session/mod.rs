//! Execution driver: submits chunks and reconciles their output.
//!
//! A [`Session`] owns one transport and the [`SessionContext`] that
//! survives between calls. Calls are strictly sequential.

pub mod automation;
pub mod config;
pub mod console;
pub mod decode;
pub mod error;
pub mod osascript;
pub mod process;
pub mod reconcile;
pub mod transport;

pub use automation::{AutomationApi, AutomationTransport, AutomationValue};
pub use config::{ExecutionMode, GraphFormat, SessionConfig};
pub use console::{ConsoleTransport, LineChannel};
pub use error::{ConfigError, ExecutionError, ReconcileError, SessionError, TransportError};
pub use osascript::OsaScriptApi;
pub use process::ProcessChannel;
pub use reconcile::{MatchQuality, Reconciled, reconcile};
pub use transport::{RawCapture, SessionTranscript, Transport, TransportFailure};

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::chunk::{
    AssemblerSettings, Chunk, Completeness, MagicCommand, SessionContext, SourceAnalysis,
    assemble, check_complete, oracle, parse_magic, rewrite_help,
};
use crate::chunk::assembler::GRAPH_COUNTER_GLOBAL;
use crate::lexer::DelimiterMode;

/// Return code reported when the transport itself failed.
pub const TRANSPORT_FAILURE_CODE: i32 = -1;

/// Outcome of one `execute` call.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Return code of the first failing statement, `0` on success, or
    /// [`TRANSPORT_FAILURE_CODE`].
    pub return_code: i32,
    /// Output with echoes and sentinel removed.
    pub output: String,
    /// Graph files written while running.
    pub artifacts: Vec<PathBuf>,
    /// Transport or reconciliation failure, if any.
    pub error: Option<ExecutionError>,
    /// A meta-command escape handed back unexecuted.
    pub magic: Option<MagicCommand>,
    /// Lines sent and the raw text each one produced.
    pub transcript: SessionTranscript,
}

impl ExecutionResult {
    /// Returns `true` when the code ran without any error.
    pub fn is_success(&self) -> bool {
        self.return_code == 0 && self.error.is_none()
    }
}

/// One statistics process session.
pub struct Session<T: Transport> {
    transport: T,
    settings: AssemblerSettings,
    context: SessionContext,
    linesize: u32,
}

impl<T: Transport> Session<T> {
    /// Wraps `transport` using settings from `config`.
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        Self {
            transport,
            settings: config.assembler_settings(),
            context: SessionContext::default(),
            linesize: config.linesize,
        }
    }

    /// Runs the initialization chunk.
    pub fn start(&mut self) -> Result<(), SessionError> {
        std::fs::create_dir_all(self.settings.cache.root()).map_err(|source| {
            TransportError::io(
                format!("creating cache directory {}", self.settings.cache.root().display()),
                source,
            )
        })?;

        let init = format!(
            "set more off\nset linesize {}\nglobal {GRAPH_COUNTER_GLOBAL} = 0",
            self.linesize
        );
        let result = self.execute(&init);
        if let Some(ExecutionError::Transport(error)) = result.error {
            return Err(SessionError::Transport(error));
        }
        if result.return_code != 0 {
            return Err(SessionError::Init {
                return_code: result.return_code,
                output: result.output,
            });
        }
        self.context.plot_counter = 0;
        info!(linesize = self.linesize, "session initialized");
        Ok(())
    }

    /// Decides whether `code` can be submitted now.
    pub fn is_complete(&self, code: &str) -> Completeness {
        check_complete(code, self.context.delimiter_mode)
    }

    /// Current statement delimiter mode.
    pub fn delimiter_mode(&self) -> DelimiterMode {
        self.context.delimiter_mode
    }

    /// Cross-call state.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Borrows the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Assembles `code` without running it.
    pub fn prepare(&mut self, code: &str) -> Result<Chunk, ExecutionError> {
        let analysis = SourceAnalysis::new(code, self.context.delimiter_mode);
        if let Some(reason) = oracle::incomplete_reason(&analysis) {
            return Err(ExecutionError::Incomplete(reason));
        }
        Ok(assemble(&analysis, &self.settings, &mut self.context))
    }

    /// Runs `code` and returns its cleaned output.
    ///
    /// Partial output is kept on every failure path.
    pub fn execute(&mut self, code: &str) -> ExecutionResult {
        if let Some(magic) = parse_magic(code) {
            debug!(name = %magic.name, "meta-command returned unexecuted");
            return ExecutionResult {
                magic: Some(magic),
                ..ExecutionResult::default()
            };
        }
        let code = rewrite_help(code).unwrap_or_else(|| code.to_string());

        let chunk = match self.prepare(&code) {
            Ok(chunk) => chunk,
            Err(error) => {
                return ExecutionResult {
                    error: Some(error),
                    ..ExecutionResult::default()
                };
            }
        };
        if chunk.is_empty() {
            return ExecutionResult::default();
        }
        debug!(
            lines = chunk.body.len(),
            indirect = chunk.requires_indirection,
            fingerprint = %chunk.fingerprint,
            "chunk assembled"
        );

        if chunk.requires_indirection {
            let script = self.settings.cache.include_script();
            if let Err(source) = std::fs::write(&script, chunk.script_text()) {
                return ExecutionResult {
                    return_code: TRANSPORT_FAILURE_CODE,
                    error: Some(ExecutionError::Transport(TransportError::io(
                        format!("writing {}", script.display()),
                        source,
                    ))),
                    ..ExecutionResult::default()
                };
            }
        }

        match self.transport.run(&chunk) {
            Ok(capture) => self.finish(&chunk, &capture, None),
            Err(failure) => {
                warn!(error = %failure.error, "transport failed; resetting");
                self.transport.reset();
                self.finish(&chunk, &failure.partial, Some(failure.error))
            }
        }
    }

    fn finish(
        &self,
        chunk: &Chunk,
        capture: &RawCapture,
        failure: Option<TransportError>,
    ) -> ExecutionResult {
        let reconciled = reconcile(
            &capture.text,
            &chunk.exclusion_lines,
            &chunk.sentinel(),
            capture.return_code,
            &self.settings.cache,
        );
        debug!(
            matched = reconciled.matched,
            sentinel = reconciled.sentinel_seen,
            return_code = capture.return_code,
            "output reconciled"
        );

        let (return_code, error) = match failure {
            Some(error) => (TRANSPORT_FAILURE_CODE, Some(ExecutionError::Transport(error))),
            None => (capture.return_code, reconciled.error.map(ExecutionError::Reconcile)),
        };
        ExecutionResult {
            return_code,
            output: reconciled.output,
            artifacts: reconciled.artifacts,
            error,
            magic: None,
            transcript: capture.transcript.clone(),
        }
    }

    /// Ends the process session.
    pub fn shutdown(mut self) -> Result<(), TransportError> {
        self.transport.shutdown()
    }
}

impl Session<ConsoleTransport<ProcessChannel>> {
    /// Spawns the console binary named in `config` and waits for its prompt.
    pub fn spawn_console(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let channel = ProcessChannel::spawn(&config.stata_path, &["-q"])?;
        let mut transport = ConsoleTransport::new(channel, config.timeout());
        let banner = transport.start()?;
        debug!(%banner, "console banner");
        let mut session = Self::new(transport, config);
        session.start()?;
        Ok(session)
    }
}

impl<A: AutomationApi> Session<AutomationTransport<A>> {
    /// Opens the session log through `api` and initializes the session.
    pub fn connect_automation(api: A, config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let cache = config.cache_paths();
        std::fs::create_dir_all(cache.root()).map_err(|source| {
            TransportError::io(
                format!("creating cache directory {}", cache.root().display()),
                source,
            )
        })?;
        let transport =
            AutomationTransport::open(api, &cache, config.timeout(), config.poll_interval())?;
        let mut session = Self::new(transport, config);
        session.start()?;
        Ok(session)
    }
}

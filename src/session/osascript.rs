//! macOS automation through `osascript`.

use std::path::Path;
use std::process::Command;

use tracing::trace;

use crate::session::automation::{AutomationApi, AutomationValue};
use crate::session::error::TransportError;

/// [`AutomationApi`] that sends AppleScript commands to the application.
#[derive(Debug, Clone)]
pub struct OsaScriptApi {
    application: String,
}

impl OsaScriptApi {
    /// Targets the application named by the last component of `stata_path`.
    pub fn new(stata_path: &str) -> Self {
        let application = Path::new(stata_path)
            .file_name()
            .map_or_else(|| stata_path.to_string(), |name| name.to_string_lossy().into_owned());
        Self { application }
    }

    /// Builds the AppleScript for command `name` with an optional argument.
    pub fn script(&self, name: &str, value: Option<&str>) -> String {
        let mut script = format!("tell application \"{}\" to {name}", self.application);
        if let Some(value) = value {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('\n', "\\n")
                .replace('\r', "\\r")
                .replace('"', "\\\"");
            script.push_str(&format!(" \"{escaped}\""));
        }
        script
    }

    fn expect_int(name: &str, value: AutomationValue) -> Result<i32, TransportError> {
        match value {
            AutomationValue::Int(code) => {
                i32::try_from(code).map_err(|_| TransportError::Automation {
                    command: name.to_string(),
                    message: format!("return code {code} out of range"),
                })
            }
            other => Err(TransportError::Automation {
                command: name.to_string(),
                message: format!("expected an integer, got {other:?}"),
            }),
        }
    }
}

impl AutomationApi for OsaScriptApi {
    fn submit_and_wait(&mut self, command: &str) -> Result<i32, TransportError> {
        let value = self.generic_command("DoCommand", Some(command))?;
        Self::expect_int("DoCommand", value)
    }

    fn submit_async(&mut self, command: &str) -> Result<(), TransportError> {
        self.generic_command("DoCommandAsync", Some(command)).map(|_| ())
    }

    fn poll_busy(&mut self) -> Result<bool, TransportError> {
        match self.generic_command("UtilIsStataFree", None)? {
            AutomationValue::Bool(free) => Ok(!free),
            AutomationValue::Int(free) => Ok(free == 0),
            AutomationValue::Text(text) => Err(TransportError::Automation {
                command: "UtilIsStataFree".to_string(),
                message: format!("unexpected reply `{text}`"),
            }),
        }
    }

    fn last_error_code(&mut self) -> Result<i32, TransportError> {
        let value = self.generic_command("UtilStataErrorCode", None)?;
        Self::expect_int("UtilStataErrorCode", value)
    }

    fn generic_command(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<AutomationValue, TransportError> {
        let script = self.script(name, value);
        trace!(%script, "osascript");
        let output = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .map_err(|source| TransportError::io("running osascript", source))?;
        if !output.stderr.is_empty() {
            return Err(TransportError::Automation {
                command: script,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(AutomationValue::resolve(&String::from_utf8_lossy(&output.stdout)))
    }
}

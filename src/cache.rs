//! File layout of the session cache directory.

use std::path::{Path, PathBuf};

/// Name of the indirection script inside the cache directory.
pub const INCLUDE_SCRIPT: &str = "include.do";

/// Stem shared by exported graph files.
pub const GRAPH_STEM: &str = "graph";

/// Paths of the files a session reads and writes.
///
/// Paths are rendered with forward slashes when embedded in submitted
/// text, since the statistics process accepts them on every platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    root: PathBuf,
}

impl CachePaths {
    /// Creates the layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Indirection script written before an indirect chunk runs.
    pub fn include_script(&self) -> PathBuf {
        self.root.join(INCLUDE_SCRIPT)
    }

    /// Session log candidate number `index`.
    pub fn log_file(&self, index: u32) -> PathBuf {
        self.root.join(format!("log{index}.log"))
    }

    /// Cache directory as embedded in submitted commands.
    pub fn root_for_commands(&self) -> String {
        command_path(&self.root)
    }

    /// Include script path as embedded in submitted commands.
    pub fn include_for_commands(&self) -> String {
        command_path(&self.include_script())
    }
}

fn command_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

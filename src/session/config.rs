//! Session configuration read from the `[stata_kernel]` TOML table.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::cache::CachePaths;
use crate::chunk::{AssemblerSettings, GraphExport, PlotCatalog};
use crate::session::error::ConfigError;

/// How the session reaches the statistics process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Console binary over piped standard streams.
    #[default]
    Console,
    /// Automation API with a session log file.
    Automation,
}

/// Export format of injected graph exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    /// Scalable vector graphics.
    #[default]
    Svg,
    /// Portable network graphics.
    Png,
    /// Portable document format; exported at its natural size.
    Pdf,
    /// Tagged image file format.
    Tif,
}

impl GraphFormat {
    /// File extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Pdf => "pdf",
            Self::Tif => "tif",
        }
    }

    fn takes_pixel_size(self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Settings for one session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path of the console binary or automation application.
    pub stata_path: String,
    /// Transport selection.
    pub execution_mode: ExecutionMode,
    /// Directory for the include script, logs, and graphs. `~` expands to
    /// the home directory.
    pub cache_directory: PathBuf,
    /// Export format of injected graph exports.
    pub graph_format: GraphFormat,
    /// Graph width in pixels before scaling.
    pub graph_width: u32,
    /// Graph height in pixels before scaling.
    pub graph_height: u32,
    /// Multiplier applied to width and height.
    pub graph_scale: f64,
    /// Extra commands treated as drawing a graph. Accepts a list or a
    /// comma-separated string.
    #[serde(deserialize_with = "keyword_list")]
    pub user_graph_keywords: Vec<String>,
    /// Output line width set at session start.
    pub linesize: u32,
    /// Overall deadline of one call, in milliseconds.
    pub timeout_ms: u64,
    /// Busy-poll interval of the automation transport, in milliseconds.
    pub poll_interval_ms: u64,
    /// Body line count above which chunks run through the include script.
    pub indirection_line_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stata_path: String::new(),
            execution_mode: ExecutionMode::Console,
            cache_directory: PathBuf::from("~/.stata_kernel_cache"),
            graph_format: GraphFormat::Svg,
            graph_width: 600,
            graph_height: 400,
            graph_scale: 1.0,
            user_graph_keywords: Vec::new(),
            linesize: 80,
            timeout_ms: 300_000,
            poll_interval_ms: 50,
            indirection_line_threshold: 3,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    stata_kernel: SessionConfig,
}

/// Console binaries that replace the windowed Linux variants.
const LINUX_CONSOLE_VARIANTS: &[(&str, &str)] = &[
    ("xstata-mp", "stata-mp"),
    ("xstata-se", "stata-se"),
    ("xstata", "stata"),
];

/// Supported output line widths.
const LINESIZE_RANGE: std::ops::RangeInclusive<u32> = 40..=255;

impl SessionConfig {
    /// Parses the `[stata_kernel]` table of a TOML document and validates it.
    ///
    /// A document without the table yields the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = file.stata_kernel;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Expands `~` and maps windowed Linux binaries to console ones.
    pub fn normalize(&mut self) {
        self.cache_directory = expand_home(&self.cache_directory);
        if self.execution_mode == ExecutionMode::Console {
            self.stata_path = console_variant(&self.stata_path);
        }
        self.user_graph_keywords.retain(|keyword| !keyword.is_empty());
    }

    /// Rejects values no session can use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LINESIZE_RANGE.contains(&self.linesize) {
            return Err(ConfigError::invalid(
                "linesize",
                format!(
                    "{} is outside {}..={}",
                    self.linesize,
                    LINESIZE_RANGE.start(),
                    LINESIZE_RANGE.end()
                ),
            ));
        }
        if self.graph_width == 0 || self.graph_height == 0 {
            return Err(ConfigError::invalid("graph_width", "graph dimensions must be positive"));
        }
        if !(self.graph_scale.is_finite() && self.graph_scale > 0.0) {
            return Err(ConfigError::invalid("graph_scale", "must be a positive number"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("timeout_ms", "must be positive"));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.timeout_ms {
            return Err(ConfigError::invalid(
                "poll_interval_ms",
                "must be positive and not exceed timeout_ms",
            ));
        }
        if self.indirection_line_threshold == 0 {
            return Err(ConfigError::invalid("indirection_line_threshold", "must be positive"));
        }
        if self.cache_directory.as_os_str().is_empty() {
            return Err(ConfigError::invalid("cache_directory", "must not be empty"));
        }
        Ok(())
    }

    /// Returns the overall deadline of one call.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the busy-poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Cache file layout.
    pub fn cache_paths(&self) -> CachePaths {
        CachePaths::new(&self.cache_directory)
    }

    /// Graph export settings with the scale applied.
    pub fn graph_export(&self) -> GraphExport {
        let scaled = |pixels: u32| (f64::from(pixels) * self.graph_scale).round() as u32;
        let sized = self.graph_format.takes_pixel_size();
        GraphExport {
            extension: self.graph_format.extension().to_string(),
            width: sized.then(|| scaled(self.graph_width)),
            height: sized.then(|| scaled(self.graph_height)),
        }
    }

    /// Assembler inputs derived from this configuration.
    pub fn assembler_settings(&self) -> AssemblerSettings {
        AssemblerSettings {
            cache: self.cache_paths(),
            graph: self.graph_export(),
            plots: PlotCatalog::new(self.user_graph_keywords.iter().cloned()),
            indirection_line_threshold: self.indirection_line_threshold,
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

fn console_variant(stata_path: &str) -> String {
    for (windowed, console) in LINUX_CONSOLE_VARIANTS {
        if let Some(prefix) = stata_path.strip_suffix(windowed) {
            return format!("{prefix}{console}");
        }
    }
    stata_path.to_string()
}

fn keyword_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keywords {
        List(Vec<String>),
        Joined(String),
    }

    let keywords = match Keywords::deserialize(deserializer)? {
        Keywords::List(list) => list,
        Keywords::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(keywords
        .into_iter()
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect())
}

//! Configuration System for uel
//!
//! Provides a configuration system supporting:
//! - TOML configuration files
//! - Environment variable overrides
//! - Multiple config file locations
//!
//! # Configuration File Locations
//!
//! Configuration files are searched in order (first found wins):
//! 1. `./uel.toml` - Project-local configuration
//! 2. `~/.config/uel/config.toml` - User configuration (XDG)
//! 3. `~/.uel/config.toml` - User configuration (legacy)
//! 4. `/etc/uel/config.toml` - System-wide configuration
//!
//! # Environment Variables
//!
//! - `UEL_PROCESSOR` - Unification processor (sat, rule, asp)
//! - `UEL_MINIMIZE` - Only report minimal unifiers (true/false)
//! - `UEL_LOG_LEVEL` - Logging verbosity (quiet, normal, verbose, debug)
//! - `UEL_SAT_BACKEND` - SAT backend (internal, external)
//! - `UEL_SAT_COMMAND` - External SAT solver command
//! - `UEL_ASP_COMMAND` - clingo command
//!
//! # Example Configuration
//!
//! ```toml
//! # uel.toml
//!
//! [general]
//! log_level = "normal"
//!
//! [solver]
//! processor = "sat"
//! minimize = false
//!
//! [sat]
//! backend = "external"
//! command = "kissat"
//! args = ["-q"]
//!
//! [asp]
//! command = "clingo"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorCode, UelError};

// ============================================================================
// Configuration Schema
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UelConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Processor selection
    pub solver: SolverConfig,
    /// SAT backend settings
    pub sat: SatConfig,
    /// ASP backend settings
    pub asp: AspConfig,
    /// Limits for external processes
    pub limits: LimitsConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Logging level
    pub log_level: LogLevel,
}

/// Which unification algorithm to run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SolverConfig {
    /// Processor kind
    pub processor: ProcessorKind,
    /// Only compute minimal unifiers
    pub minimize: bool,
}

/// SAT backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SatConfig {
    /// Where formulas are solved
    pub backend: SatBackendKind,
    /// External SAT solver reading DIMACS CNF on stdin
    pub command: String,
    /// Extra arguments for the SAT solver
    pub args: Vec<String>,
    /// External MaxSAT solver reading WCNF on stdin (minimal mode)
    pub maxsat_command: String,
    /// Extra arguments for the MaxSAT solver
    pub maxsat_args: Vec<String>,
    /// Decision limit for the internal solver (0 = unlimited)
    pub max_decisions: usize,
}

impl Default for SatConfig {
    fn default() -> Self {
        Self {
            backend: SatBackendKind::Internal,
            command: "kissat".to_string(),
            args: vec!["-q".to_string()],
            maxsat_command: "open-wbo".to_string(),
            maxsat_args: Vec::new(),
            max_decisions: 0,
        }
    }
}

/// ASP backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AspConfig {
    /// clingo binary
    pub command: String,
    /// Extra arguments appended after the fixed ones
    pub args: Vec<String>,
}

impl Default for AspConfig {
    fn default() -> Self {
        Self {
            command: "clingo".to_string(),
            args: Vec::new(),
        }
    }
}

/// Limits for process-backed solvers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// How often a waiting enumerator checks for cancellation (milliseconds)
    pub poll_interval_ms: u64,
    /// Wall-clock limit for one external solver call (seconds, 0 = none)
    pub timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            timeout_secs: 0,
        }
    }
}

impl LimitsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Log level options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" | "q" | "0" => Some(LogLevel::Quiet),
            "normal" | "n" | "1" => Some(LogLevel::Normal),
            "verbose" | "v" | "2" => Some(LogLevel::Verbose),
            "debug" | "d" | "3" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    /// Maximum `tracing` level for this setting
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Quiet => tracing::Level::ERROR,
            LogLevel::Normal => tracing::Level::WARN,
            LogLevel::Verbose => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// Unification processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// SAT encoding
    #[default]
    Sat,
    /// Goal-oriented rule calculus
    Rule,
    /// Answer set programming via clingo
    Asp,
}

impl ProcessorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorKind::Sat => "sat",
            ProcessorKind::Rule => "rule",
            ProcessorKind::Asp => "asp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sat" | "sat-based" => Some(ProcessorKind::Sat),
            "rule" | "rules" | "rule-based" => Some(ProcessorKind::Rule),
            "asp" | "clingo" => Some(ProcessorKind::Asp),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProcessorKind::Sat => "SAT encoding with blocking-clause enumeration",
            ProcessorKind::Rule => "Goal-oriented rules with backtracking search",
            ProcessorKind::Asp => "Answer set programming (external clingo)",
        }
    }
}

/// Where SAT formulas are solved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SatBackendKind {
    /// Built-in DPLL / branch-and-bound MaxSAT
    #[default]
    Internal,
    /// External DIMACS solver process
    External,
}

impl SatBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SatBackendKind::Internal => "internal",
            SatBackendKind::External => "external",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "internal" | "builtin" | "dpll" => Some(SatBackendKind::Internal),
            "external" | "process" => Some(SatBackendKind::External),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

impl UelConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from default locations
    ///
    /// Searches for config files in order:
    /// 1. ./uel.toml
    /// 2. ~/.config/uel/config.toml
    /// 3. ~/.uel/config.toml
    /// 4. /etc/uel/config.toml
    ///
    /// Then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for path in Self::config_paths() {
            if path.exists() {
                config = Self::load_from_file(&path)?;
                tracing::debug!(path = %path.display(), "loaded configuration");
                break;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<string>"), e.to_string()))
    }

    /// Get the list of config file search paths
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./uel.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("uel").join("config.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".uel").join("config.toml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/uel/config.toml"));

        paths
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("UEL_PROCESSOR") {
            if let Some(kind) = ProcessorKind::from_str(&val) {
                self.solver.processor = kind;
            }
        }

        if let Some(val) = lookup("UEL_MINIMIZE") {
            self.solver.minimize = val == "true" || val == "1" || val == "yes";
        }

        if let Some(val) = lookup("UEL_LOG_LEVEL") {
            if let Some(level) = LogLevel::from_str(&val) {
                self.general.log_level = level;
            }
        }

        if let Some(val) = lookup("UEL_SAT_BACKEND") {
            if let Some(backend) = SatBackendKind::from_str(&val) {
                self.sat.backend = backend;
            }
        }

        if let Some(val) = lookup("UEL_SAT_COMMAND") {
            self.sat.command = val;
        }

        if let Some(val) = lookup("UEL_ASP_COMMAND") {
            self.asp.command = val;
        }
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Write configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))
    }

    /// Generate a default configuration file content
    pub fn default_config_content() -> &'static str {
        r#"# uel configuration file

[general]
# Logging level: quiet, normal, verbose, debug
log_level = "normal"

[solver]
# Processor: sat, rule, asp
processor = "sat"
# Only compute minimal unifiers
minimize = false

[sat]
# Backend: internal, external
backend = "internal"
# External solver reading DIMACS CNF on stdin
command = "kissat"
args = ["-q"]
# External MaxSAT solver reading WCNF on stdin
maxsat_command = "open-wbo"
maxsat_args = []
# Decision limit for the internal solver (0 = unlimited)
max_decisions = 0

[asp]
command = "clingo"
args = []

[limits]
# Cancellation polling interval (milliseconds)
poll_interval_ms = 50
# Wall-clock limit per external solver call (seconds, 0 = none)
timeout_secs = 0
"#
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// IO error reading/writing config file
    #[error("IO error reading {}: {1}", .0.display())]
    Io(PathBuf, String),
    /// Parse error in config file
    #[error("Parse error in {}: {1}", .0.display())]
    Parse(PathBuf, String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl From<ConfigError> for UelError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Io(..) => ErrorCode::ConfigNotFound,
            ConfigError::Parse(..) => ErrorCode::InvalidConfigSyntax,
            ConfigError::Serialize(..) => ErrorCode::ConfigError,
        };
        UelError::new(code, err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = UelConfig::default();
        assert_eq!(config.solver.processor, ProcessorKind::Sat);
        assert!(!config.solver.minimize);
        assert_eq!(config.sat.backend, SatBackendKind::Internal);
        assert_eq!(config.asp.command, "clingo");
        assert_eq!(config.general.log_level, LogLevel::Normal);
    }

    #[test]
    fn test_load_from_str() {
        let toml = r#"
[solver]
processor = "rule"
minimize = true

[sat]
backend = "external"
command = "cadical"
"#;
        let config = UelConfig::load_from_str(toml).unwrap();
        assert_eq!(config.solver.processor, ProcessorKind::Rule);
        assert!(config.solver.minimize);
        assert_eq!(config.sat.backend, SatBackendKind::External);
        assert_eq!(config.sat.command, "cadical");
        // Unspecified sections keep their defaults
        assert_eq!(config.limits.poll_interval_ms, 50);
    }

    #[test]
    fn test_invalid_toml() {
        let err = UelConfig::load_from_str("[solver\nprocessor = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(..)));
        let uel: UelError = err.into();
        assert_eq!(uel.code, ErrorCode::InvalidConfigSyntax);
    }

    #[test]
    fn test_default_content_parses() {
        let config = UelConfig::load_from_str(UelConfig::default_config_content()).unwrap();
        assert_eq!(config.sat.maxsat_command, "open-wbo");
        assert_eq!(config.limits.timeout(), None);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("UEL_PROCESSOR", "asp"),
            ("UEL_MINIMIZE", "yes"),
            ("UEL_LOG_LEVEL", "debug"),
            ("UEL_SAT_BACKEND", "external"),
            ("UEL_SAT_COMMAND", "minisat-stdin"),
        ]
        .into_iter()
        .collect();

        let mut config = UelConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.solver.processor, ProcessorKind::Asp);
        assert!(config.solver.minimize);
        assert_eq!(config.general.log_level, LogLevel::Debug);
        assert_eq!(config.sat.backend, SatBackendKind::External);
        assert_eq!(config.sat.command, "minisat-stdin");
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(ProcessorKind::from_str("Rules"), Some(ProcessorKind::Rule));
        assert_eq!(ProcessorKind::from_str("nope"), None);
        assert_eq!(LogLevel::from_str("v"), Some(LogLevel::Verbose));
        assert_eq!(LogLevel::Debug.tracing_level(), tracing::Level::DEBUG);
        assert_eq!(SatBackendKind::from_str("dpll"), Some(SatBackendKind::Internal));
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = UelConfig::default();
        config.solver.processor = ProcessorKind::Rule;
        let text = config.to_toml().unwrap();
        let back = UelConfig::load_from_str(&text).unwrap();
        assert_eq!(back.solver.processor, ProcessorKind::Rule);
    }

    #[test]
    fn test_config_paths() {
        let paths = UelConfig::config_paths();
        assert_eq!(paths[0], PathBuf::from("./uel.toml"));
    }
}

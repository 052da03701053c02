//! Structured Error Handling for uel
//!
//! Provides a unified error type with:
//! - Error codes for programmatic handling
//! - Structured, JSON-friendly error values
//! - Context preservation (goal id, axiom index, solver) through error chains
//!
//! # Error Categories
//!
//! - Goal errors - atoms and axioms that violate the goal invariants
//! - Encoding errors - models that do not fit the SAT encoding
//! - Solver errors - enumeration protocol misuse and cancellation
//! - External errors - SAT/ASP processes that fail or misbehave
//! - Config errors - configuration file problems
//!
//! An unsatisfiable goal is not an error: it yields zero unifiers.
//!
//! # Example
//!
//! ```rust,ignore
//! use uel::error::{UelError, ErrorCode};
//!
//! fn check_model(var: u32, num_vars: u32) -> Result<(), UelError> {
//!     if var > num_vars {
//!         return Err(UelError::malformed_encoding(format!("unknown literal {}", var))
//!             .with_context("num_vars", num_vars.to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};

// ============================================================================
// Error Codes
// ============================================================================

/// Unique error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Goal errors (1xxx)
    /// Axiom references an atom that is not in the store
    UnknownAtom = 1001,
    /// An id is already bound to a different atom
    AtomConflict = 1002,
    /// Operation applied to the wrong kind of atom
    TypeMismatch = 1003,

    // Encoding errors (2xxx)
    /// Model refers to a literal the encoder never allocated
    MalformedEncoding = 2001,
    /// Candidate substitution would be cyclic
    CyclicAssignment = 2002,

    // Solver errors (3xxx)
    /// Enumeration protocol used out of order
    IllegalState = 3001,
    /// Cooperative cancellation was observed
    Cancelled = 3002,
    /// Decision or time limit reached
    ResourceLimit = 3003,

    // External solver errors (4xxx)
    /// External process exited with an unexpected code
    ExternalSolverFailure = 4000,
    /// External solver binary could not be started
    ExternalSolverNotFound = 4001,
    /// External solver produced output that could not be parsed
    MalformedSolverOutput = 4002,
    /// Pipe or process I/O failed
    ProcessIo = 4003,

    // Validation errors (5xxx)
    /// Invalid input format
    InvalidFormat = 5001,
    /// Invalid value
    InvalidValue = 5002,

    // Config errors (7xxx)
    /// Generic config error
    ConfigError = 7000,
    /// Config file not found
    ConfigNotFound = 7001,
    /// Invalid config syntax
    InvalidConfigSyntax = 7002,

    // Internal errors (9xxx)
    /// Internal error
    InternalError = 9000,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a short description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UnknownAtom => "Unknown atom",
            ErrorCode::AtomConflict => "Atom id conflict",
            ErrorCode::TypeMismatch => "Atom type mismatch",

            ErrorCode::MalformedEncoding => "Malformed encoding",
            ErrorCode::CyclicAssignment => "Cyclic assignment",

            ErrorCode::IllegalState => "Illegal state",
            ErrorCode::Cancelled => "Cancelled",
            ErrorCode::ResourceLimit => "Resource limit reached",

            ErrorCode::ExternalSolverFailure => "External solver failure",
            ErrorCode::ExternalSolverNotFound => "External solver not found",
            ErrorCode::MalformedSolverOutput => "Malformed solver output",
            ErrorCode::ProcessIo => "Process I/O error",

            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::InvalidValue => "Invalid value",

            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ConfigNotFound => "Configuration file not found",
            ErrorCode::InvalidConfigSyntax => "Invalid configuration syntax",

            ErrorCode::InternalError => "Internal error",
        }
    }

    /// Process exit status used by the CLI for this error
    pub fn exit_status(&self) -> i32 {
        match self.code() / 1000 {
            1 | 5 => 2,
            3 if *self == ErrorCode::Cancelled => 130,
            4 => 3,
            7 => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Error Context
// ============================================================================

/// Additional context information for an error
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Key-value pairs of context information
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// Source location (file:line)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Stack of error causes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the context
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add source location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Add a cause to the error chain
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// The main error type for uel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UelError {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    /// Hint for resolving the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl UelError {
    /// Create a new error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
        }
    }

    // ========================================================================
    // Factory methods for common error types
    // ========================================================================

    /// Create an unknown atom error
    pub fn unknown_atom(id: usize) -> Self {
        Self::new(ErrorCode::UnknownAtom, format!("atom {} is not registered in the store", id))
    }

    /// Create an atom conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AtomConflict, message)
    }

    /// Create a type mismatch error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeMismatch, message)
    }

    /// Create a malformed encoding error
    pub fn malformed_encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedEncoding, message)
    }

    /// Create an illegal state error
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IllegalState, message)
    }

    /// Create a cancellation signal
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "unification was cancelled")
    }

    /// Create an external solver failure
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalSolverFailure, message)
    }

    /// Create a malformed solver output error
    pub fn solver_output(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedSolverOutput, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Add context to the error
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.fields.insert(key.into(), value.into());
        self
    }

    /// Record the goal this error refers to
    pub fn in_goal(self, goal_id: &str) -> Self {
        self.with_context("goal", goal_id)
    }

    /// Record the index of the failing axiom
    pub fn at_axiom(self, index: usize) -> Self {
        self.with_context("axiom", index.to_string())
    }

    /// Add a cause to the error chain
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.causes.push(cause.into());
        self
    }

    /// Add source location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::new);
        ctx.location = Some(location.into());
        self
    }

    /// Add a hint for resolving the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Whether this error is the cancellation signal rather than a failure
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Look up a context field
    pub fn context_field(&self, key: &str) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.fields.get(key))
            .map(String::as_str)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"INTERNAL_ERROR","message":"{}"}}"#, self.message)
        })
    }
}

impl fmt::Display for UelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;

        if let Some(ref ctx) = self.context {
            if let Some(ref loc) = ctx.location {
                write!(f, " at {}", loc)?;
            }
            if !ctx.fields.is_empty() {
                let fields: Vec<String> = ctx
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                write!(f, " ({})", fields.join(", "))?;
            }
            if !ctx.causes.is_empty() {
                write!(f, "\nCaused by:")?;
                for cause in &ctx.causes {
                    write!(f, "\n  - {}", cause)?;
                }
            }
        }

        if let Some(ref hint) = self.hint {
            write!(f, "\nHint: {}", hint)?;
        }

        Ok(())
    }
}

impl std::error::Error for UelError {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<std::io::Error> for UelError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let code = match err.kind() {
            ErrorKind::NotFound => ErrorCode::ExternalSolverNotFound,
            ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => ErrorCode::ProcessIo,
            _ => ErrorCode::InternalError,
        };
        UelError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for UelError {
    fn from(err: serde_json::Error) -> Self {
        UelError::new(ErrorCode::InvalidFormat, err.to_string()).with_context("format", "JSON")
    }
}

impl From<toml::de::Error> for UelError {
    fn from(err: toml::de::Error) -> Self {
        UelError::new(ErrorCode::InvalidConfigSyntax, err.to_string())
    }
}

// ============================================================================
// Result type alias
// ============================================================================

/// A Result type using UelError
pub type UelResult<T> = Result<T, UelError>;

// ============================================================================
// Macros for convenient error creation
// ============================================================================

/// Create a UelError with context from the current location
#[macro_export]
macro_rules! uel_error {
    ($code:expr, $msg:expr) => {
        $crate::error::UelError::new($code, $msg)
            .at(format!("{}:{}", file!(), line!()))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::UelError::new($code, format!($fmt, $($arg)*))
            .at(format!("{}:{}", file!(), line!()))
    };
}

/// Bail out early with an error
#[macro_export]
macro_rules! uel_bail {
    ($code:expr, $msg:expr) => {
        return Err($crate::uel_error!($code, $msg))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::uel_error!($code, $fmt, $($arg)*))
    };
}

/// Ensure a condition holds, or return an error
#[macro_export]
macro_rules! uel_ensure {
    ($cond:expr, $code:expr, $msg:expr) => {
        if !$cond {
            $crate::uel_bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::uel_bail!($code, $fmt, $($arg)*);
        }
    };
}

// ============================================================================
// Tests
// ============================================================================

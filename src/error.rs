use std::path::PathBuf;
use thiserror::Error;

/// Result type for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which scope a path-validation failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Read,
    Write,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScopeKind::Read => "read",
            ScopeKind::Write => "write",
        })
    }
}

/// Errors produced by the sandbox core.
///
/// Variants mirror the enumerated kinds of the original taxonomy
/// (`OK` has no variant here — success is `Result::Ok(())`).
#[derive(Error, Debug)]
pub enum Error {
    /// Generic failure with no more specific kind.
    #[error("{0}")]
    Generic(String),

    /// The running kernel does not support the required sandboxing
    /// primitive (Landlock unavailable, or Seatbelt dylib missing).
    #[error("unsupported kernel: {0}")]
    UnsupportedKernel(String),

    /// Landlock ruleset creation failed.
    #[error("ruleset create: {0}")]
    RulesetCreate(String),

    /// Adding a rule to the ruleset failed.
    #[error("ruleset add: {0}")]
    RulesetAdd(String),

    /// Allocating the stdio pipes failed.
    #[error("pipe: {0}")]
    Pipe(String),

    /// `fork` itself failed.
    #[error("fork: {0}")]
    Fork(String),

    /// The sandbox context was null, already spawned, or already destroyed.
    #[error("invalid context: {0}")]
    InvalidContext(String),

    /// The command or argument vector was malformed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A declared path did not exist, was not a directory, or `stat` failed.
    #[error("invalid scope: {kind} path #{index} ({path}): {detail}")]
    InvalidScope {
        kind: ScopeKind,
        index: usize,
        path: PathBuf,
        detail: String,
    },
}

impl Error {
    /// Stable name for the error kind, independent of the formatted detail.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Error::Generic(_) => "ERROR",
            Error::UnsupportedKernel(_) => "UNSUPPORTED_KERNEL",
            Error::RulesetCreate(_) => "RULESET_CREATE",
            Error::RulesetAdd(_) => "RULESET_ADD",
            Error::Pipe(_) => "PIPE",
            Error::Fork(_) => "FORK",
            Error::InvalidContext(_) => "INVALID_CONTEXT",
            Error::InvalidCommand(_) => "INVALID_COMMAND",
            Error::InvalidScope { .. } => "INVALID_SCOPE",
        }
    }
}

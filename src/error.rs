//! Error types surfaced to the interactive user.
//!
//! Every error here is reported on stderr and abandons at most the current
//! line (parse errors) or the current stage (builtin and spawn errors). None
//! of them terminates the shell.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while turning a command line into a [`Pipeline`](crate::parser::Pipeline).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A single or double quote was opened but never closed.
    #[error("unterminated {0} quote")]
    UnterminatedQuote(QuoteKind),
    /// The line ends with a backslash that escapes nothing.
    #[error("trailing backslash")]
    TrailingEscape,
    /// A `|`-delimited segment contains no words, e.g. `a || b` or `| a`.
    #[error("empty command in pipeline stage {index}")]
    EmptyStage { index: usize },
    /// The first word of a stage is the empty string, e.g. `'' foo`.
    #[error("empty program name in pipeline stage {index}")]
    EmptyProgram { index: usize },
    /// An argument cannot be quoted back into shell syntax.
    #[error("argument cannot be quoted: {0:?}")]
    Unquotable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Single,
    Double,
}

impl std::fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteKind::Single => f.write_str("single"),
            QuoteKind::Double => f.write_str("double"),
        }
    }
}

/// A builtin rejected its arguments or could not perform its effect.
#[derive(Debug, Error)]
pub enum BuiltinError {
    /// Argument parsing failed; contains the usage message.
    #[error("{name}: {message}")]
    Usage { name: &'static str, message: String },
    #[error("cd: {}: no such file or directory", .0.display())]
    NoSuchDirectory(PathBuf),
    #[error("cd: {}: not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("cd: {}: {source}", .path.display())]
    ChangeDirectory { path: PathBuf, source: io::Error },
    #[error("exit: {0}: numeric argument required")]
    InvalidExitCode(String),
    #[error("export: `{0}': not a valid identifier")]
    InvalidName(String),
}

/// An external stage could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("{0}: command not found")]
    NotFound(String),
    #[error("{program}: {source}")]
    Exec { program: String, source: io::Error },
    /// The stream coordinator failed to allocate the endpoints for the stage.
    #[error("{program}: cannot set up pipe: {source}")]
    Streams { program: String, source: io::Error },
}

//! Error kinds reported by the library.
//!
//! Unsatisfiability is never an error: every analysis reports it as an
//! ordinary result (`false`, zero, an empty set).

use std::fmt;
use std::time::Duration;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Malformed model text.
    Parse { line: usize, message: String },

    /// Inconsistent tree, relation or constraint detected while building a model.
    Structural(String),

    /// A feature name that does not exist in the model.
    NotFound(String),

    /// The SAT solver gave up before reaching an answer.
    Solver(SolverError),

    /// The model file could not be read.
    Io(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SolverError {
    /// The per-call conflict budget was exhausted.
    ConflictLimit(u64),

    /// The per-call wall-clock budget was exhausted.
    TimeLimit(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse { line, message } => write!(f, "parse error at line {}: {}", line, message),
            Error::Structural(message) => write!(f, "invalid feature model: {}", message),
            Error::NotFound(name) => write!(f, "feature '{}' is not present in the model", name),
            Error::Solver(e) => write!(f, "solver error: {}", e),
            Error::Io(message) => write!(f, "io error: {}", message),
        }
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::ConflictLimit(limit) => write!(f, "conflict limit of {} reached", limit),
            SolverError::TimeLimit(limit) => write!(f, "time limit of {:?} reached", limit),
        }
    }
}

impl std::error::Error for Error {}

impl std::error::Error for SolverError {}

impl From<SolverError> for Error {
    fn from(e: SolverError) -> Self {
        Error::Solver(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

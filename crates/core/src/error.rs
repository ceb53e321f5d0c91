//! Error taxonomy for the landscape simulator.
//!
//! Four kinds, matching the failure semantics the model draws its error handling
//! from: configuration problems and I/O problems are fatal and name the offending
//! key or path; invariant violations indicate a programming bug and are never
//! recovered; runtime errors cover resource exhaustion.

use std::fmt;

/// The single error type returned by every fallible operation in this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Missing, malformed, or wrong-arity configuration key.
    Config(String),
    /// Raster or stat file read/write failure.
    Io(String),
    /// A programmer error: invalid map-type request, broken grid invariant, etc.
    Invariant(String),
    /// Out-of-memory or other resource exhaustion.
    Runtime(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(msg) => write!(f, "config error: {msg}"),
            SimError::Io(msg) => write!(f, "I/O error: {msg}"),
            SimError::Invariant(msg) => write!(f, "invariant violation: {msg}"),
            SimError::Runtime(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}

impl std::error::Error for SimError {}

/// Convenience alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

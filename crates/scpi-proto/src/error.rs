//! The SCPI error taxonomy.
//!
//! A closed set of instrument errors, each carrying the fixed numeric code
//! and message the instrument reports through `SYSTem:ERRor?`. Errors are
//! queued, never echoed: a failing command stays silent on the wire until
//! the error queue is queried.

use thiserror::Error;

/// Convenience alias for Results using [`ScpiError`].
pub type Result<T, E = ScpiError> = std::result::Result<T, E>;

/// Code and message of the empty-queue sentinel reported by `SYSTem:ERRor?`.
pub const NO_ERROR: (i16, &str) = (0, "No Error");

/// An instrument error as defined by SCPI-99 / IEEE-488.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ScpiError {
    /// The command path could not be resolved against the command tree.
    #[error("Command Error")]
    Command,

    /// The command line itself is malformed (e.g. an unterminated string).
    #[error("Syntax Error")]
    Syntax,

    /// A parameter could not be converted to its declared type.
    #[error("Data Type Error")]
    DataType,

    /// More parameters were supplied than the command declares.
    #[error("Parameter not allowed")]
    TooManyParameters,

    /// Fewer parameters were supplied than the command declares.
    #[error("Missing parameter")]
    TooFewParameters,

    /// The instrument cannot accept the command in its current state.
    #[error("Instrument busy")]
    Busy,

    /// The parameter parsed but violates its declared bounds.
    #[error("Parameter Out of Range")]
    OutOfRange,
}

impl ScpiError {
    /// The numeric SCPI error code reported alongside the message.
    pub fn code(&self) -> i16 {
        match self {
            Self::Command => -100,
            Self::Syntax => -102,
            Self::DataType => -104,
            Self::TooManyParameters => -108,
            Self::TooFewParameters => -109,
            Self::Busy => -200,
            Self::OutOfRange => -222,
        }
    }
}

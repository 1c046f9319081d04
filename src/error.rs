use thiserror::Error;

/// Unified error surface for both the transmit and receive sides of the library.
///
/// Every fallible operation in this crate returns one of these variants; none of
/// them leave a `Generator` or `Receiver` in a half-mutated state (see the
/// per-operation docs for exactly what is and isn't touched on failure).
#[derive(Error, Debug)]
pub enum CwError {
    #[error("value {value} out of range: expected {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("operation not legal in current state: {0}")]
    StateError(String),

    #[error("representation buffer exhausted")]
    NoMemory,

    #[error("try again: {0}")]
    TryAgain(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("tone queue full")]
    QueueFull,

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("audio sink error: {0}")]
    SinkError(String),
}

pub type CwResult<T> = Result<T, CwError>;

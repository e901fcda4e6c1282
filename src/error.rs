use std::fmt::{Display, Formatter};
use std::sync::PoisonError;

use config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

// All except Internal are considered user-facing.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Internal(String),
    Value(String),
    /// All frames are pinned and none can be evicted. Recoverable:
    /// the caller decides whether to retry, back off or fail.
    NoAvailableFrame,
}

impl Error {
    pub fn internal<E: ToString>(msg: E) -> Error {
        Error::Internal(msg.to_string())
    }

    pub fn value<E: ToString>(msg: E) -> Error {
        Error::Value(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoAvailableFrame => write!(f, "No available frame in buffer pool"),
            Error::Internal(s) | Error::Value(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::internal(err)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::internal(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::internal(err)
    }
}

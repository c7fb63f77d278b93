use std::error::Error;
use std::fmt;

/// Errors raised while setting up the simulated module.
///
/// The real-time core never fails; these only come from configuration, logging and the
/// hosted runtime around it.
#[derive(Debug)]
pub enum ChronosError {
    /// Settings could not be loaded or were out of range
    Config(String),
    /// Clock resolution is not one of the supported PPQN values
    InvalidPpqn(u16),
    /// Logger could not be installed
    Logger(String),
    /// Filesystem or terminal error
    Io(std::io::Error),
}

impl fmt::Display for ChronosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChronosError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChronosError::InvalidPpqn(value) => write!(
                f,
                "Unsupported PPQN {} (expected one of 1, 4, 8, 16, 24, 32, 48)",
                value
            ),
            ChronosError::Logger(msg) => write!(f, "Logger error: {}", msg),
            ChronosError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for ChronosError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChronosError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChronosError {
    fn from(e: std::io::Error) -> Self {
        ChronosError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, ChronosError>;

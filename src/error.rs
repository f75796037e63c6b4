//! Error types for the midi2score library

use std::io;

use crate::time::rational::RationalError;

/// Library error type for midi2score operations
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// The MIDI file could not be opened or read
    #[error("cannot open file: {0}")]
    CannotOpenFile(String),

    /// Empty or otherwise unusable argument
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Malformed SMF data (wrong chunk tag, truncated stream, missing end of track...)
    #[error("invalid MIDI file: {0}")]
    InvalidFile(String),

    /// SMF format 2 or SMPTE time division
    #[error("unsupported MIDI format: {0}")]
    UnsupportedFormat(String),

    /// Zero denominator in a musical time computation
    #[error("division by zero in musical time")]
    DivisionByZero,

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for ScoreError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}

impl From<RationalError> for ScoreError {
    fn from(error: RationalError) -> Self {
        match error {
            RationalError::DivisionByZero => Self::DivisionByZero,
        }
    }
}

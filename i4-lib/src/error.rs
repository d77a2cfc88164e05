use std::io;
use thiserror::Error;

use crate::payload::RecordKind;

/// The primary error type for the `i4-lib` library.
#[derive(Error, Debug)]
pub enum I4Error {
    #[error("Transport closed by the interrogator")]
    TransportClosed,

    #[error("Transport error: {0}")]
    Transport(io::Error),

    #[error("Malformed header: expected {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },

    #[error("Malformed {kind} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        kind: RecordKind,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed force frame: expected {expected} bytes, got {actual}")]
    MalformedForceFrame { expected: usize, actual: usize },

    #[error("Unknown sweep type {0}")]
    UnknownSweepType(u8),

    #[error("Data length {data_length} is not a multiple of record size {record_size}")]
    DataLengthMismatch { data_length: u32, record_size: usize },

    #[error("Stream framing lost after an earlier error")]
    Desynchronized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<io::Error> for I4Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => I4Error::TransportClosed,
            _ => I4Error::Transport(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(I4Error::from(eof), I4Error::TransportClosed));

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(I4Error::from(reset), I4Error::Transport(_)));
    }
}

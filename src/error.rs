//! Error taxonomy for the rig.
//!
//! Three layers, from the wire up:
//!
//! - [`TransportError`] comes out of the serial link and is classified into
//!   connection loss, cancellation, or a fault confined to one exchange.
//! - [`ReadError`] is attached to a [`crate::Reading`] and covers everything
//!   that can go wrong while reading a single place.
//! - [`SessionError`] is what ends a polling session with an operator-visible
//!   connection error.
use derive_more::{Display, Error};
use std::io;

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum TransportError {
    /// The link itself is gone: open failed, the adapter was unplugged, or a
    /// write could not be delivered.
    #[display("{port}: connection failed: {reason}")]
    ConnectionFailed { port: String, reason: String },

    /// An interrupt was delivered while the exchange was waiting.
    #[display("exchange canceled")]
    Canceled,

    #[display("no response within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    /// The response failed the frame check (CRC, unit, function or a Modbus
    /// exception reply).
    #[display("response rejected: {reason}")]
    Rejected { reason: String },

    #[display("I/O error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },
}

impl TransportError {
    pub fn is_connection_failed(&self) -> bool {
        matches!(self, TransportError::ConnectionFailed { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, TransportError::Canceled)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Why a single place could not be read. None of these stop the rotation
/// except a transport connection failure or a cancellation.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ReadError {
    #[display("{source}")]
    Transport { source: TransportError },

    #[display("malformed response: expected {expected} bytes, got {actual}: {frame:02X?}")]
    MalformedResponse {
        expected: usize,
        actual: usize,
        frame: Vec<u8>,
    },

    #[display("device status is not zero: {status:#06X}")]
    DeviceStatus { status: u16 },

    #[display("value {value} exceeds 1000")]
    ValueOutOfRange { value: f32 },

    /// The session was stopped between the status and the value exchange.
    #[display("interrupted")]
    Interrupted,
}

impl ReadError {
    pub fn is_connection_failed(&self) -> bool {
        matches!(self, ReadError::Transport { source } if source.is_connection_failed())
    }

    pub fn is_canceled(&self) -> bool {
        match self {
            ReadError::Transport { source } => source.is_canceled(),
            ReadError::Interrupted => true,
            _ => false,
        }
    }
}

impl From<TransportError> for ReadError {
    fn from(source: TransportError) -> Self {
        ReadError::Transport { source }
    }
}

/// Reasons a polling session ends with an operator-visible error.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum SessionError {
    #[display("no places selected")]
    NoPlacesSelected,

    #[display("{source}")]
    Open { source: TransportError },

    #[display("{source}")]
    ConnectionLost { source: TransportError },
}

//! Register-level protocol spoken by the rig boards.
//!
//! Every place is read with two holding-register requests: a one-register
//! status word, then a two-register big-endian `f32` measurement. Frame
//! integrity (CRC, unit, function code, exception replies) is checked by
//! [`PlaceRequest::check_response`] before the decoders look at the payload.
mod place;
mod pull_get_status;
mod pull_get_value;

use rmodbus::{client::ModbusRequest, ModbusProto};

use crate::error::TransportError;

pub use place::{Place, PLACE_COUNT};
pub use pull_get_status::{
    generate_pull_get_status_request, parse_pull_get_status, STATUS_RESPONSE_LEN,
};
pub use pull_get_value::{
    generate_pull_get_value_request, parse_pull_get_value, VALUE_LIMIT, VALUE_RESPONSE_LEN,
};

/// An encoded RTU request together with the client state needed to check
/// its response.
pub struct PlaceRequest {
    request: ModbusRequest,
    frame: Vec<u8>,
}

impl PlaceRequest {
    fn read_holdings(unit: u8, register: u16, count: u16) -> Result<Self, TransportError> {
        let mut request = ModbusRequest::new(unit, ModbusProto::Rtu);
        let mut frame = Vec::new();
        request
            .generate_get_holdings(register, count, &mut frame)
            .map_err(|err| TransportError::Rejected {
                reason: format!("cannot encode request: {err:?}"),
            })?;
        Ok(Self { request, frame })
    }

    /// Raw bytes to put on the wire.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn unit_address(&self) -> u8 {
        self.frame[0]
    }

    pub fn check_response(&self, response: &[u8]) -> Result<(), TransportError> {
        self.request
            .parse_ok(response)
            .map_err(|err| TransportError::Rejected {
                reason: format!("{err:?}: {}", hex(response)),
            })
    }
}

/// Space separated upper-case hex dump used in log lines and error texts.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

use super::{Place, PlaceRequest};
use crate::error::{ReadError, TransportError};

/// unit + function + byte count + one register + CRC
pub const STATUS_RESPONSE_LEN: usize = 7;

pub fn generate_pull_get_status_request(place: Place) -> Result<PlaceRequest, TransportError> {
    PlaceRequest::read_holdings(place.unit_address(), place.status_register(), 1)
}

/// Decode the status word. A non-zero word means the place is not ready and
/// its value must not be requested in this pass.
pub fn parse_pull_get_status(response: &[u8]) -> Result<u16, ReadError> {
    if response.len() != STATUS_RESPONSE_LEN {
        return Err(ReadError::MalformedResponse {
            expected: STATUS_RESPONSE_LEN,
            actual: response.len(),
            frame: response.to_vec(),
        });
    }
    let status = u16::from_be_bytes([response[3], response[4]]);
    if status != 0 {
        return Err(ReadError::DeviceStatus { status });
    }
    Ok(status)
}

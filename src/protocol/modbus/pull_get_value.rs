use super::{Place, PlaceRequest};
use crate::error::{ReadError, TransportError};

/// unit + function + byte count + two registers + CRC
pub const VALUE_RESPONSE_LEN: usize = 9;

/// Readings above this are physically impossible for the sensors on the rig.
pub const VALUE_LIMIT: f32 = 1000.0;

pub fn generate_pull_get_value_request(place: Place) -> Result<PlaceRequest, TransportError> {
    PlaceRequest::read_holdings(place.unit_address(), place.value_register(), 2)
}

/// Decode the big-endian `f32` measurement. Out-of-range values are returned
/// inside [`ReadError::ValueOutOfRange`] so the caller can still surface them.
pub fn parse_pull_get_value(response: &[u8]) -> Result<f32, ReadError> {
    if response.len() != VALUE_RESPONSE_LEN {
        return Err(ReadError::MalformedResponse {
            expected: VALUE_RESPONSE_LEN,
            actual: response.len(),
            frame: response.to_vec(),
        });
    }
    let value = f32::from_be_bytes([response[3], response[4], response[5], response[6]]);
    if value > VALUE_LIMIT {
        return Err(ReadError::ValueOutOfRange { value });
    }
    Ok(value)
}

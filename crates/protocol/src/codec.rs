//! Temperature response decoding
//!
//! The device answers every `uTemp` command with an 8-byte interrupt report.
//! Bytes 2 and 3 hold the reading in 8.8 fixed point:
//!
//! ```text
//! [ ?? ][ ?? ][ whole degrees ][ 1/256 degrees ][ ?? ][ ?? ][ ?? ][ ?? ]
//! ```
//!
//! Both bytes are unsigned, so readings range from 0.0 to 255.99609375 °C.

use crate::error::{ProtocolError, Result};
use crate::types::{RESPONSE_LEN, TEMPERATURE_OFFSET};

/// Largest value [`decode_temperature`] can return
pub const MAX_TEMPERATURE: f64 = 255.0 + 255.0 / 256.0;

/// Decode a temperature response into degrees Celsius
///
/// Only the bytes at offset 2 and 3 are read.
///
/// # Example
/// ```
/// use protocol::decode_temperature;
///
/// let response = [0x00, 0x00, 0x16, 0x80, 0x00, 0x00, 0x00, 0x00];
/// assert_eq!(decode_temperature(&response), 22.5);
/// ```
pub fn decode_temperature(response: &[u8; RESPONSE_LEN]) -> f64 {
    let high = response[TEMPERATURE_OFFSET];
    let low = response[TEMPERATURE_OFFSET + 1];
    f64::from(high) + f64::from(low) / 256.0
}

/// Validate the length of a raw response and decode it
///
/// `data` must be exactly what the interrupt read returned. Any length other
/// than 8 is rejected before decoding.
///
/// # Example
/// ```
/// use protocol::{parse_response, ProtocolError};
///
/// assert_eq!(parse_response(&[0, 0, 0xff, 0xff, 0, 0, 0, 0]), Ok(255.99609375));
/// assert!(matches!(
///     parse_response(&[0, 0, 0x16]),
///     Err(ProtocolError::UnexpectedLength { expected: 8, actual: 3 })
/// ));
/// ```
pub fn parse_response(data: &[u8]) -> Result<f64> {
    let response: &[u8; RESPONSE_LEN] =
        data.try_into().map_err(|_| ProtocolError::UnexpectedLength {
            expected: RESPONSE_LEN,
            actual: data.len(),
        })?;
    Ok(decode_temperature(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_documented_examples() {
        assert_eq!(decode_temperature(&[0, 0, 0x16, 0x80, 0, 0, 0, 0]), 22.5);
        assert_eq!(decode_temperature(&[0, 0, 0x00, 0x00, 0, 0, 0, 0]), 0.0);
        assert_eq!(
            decode_temperature(&[0, 0, 0xff, 0xff, 0, 0, 0, 0]),
            255.99609375
        );
    }

    #[test]
    fn test_decode_ignores_other_bytes() {
        let a = [0x00, 0x00, 0x19, 0x40, 0x00, 0x00, 0x00, 0x00];
        let b = [0xff, 0xaa, 0x19, 0x40, 0x55, 0x01, 0x02, 0xfe];
        assert_eq!(decode_temperature(&a), decode_temperature(&b));
        assert_eq!(decode_temperature(&a), 25.25);
    }

    #[test]
    fn test_max_temperature() {
        assert_eq!(MAX_TEMPERATURE, 255.99609375);
    }

    #[test]
    fn test_parse_response_rejects_short_and_long() {
        assert_eq!(
            parse_response(&[]),
            Err(ProtocolError::UnexpectedLength {
                expected: 8,
                actual: 0
            })
        );
        assert_eq!(
            parse_response(&[0; 7]),
            Err(ProtocolError::UnexpectedLength {
                expected: 8,
                actual: 7
            })
        );
        assert_eq!(
            parse_response(&[0; 9]),
            Err(ProtocolError::UnexpectedLength {
                expected: 8,
                actual: 9
            })
        );
    }

    #[test]
    fn test_parse_response_decodes_full_report() {
        assert_eq!(parse_response(&[1, 2, 0x16, 0x80, 3, 4, 5, 6]), Ok(22.5));
    }
}

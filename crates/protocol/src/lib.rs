//! Protocol library for the TEMPer USB thermometer
//!
//! This crate defines the fixed wire contract of the device: identifiers,
//! control request layouts, the three magic commands, the initialization
//! handshake table and the decoder for temperature responses. It performs no
//! I/O and has no USB dependency.
//!
//! # Example
//!
//! ```
//! use protocol::{Command, HANDSHAKE, parse_response};
//!
//! // The handshake always starts with a temperature request
//! assert_eq!(HANDSHAKE[0].command, Command::ReadTemperature);
//!
//! // Decode an 8-byte interrupt report
//! let celsius = parse_response(&[0x00, 0x00, 0x16, 0x80, 0x00, 0x00, 0x00, 0x00]).unwrap();
//! assert_eq!(celsius, 22.5);
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{MAX_TEMPERATURE, decode_temperature, parse_response};
pub use error::{ProtocolError, Result};
pub use types::{
    ALTERNATE_SETTING, COMMAND_LEN, COMMAND_REQUEST, CONFIGURATION, Command, ControlRequest,
    DEFAULT_TIMEOUT, HANDSHAKE, HandshakePhase, INIT1_COMMAND, INIT2_COMMAND, INTERFACES,
    INTERRUPT_IN_ENDPOINT, PRODUCT_ID, REQUEST_SET_REPORT, REQUEST_TYPE_CLASS_INTERFACE_OUT,
    RESPONSE_LEN, SETUP_PAYLOAD, SETUP_REQUEST, TEMPERATURE_COMMAND, TEMPERATURE_OFFSET,
    VENDOR_ID,
};

//! Device constants and command tables
//!
//! Everything the TEMPer wire protocol needs is a fixed constant: the device
//! identifiers, the interfaces to claim, the control request layouts and the
//! three 8-byte magic commands. Nothing here is derived at runtime, so the
//! tables can be audited against the device documentation directly.

use std::fmt;
use std::time::Duration;

/// USB Vendor ID of the TEMPer thermometer
pub const VENDOR_ID: u16 = 0x0c45;

/// USB Product ID of the TEMPer thermometer
pub const PRODUCT_ID: u16 = 0x7401;

/// Configuration value selected during setup
pub const CONFIGURATION: u8 = 1;

/// Interfaces claimed during setup, in claim order
pub const INTERFACES: [u8; 2] = [0x00, 0x01];

/// Alternate setting used for every claimed interface
pub const ALTERNATE_SETTING: u8 = 0;

/// Interrupt IN endpoint carrying device responses
pub const INTERRUPT_IN_ENDPOINT: u8 = 0x82;

/// Length of every interrupt response and magic command
pub const RESPONSE_LEN: usize = 8;

/// Length of a magic command payload
pub const COMMAND_LEN: usize = 8;

/// Offset of the whole-degree byte in a temperature response
pub const TEMPERATURE_OFFSET: usize = 2;

/// Default timeout for every control and interrupt transfer (5 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// bmRequestType: class request, host-to-device, interface recipient
pub const REQUEST_TYPE_CLASS_INTERFACE_OUT: u8 = 0x21;

/// bRequest: HID SET_REPORT
pub const REQUEST_SET_REPORT: u8 = 0x09;

/// Payload of the one-off setup request sent before the handshake
pub const SETUP_PAYLOAD: [u8; 2] = [0x01, 0x01];

/// Magic command requesting a temperature sample (`uTemp`)
pub const TEMPERATURE_COMMAND: [u8; COMMAND_LEN] = [0x01, 0x80, 0x33, 0x01, 0x00, 0x00, 0x00, 0x00];

/// First initialization command (`uIni1`)
pub const INIT1_COMMAND: [u8; COMMAND_LEN] = [0x01, 0x82, 0x77, 0x01, 0x00, 0x00, 0x00, 0x00];

/// Second initialization command (`uIni2`)
pub const INIT2_COMMAND: [u8; COMMAND_LEN] = [0x01, 0x86, 0xff, 0x01, 0x00, 0x00, 0x00, 0x00];

/// Header fields of a class control request
///
/// The payload is supplied separately at transfer time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlRequest {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
}

/// Setup request: SET_REPORT on interface 0 with report id 0x0201
pub const SETUP_REQUEST: ControlRequest = ControlRequest {
    request_type: REQUEST_TYPE_CLASS_INTERFACE_OUT,
    request: REQUEST_SET_REPORT,
    value: 0x0201,
    index: 0x00,
};

/// Command request: SET_REPORT on interface 1, used for every magic command
///
/// Shares type and request with [`SETUP_REQUEST`] but differs in value and
/// index. Both are required by the device.
pub const COMMAND_REQUEST: ControlRequest = ControlRequest {
    request_type: REQUEST_TYPE_CLASS_INTERFACE_OUT,
    request: REQUEST_SET_REPORT,
    value: 0x0200,
    index: 0x01,
};

/// One of the three magic commands understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Request a temperature sample (`uTemp`)
    ReadTemperature,
    /// First initialization step (`uIni1`)
    Init1,
    /// Second initialization step (`uIni2`)
    Init2,
}

impl Command {
    /// The 8-byte payload sent for this command
    pub const fn payload(self) -> &'static [u8; COMMAND_LEN] {
        match self {
            Command::ReadTemperature => &TEMPERATURE_COMMAND,
            Command::Init1 => &INIT1_COMMAND,
            Command::Init2 => &INIT2_COMMAND,
        }
    }

    /// Short name used in logs and error messages
    pub const fn name(self) -> &'static str {
        match self {
            Command::ReadTemperature => "uTemp",
            Command::Init1 => "uIni1",
            Command::Init2 => "uIni2",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A handshake phase: one command followed by a number of draining reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePhase {
    pub command: Command,
    /// Interrupt reads performed after the command; their data is discarded
    pub drain_reads: usize,
}

/// The initialization handshake, in execution order
pub const HANDSHAKE: [HandshakePhase; 3] = [
    HandshakePhase {
        command: Command::ReadTemperature,
        drain_reads: 1,
    },
    HandshakePhase {
        command: Command::Init1,
        drain_reads: 1,
    },
    HandshakePhase {
        command: Command::Init2,
        drain_reads: 2,
    },
];

//! Device session error types

use protocol::{Command, ProtocolError};
use std::fmt;
use thiserror::Error;

/// Failure to find or open the thermometer
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to initialize USB context: {0}")]
    Context(#[source] rusb::Error),

    #[error("Failed listing devices: {0}")]
    Enumeration(#[source] rusb::Error),

    #[error("Found no TEMPer devices ({vendor_id:04x}:{product_id:04x})")]
    NotFound { vendor_id: u16, product_id: u16 },

    #[error("Failed to open device: {0}")]
    Open(#[source] rusb::Error),
}

/// A step of the setup sequence run when a session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Reset,
    AutoDetach,
    Configuration(u8),
    ClaimInterface(u8),
    /// The one-off request sent before the handshake
    SetupControl,
    /// Handshake control transfer
    Command(Command),
    /// Handshake interrupt read, numbered from 1 within its phase
    DrainRead { command: Command, read: usize },
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::Reset => write!(f, "reset"),
            SetupStep::AutoDetach => write!(f, "set auto-detach"),
            SetupStep::Configuration(value) => write!(f, "set configuration {}", value),
            SetupStep::ClaimInterface(interface) => write!(f, "claim iface-{}", interface),
            SetupStep::SetupControl => write!(f, "setup control transfer"),
            SetupStep::Command(command) => write!(f, "control transfer {}", command),
            SetupStep::DrainRead { command, read } => {
                write!(f, "interrupt read {} after {}", read, command)
            }
        }
    }
}

/// A steady-state transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Control(Command),
    InterruptRead,
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOp::Control(command) => write!(f, "control transfer {}", command),
            TransferOp::InterruptRead => write!(f, "interrupt read"),
        }
    }
}

/// Device session errors
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Opening failed part way; the device has already been released
    #[error("Setup failed at {step}: {source}")]
    Setup {
        step: SetupStep,
        #[source]
        source: rusb::Error,
    },

    #[error("Failed to read temperature: {operation} failed: {source}")]
    Transfer {
        operation: TransferOp,
        #[source]
        source: rusb::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Device session has been released")]
    Released,
}

impl Error {
    /// The underlying USB error, if any
    pub fn usb_error(&self) -> Option<rusb::Error> {
        match self {
            Error::Discovery(
                DiscoveryError::Context(e) | DiscoveryError::Enumeration(e) | DiscoveryError::Open(e),
            ) => Some(*e),
            Error::Setup { source, .. } | Error::Transfer { source, .. } => Some(*source),
            _ => None,
        }
    }

    /// Whether the failure was a transfer timeout
    pub fn is_timeout(&self) -> bool {
        self.usb_error() == Some(rusb::Error::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

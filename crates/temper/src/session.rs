//! TEMPer device session
//!
//! A [`Session`] owns one opened thermometer. Opening it runs the whole
//! setup sequence; once it is returned the device is ready for
//! [`Session::get_temperature`]. The device is released exactly once: on
//! [`Session::release`], on drop, or when opening fails part way.
//!
//! Setup order:
//!
//! ```text
//! reset -> auto-detach -> configuration 1 -> claim iface 0 -> claim iface 1
//!       -> setup control transfer
//!       -> uTemp + 1 read -> uIni1 + 1 read -> uIni2 + 2 reads
//! ```

use crate::error::{DiscoveryError, Error, Result, SetupStep, TransferOp};
use crate::usb::{UsbBus, UsbDeviceIo, transfers};
use protocol::{
    ALTERNATE_SETTING, CONFIGURATION, Command, DEFAULT_TIMEOUT, HANDSHAKE, INTERFACES,
    PRODUCT_ID, ProtocolError, RESPONSE_LEN, SETUP_PAYLOAD, SETUP_REQUEST, VENDOR_ID,
    parse_response,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Timeout applied to every control transfer and interrupt read
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake done, reads allowed
    Ready,
    /// Device closed, terminal
    Released,
}

/// An initialized thermometer
///
/// Reads take `&mut self`: the device keeps protocol state between a
/// command and its response, so a session must never be driven from two
/// places at once. A session can be moved to another thread.
pub struct Session<D: UsbDeviceIo> {
    /// `None` once released
    device: Option<D>,
    /// Interface whose interrupt endpoint carries responses
    interface: u8,
    config: SessionConfig,
}

impl<D: UsbDeviceIo> Session<D> {
    /// Find the thermometer on `bus`, open it and run the setup sequence
    ///
    /// When several thermometers are attached the first one in enumeration
    /// order is used. That order is platform dependent. The other devices
    /// are never opened.
    pub fn open<B>(bus: &B, config: SessionConfig) -> Result<Self>
    where
        B: UsbBus<Device = D>,
    {
        let candidates = bus
            .find(VENDOR_ID, PRODUCT_ID)
            .map_err(DiscoveryError::Enumeration)?;

        let Some(first) = candidates.first() else {
            return Err(DiscoveryError::NotFound {
                vendor_id: VENDOR_ID,
                product_id: PRODUCT_ID,
            }
            .into());
        };

        info!("Found {} TEMPer device(s)", candidates.len());
        if candidates.len() > 1 {
            warn!(
                "Using the first device, {} other(s) left untouched",
                candidates.len() - 1
            );
        }

        let device = bus.open(first).map_err(DiscoveryError::Open)?;
        Self::initialize(device, config)
    }

    /// Run the setup sequence on an already opened device
    ///
    /// On failure the device is closed before the error is returned.
    pub fn initialize(device: D, config: SessionConfig) -> Result<Self> {
        let mut session = Self {
            device: Some(device),
            interface: INTERFACES[0],
            config,
        };

        // An early return drops `session`, which releases the device
        session.setup()?;

        info!("TEMPer device ready");
        Ok(session)
    }

    fn setup(&mut self) -> Result<()> {
        let timeout = self.config.timeout;
        let device = self.device.as_mut().ok_or(Error::Released)?;

        debug!("Reset device");
        device.reset().map_err(setup_error(SetupStep::Reset))?;

        debug!("Set auto-detach");
        device
            .set_auto_detach(true)
            .map_err(setup_error(SetupStep::AutoDetach))?;

        debug!("Set configuration to {:#04x}", CONFIGURATION);
        device
            .set_configuration(CONFIGURATION)
            .map_err(setup_error(SetupStep::Configuration(CONFIGURATION)))?;

        for interface in INTERFACES {
            debug!("Claim iface-{}", interface);
            device
                .claim_interface(interface, ALTERNATE_SETTING)
                .map_err(setup_error(SetupStep::ClaimInterface(interface)))?;
            self.interface = interface;
        }

        let device: &D = device;

        debug!("Setup control transfer");
        transfers::control_transfer(device, SETUP_REQUEST, &SETUP_PAYLOAD, timeout)
            .map_err(setup_error(SetupStep::SetupControl))?;

        // Responses to the handshake commands are only drained
        let mut scratch = [0u8; RESPONSE_LEN];
        for phase in HANDSHAKE {
            transfers::send_command(device, phase.command, timeout)
                .map_err(setup_error(SetupStep::Command(phase.command)))?;

            for read in 1..=phase.drain_reads {
                transfers::interrupt_read(device, &mut scratch, timeout).map_err(setup_error(
                    SetupStep::DrainRead {
                        command: phase.command,
                        read,
                    },
                ))?;
            }
        }

        Ok(())
    }

    /// Take one temperature sample in degrees Celsius
    ///
    /// Sends `uTemp`, reads one 8-byte response and decodes it. Errors are
    /// returned as is; retrying is up to the caller.
    pub fn get_temperature(&mut self) -> Result<f64> {
        let timeout = self.config.timeout;
        let device = self.device.as_ref().ok_or(Error::Released)?;

        transfers::send_command(device, Command::ReadTemperature, timeout).map_err(|source| {
            Error::Transfer {
                operation: TransferOp::Control(Command::ReadTemperature),
                source,
            }
        })?;

        let mut response = [0u8; RESPONSE_LEN];
        let len = transfers::interrupt_read(device, &mut response, timeout).map_err(|source| {
            Error::Transfer {
                operation: TransferOp::InterruptRead,
                source,
            }
        })?;

        let data = response
            .get(..len)
            .ok_or(ProtocolError::UnexpectedLength {
                expected: RESPONSE_LEN,
                actual: len,
            })?;
        let temperature = parse_response(data)?;

        debug!(
            "Temperature {:.4} from iface-{} response {:02x?}",
            temperature, self.interface, response
        );
        Ok(temperature)
    }

    /// Close the device
    ///
    /// Safe to call more than once; only the first call reaches the device.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
            info!("Released TEMPer device");
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        if self.device.is_some() {
            SessionState::Ready
        } else {
            SessionState::Released
        }
    }

    pub fn is_released(&self) -> bool {
        self.state() == SessionState::Released
    }

    /// Interface used for endpoint I/O (the last one claimed)
    pub fn interface(&self) -> u8 {
        self.interface
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<D: UsbDeviceIo> Drop for Session<D> {
    fn drop(&mut self) {
        self.release();
    }
}

fn setup_error(step: SetupStep) -> impl FnOnce(rusb::Error) -> Error {
    move |source| {
        warn!("Failed to {}: {}", step, source);
        Error::Setup { step, source }
    }
}

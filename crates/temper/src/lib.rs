//! Reader for the TEMPer USB thermometer (0c45:7401)
//!
//! [`open`] finds the thermometer, claims its interfaces and runs the
//! initialization handshake; the returned [`Session`] then reads the
//! temperature on demand.
//!
//! ```no_run
//! # fn main() -> temper::Result<()> {
//! let mut session = temper::open()?;
//! println!("{:.2}", session.get_temperature()?);
//! session.release();
//! # Ok(())
//! # }
//! ```
//!
//! The USB backend sits behind the [`usb::UsbBus`] and [`usb::UsbDeviceIo`]
//! traits; [`test_utils`] provides a recording mock of both.

pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod session;
pub mod test_utils;
pub mod usb;

pub use config::TemperConfig;
pub use error::{DiscoveryError, Error, Result, SetupStep, TransferOp};
pub use logging::setup_logging;
pub use poller::{DEFAULT_POLL_INTERVAL, PollStats, Poller};
pub use session::{Session, SessionConfig, SessionState};
pub use usb::{RusbBus, RusbDevice};

/// Open the first attached thermometer with the default 5 second timeout
pub fn open() -> Result<Session<RusbDevice>> {
    open_with(SessionConfig::default())
}

/// Open the first attached thermometer
pub fn open_with(config: SessionConfig) -> Result<Session<RusbDevice>> {
    let bus = RusbBus::new().map_err(DiscoveryError::Context)?;
    Session::open(&bus, config)
}

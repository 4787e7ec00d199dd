//! USB subsystem
//!
//! Device discovery, the backend seam used by the session, and the two
//! transfer primitives (control transfer, interrupt read).

pub mod device;
pub mod transfers;

pub use device::{DeviceSummary, RusbBus, RusbDevice, UsbBus, UsbDeviceIo};
pub use transfers::{control_transfer, interrupt_read, send_command};

//! USB transfer primitives
//!
//! The two transfers the TEMPer protocol is made of: a class control
//! request carrying a command payload, and an 8-byte read from the
//! interrupt IN endpoint. Both are synchronous, bounded by the caller's
//! timeout, and never retried.

use crate::usb::device::UsbDeviceIo;
use protocol::{COMMAND_REQUEST, Command, ControlRequest, INTERRUPT_IN_ENDPOINT};
use std::time::Duration;
use tracing::{debug, trace};

/// Execute a host-to-device control transfer
///
/// Returns the number of bytes transferred.
pub fn control_transfer<D: UsbDeviceIo + ?Sized>(
    device: &D,
    request: ControlRequest,
    data: &[u8],
    timeout: Duration,
) -> rusb::Result<usize> {
    trace!(
        "Control transfer: request_type={:#x}, request={:#x}, value={:#06x}, index={:#x}, data={:02x?}",
        request.request_type, request.request, request.value, request.index, data
    );

    match device.write_control(request, data, timeout) {
        Ok(len) => {
            trace!("Control transfer succeeded: {} bytes", len);
            Ok(len)
        }
        Err(e) => {
            debug!("Control transfer failed: {}", e);
            Err(e)
        }
    }
}

/// Send one of the magic commands with the command request header
pub fn send_command<D: UsbDeviceIo + ?Sized>(
    device: &D,
    command: Command,
    timeout: Duration,
) -> rusb::Result<usize> {
    debug!("Sending command {}", command);
    control_transfer(device, COMMAND_REQUEST, command.payload(), timeout)
}

/// Read from the interrupt IN endpoint into `buf`
///
/// Returns the number of bytes read, which may be less than `buf.len()`.
pub fn interrupt_read<D: UsbDeviceIo + ?Sized>(
    device: &D,
    buf: &mut [u8],
    timeout: Duration,
) -> rusb::Result<usize> {
    match device.read_interrupt(INTERRUPT_IN_ENDPOINT, buf, timeout) {
        Ok(len) => {
            trace!(
                "Interrupt read on {:#x}: {} bytes {:02x?}",
                INTERRUPT_IN_ENDPOINT,
                len,
                &buf[..len.min(buf.len())]
            );
            Ok(len)
        }
        Err(e) => {
            debug!("Interrupt read on {:#x} failed: {}", INTERRUPT_IN_ENDPOINT, e);
            Err(e)
        }
    }
}

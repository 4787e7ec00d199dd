//! USB device abstraction
//!
//! The session never talks to libusb directly. It goes through two small
//! traits: [`UsbBus`] finds and opens devices, [`UsbDeviceIo`] performs the
//! handful of operations the TEMPer protocol needs on an opened device.
//! [`RusbBus`] and [`RusbDevice`] implement them on top of `rusb`.

use protocol::ControlRequest;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Operations performed on an opened USB device
///
/// All methods are synchronous and block until the device answers or the
/// timeout expires.
pub trait UsbDeviceIo {
    /// Reset the device
    fn reset(&mut self) -> rusb::Result<()>;

    /// Let the host library detach kernel drivers from claimed interfaces
    fn set_auto_detach(&mut self, enable: bool) -> rusb::Result<()>;

    /// Select the active configuration
    fn set_configuration(&mut self, config: u8) -> rusb::Result<()>;

    /// Claim an interface and select its alternate setting
    fn claim_interface(&mut self, interface: u8, alt_setting: u8) -> rusb::Result<()>;

    /// Host-to-device control transfer, returns the number of bytes written
    fn write_control(
        &self,
        request: ControlRequest,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// Interrupt IN transfer, returns the number of bytes read into `buf`
    fn read_interrupt(&self, endpoint: u8, buf: &mut [u8], timeout: Duration)
        -> rusb::Result<usize>;

    /// Release claimed interfaces and close the handle
    fn close(&mut self);
}

/// Device discovery
pub trait UsbBus {
    /// A matching, not yet opened device
    type Candidate;
    /// An opened device
    type Device: UsbDeviceIo;

    /// List attached devices with the given identifiers, in enumeration order
    fn find(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Vec<Self::Candidate>>;

    /// Open one candidate returned by [`UsbBus::find`]
    fn open(&self, candidate: &Self::Candidate) -> rusb::Result<Self::Device>;
}

/// Summary of an attached device, as shown by `--list-devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// libusb-backed bus
pub struct RusbBus {
    context: Context,
}

impl RusbBus {
    /// Create a new libusb context
    pub fn new() -> rusb::Result<Self> {
        let context = Context::new()?;
        Ok(Self { context })
    }

    /// Describe every attached device with the given identifiers
    ///
    /// String descriptors are read by opening each device briefly; devices
    /// that cannot be opened are still listed, without strings.
    pub fn list(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Vec<DeviceSummary>> {
        let devices = self.find(vendor_id, product_id)?;
        Ok(devices.iter().map(describe).collect())
    }
}

impl UsbBus for RusbBus {
    type Candidate = Device<Context>;
    type Device = RusbDevice;

    fn find(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Vec<Device<Context>>> {
        let devices = self.context.devices()?;

        let matching: Vec<_> = devices
            .iter()
            .filter(|device| match device.device_descriptor() {
                Ok(desc) => desc.vendor_id() == vendor_id && desc.product_id() == product_id,
                Err(e) => {
                    debug!(
                        "Skipping device bus={} addr={}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    false
                }
            })
            .collect();

        debug!(
            "Found {} device(s) matching {:04x}:{:04x}",
            matching.len(),
            vendor_id,
            product_id
        );
        Ok(matching)
    }

    fn open(&self, candidate: &Device<Context>) -> rusb::Result<RusbDevice> {
        let handle = candidate.open().map_err(|e| {
            warn!(
                "Failed to open device bus={} addr={}: {}",
                candidate.bus_number(),
                candidate.address(),
                e
            );
            e
        })?;

        debug!(
            "Opened device bus={} addr={}",
            candidate.bus_number(),
            candidate.address()
        );
        Ok(RusbDevice {
            handle: Some(handle),
            claimed_interfaces: Vec::new(),
        })
    }
}

/// Opened libusb device
pub struct RusbDevice {
    /// `None` once closed
    handle: Option<DeviceHandle<Context>>,
    /// Interfaces claimed by us, released on close
    claimed_interfaces: Vec<u8>,
}

impl RusbDevice {
    fn handle(&self) -> rusb::Result<&DeviceHandle<Context>> {
        self.handle.as_ref().ok_or(rusb::Error::NoDevice)
    }

    fn handle_mut(&mut self) -> rusb::Result<&mut DeviceHandle<Context>> {
        self.handle.as_mut().ok_or(rusb::Error::NoDevice)
    }
}

impl UsbDeviceIo for RusbDevice {
    fn reset(&mut self) -> rusb::Result<()> {
        self.handle_mut()?.reset()
    }

    fn set_auto_detach(&mut self, enable: bool) -> rusb::Result<()> {
        self.handle_mut()?.set_auto_detach_kernel_driver(enable)
    }

    fn set_configuration(&mut self, config: u8) -> rusb::Result<()> {
        self.handle_mut()?.set_active_configuration(config)
    }

    fn claim_interface(&mut self, interface: u8, alt_setting: u8) -> rusb::Result<()> {
        let handle = self.handle_mut()?;
        handle.claim_interface(interface)?;
        self.claimed_interfaces.push(interface);

        // Alternate setting 0 is already active after a claim
        if alt_setting != 0 {
            self.handle_mut()?.set_alternate_setting(interface, alt_setting)?;
        }
        Ok(())
    }

    fn write_control(
        &self,
        request: ControlRequest,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle()?.write_control(
            request.request_type,
            request.request,
            request.value,
            request.index,
            data,
            timeout,
        )
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle()?.read_interrupt(endpoint, buf, timeout)
    }

    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            for interface in self.claimed_interfaces.drain(..) {
                if let Err(e) = handle.release_interface(interface) {
                    warn!("Failed to release interface {}: {}", interface, e);
                }
            }
            // Dropping the handle closes it; auto-detach reattaches kernel drivers
            drop(handle);
            debug!("Closed device");
        }
    }
}

impl Drop for RusbDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read descriptor and string information for a device
fn describe(device: &Device<Context>) -> DeviceSummary {
    let descriptor = device.device_descriptor().ok();
    let (manufacturer, product) = match (&descriptor, device.open()) {
        (Some(desc), Ok(handle)) => (
            desc.manufacturer_string_index()
                .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
            desc.product_string_index()
                .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
        ),
        _ => (None, None),
    };

    DeviceSummary {
        bus_number: device.bus_number(),
        address: device.address(),
        vendor_id: descriptor.as_ref().map_or(0, |d| d.vendor_id()),
        product_id: descriptor.as_ref().map_or(0, |d| d.product_id()),
        manufacturer,
        product,
    }
}

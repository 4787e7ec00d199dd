//! Test utilities for temper
//!
//! A scripted USB backend that records every call, so tests can check the
//! exact order of operations and inject failures at any point.
//!
//! # Example
//!
//! ```
//! use temper::test_utils::{MockBus, MockDevice, UsbCall};
//! use temper::{Session, SessionConfig};
//!
//! let bus = MockBus::new()
//!     .with_device(MockDevice::new().with_response(&[0, 0, 0x16, 0x80, 0, 0, 0, 0]));
//! let mut session = Session::open(&bus, SessionConfig::default()).unwrap();
//! assert_eq!(session.get_temperature().unwrap(), 22.5);
//!
//! session.release();
//! assert_eq!(bus.log().calls().last(), Some(&UsbCall::Close));
//! ```

use crate::usb::{UsbBus, UsbDeviceIo};
use protocol::ControlRequest;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Number of device calls made by a successful setup
///
/// reset, auto-detach, configuration, 2 claims, setup control, then
/// 3 handshake commands with 4 draining reads.
pub const SETUP_CALL_COUNT: usize = 13;

/// A call made through the USB backend traits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbCall {
    Find { vendor_id: u16, product_id: u16 },
    Open(usize),
    Reset,
    AutoDetach(bool),
    SetConfiguration(u8),
    ClaimInterface { interface: u8, alt_setting: u8 },
    Control { request: ControlRequest, data: Vec<u8> },
    InterruptRead { endpoint: u8, len: usize },
    Close,
}

/// Shared, ordered record of backend calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<UsbCall>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<UsbCall>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: UsbCall) {
        self.lock().push(call);
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<UsbCall> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&UsbCall) -> bool) -> usize {
        self.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Device calls made so far, `close` excluded
    calls_made: usize,
    /// Call index -> error returned instead of performing the call
    failures: HashMap<usize, rusb::Error>,
    /// Interrupt responses consumed before falling back to `default_response`
    responses: VecDeque<Vec<u8>>,
    default_response: Vec<u8>,
}

/// Scripted device
///
/// Every call except `close` is numbered from 0; [`MockDevice::fail_call`]
/// makes the call with that number fail. Interrupt reads return queued
/// responses first, then the default response (8 zero bytes unless set).
#[derive(Debug)]
pub struct MockDevice {
    log: CallLog,
    state: Mutex<MockState>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            state: Mutex::new(MockState {
                default_response: vec![0; 8],
                ..MockState::default()
            }),
        }
    }

    /// Fail the call with the given number
    pub fn fail_call(self, index: usize, error: rusb::Error) -> Self {
        self.lock().failures.insert(index, error);
        self
    }

    /// Set the response returned when the queue is empty
    pub fn with_response(self, data: &[u8]) -> Self {
        self.lock().default_response = data.to_vec();
        self
    }

    /// Queue a response for the next interrupt read
    pub fn queue_response(self, data: &[u8]) -> Self {
        self.lock().responses.push_back(data.to_vec());
        self
    }

    /// The log this device records into
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and return the injected error for it, if any
    fn record(&self, call: UsbCall) -> rusb::Result<()> {
        self.log.push(call);
        let mut state = self.lock();
        let index = state.calls_made;
        state.calls_made += 1;
        match state.failures.get(&index) {
            Some(error) => Err(*error),
            None => Ok(()),
        }
    }
}

impl UsbDeviceIo for MockDevice {
    fn reset(&mut self) -> rusb::Result<()> {
        self.record(UsbCall::Reset)
    }

    fn set_auto_detach(&mut self, enable: bool) -> rusb::Result<()> {
        self.record(UsbCall::AutoDetach(enable))
    }

    fn set_configuration(&mut self, config: u8) -> rusb::Result<()> {
        self.record(UsbCall::SetConfiguration(config))
    }

    fn claim_interface(&mut self, interface: u8, alt_setting: u8) -> rusb::Result<()> {
        self.record(UsbCall::ClaimInterface {
            interface,
            alt_setting,
        })
    }

    fn write_control(
        &self,
        request: ControlRequest,
        data: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        self.record(UsbCall::Control {
            request,
            data: data.to_vec(),
        })?;
        Ok(data.len())
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        self.record(UsbCall::InterruptRead {
            endpoint,
            len: buf.len(),
        })?;

        let mut state = self.lock();
        let response = match state.responses.pop_front() {
            Some(response) => response,
            None => state.default_response.clone(),
        };
        let len = response.len().min(buf.len());
        buf[..len].copy_from_slice(&response[..len]);
        Ok(len)
    }

    fn close(&mut self) {
        self.log.push(UsbCall::Close);
    }
}

/// Scripted bus holding zero or more devices
#[derive(Debug, Default)]
pub struct MockBus {
    log: CallLog,
    devices: Mutex<Vec<Option<MockDevice>>>,
    enumeration_error: Option<rusb::Error>,
    open_error: Option<rusb::Error>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device; it records into the bus log from now on
    pub fn with_device(self, mut device: MockDevice) -> Self {
        device.log = self.log.clone();
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Some(device));
        self
    }

    /// Make `find` fail
    pub fn with_enumeration_error(mut self, error: rusb::Error) -> Self {
        self.enumeration_error = Some(error);
        self
    }

    /// Make `open` fail
    pub fn with_open_error(mut self, error: rusb::Error) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl UsbBus for MockBus {
    type Candidate = usize;
    type Device = MockDevice;

    fn find(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Vec<usize>> {
        self.log.push(UsbCall::Find {
            vendor_id,
            product_id,
        });
        if let Some(error) = self.enumeration_error {
            return Err(error);
        }
        let count = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        Ok((0..count).collect())
    }

    fn open(&self, candidate: &usize) -> rusb::Result<MockDevice> {
        self.log.push(UsbCall::Open(*candidate));
        if let Some(error) = self.open_error {
            return Err(error);
        }
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(*candidate)
            .and_then(Option::take)
            .ok_or(rusb::Error::NoDevice)
    }
}

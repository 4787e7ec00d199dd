//! Periodic temperature polling
//!
//! The poller owns a [`Session`] and runs on its own thread, since every
//! read blocks for up to the transfer timeout. Failed reads are logged and
//! the loop carries on; it stops when the shutdown flag is raised or the
//! optional poll limit is reached, and releases the device on the way out.

use crate::session::Session;
use crate::usb::UsbDeviceIo;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default delay between two reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Outcome counters of a polling run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub readings: u64,
    pub failures: u64,
}

impl PollStats {
    pub fn polls(&self) -> u64 {
        self.readings + self.failures
    }
}

pub struct Poller<D: UsbDeviceIo> {
    session: Session<D>,
    interval: Duration,
    max_polls: Option<u64>,
}

impl<D: UsbDeviceIo> Poller<D> {
    pub fn new(session: Session<D>, interval: Duration) -> Self {
        Self {
            session,
            interval,
            max_polls: None,
        }
    }

    /// Stop after `limit` polls, successful or not
    pub fn with_max_polls(mut self, limit: Option<u64>) -> Self {
        self.max_polls = limit;
        self
    }

    /// Poll until `shutdown` is set or the poll limit is reached
    ///
    /// `on_reading` is called with every successful reading. The session is
    /// released before returning.
    pub fn run<F>(mut self, shutdown: &AtomicBool, mut on_reading: F) -> PollStats
    where
        F: FnMut(f64),
    {
        let mut stats = PollStats::default();
        debug!(
            "Polling every {}ms (limit: {:?})",
            self.interval.as_millis(),
            self.max_polls
        );

        while !shutdown.load(Ordering::SeqCst) {
            match self.session.get_temperature() {
                Ok(temperature) => {
                    stats.readings += 1;
                    on_reading(temperature);
                }
                Err(e) if e.is_timeout() => {
                    stats.failures += 1;
                    warn!("Timed out reading temperature: {}", e);
                }
                Err(e) => {
                    stats.failures += 1;
                    error!("Failed to get temperature: {}", e);
                }
            }

            if self.max_polls.is_some_and(|limit| stats.polls() >= limit) {
                debug!("Poll limit reached");
                break;
            }

            thread::sleep(self.interval);
        }

        self.session.release();
        info!(
            "Polling stopped: {} readings, {} failures",
            stats.readings, stats.failures
        );
        stats
    }
}

impl<D: UsbDeviceIo + Send + 'static> Poller<D> {
    /// Run the poller on a dedicated thread
    pub fn spawn<F>(
        self,
        shutdown: Arc<AtomicBool>,
        on_reading: F,
    ) -> std::io::Result<JoinHandle<PollStats>>
    where
        F: FnMut(f64) + Send + 'static,
    {
        thread::Builder::new()
            .name("temper-poller".to_string())
            .spawn(move || self.run(&shutdown, on_reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::test_utils::{CallLog, MockDevice, SETUP_CALL_COUNT, UsbCall};

    fn ready_session(device: MockDevice) -> (Session<MockDevice>, CallLog) {
        let log = device.log();
        let session = Session::initialize(device, SessionConfig::default()).unwrap();
        (session, log)
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(DEFAULT_POLL_INTERVAL, Duration::from_millis(300));
    }

    #[test]
    fn test_poll_limit_and_release() {
        let (session, log) =
            ready_session(MockDevice::new().with_response(&[0, 0, 0x16, 0x80, 0, 0, 0, 0]));
        let shutdown = AtomicBool::new(false);
        let mut readings = Vec::new();

        let stats = Poller::new(session, Duration::ZERO)
            .with_max_polls(Some(3))
            .run(&shutdown, |t| readings.push(t));

        assert_eq!(
            stats,
            PollStats {
                readings: 3,
                failures: 0
            }
        );
        assert_eq!(readings, vec![22.5, 22.5, 22.5]);
        assert_eq!(log.calls().last(), Some(&UsbCall::Close));
        assert_eq!(log.count(|c| *c == UsbCall::Close), 1);
    }

    #[test]
    fn test_failures_do_not_stop_polling() {
        // First steady-state interrupt read times out, the next control transfer stalls
        let device = MockDevice::new()
            .with_response(&[0, 0, 0x14, 0x40, 0, 0, 0, 0])
            .fail_call(SETUP_CALL_COUNT + 1, rusb::Error::Timeout)
            .fail_call(SETUP_CALL_COUNT + 2, rusb::Error::Pipe);
        let (session, _log) = ready_session(device);
        let shutdown = AtomicBool::new(false);
        let mut readings = Vec::new();

        let stats = Poller::new(session, Duration::ZERO)
            .with_max_polls(Some(3))
            .run(&shutdown, |t| readings.push(t));

        assert_eq!(
            stats,
            PollStats {
                readings: 1,
                failures: 2
            }
        );
        assert_eq!(readings, vec![20.25]);
    }

    #[test]
    fn test_shutdown_before_first_poll() {
        let (session, log) = ready_session(MockDevice::new());
        let shutdown = AtomicBool::new(true);

        let stats = Poller::new(session, Duration::ZERO).run(&shutdown, |_| {});

        assert_eq!(stats.polls(), 0);
        assert_eq!(log.len(), SETUP_CALL_COUNT + 1);
        assert_eq!(log.calls().last(), Some(&UsbCall::Close));
    }
}

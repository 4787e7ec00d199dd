//! Integration tests for the device session
//!
//! Drives `Session` through the recording mock backend and checks:
//! - Discovery failures and device selection
//! - The exact setup and handshake call order
//! - Release on every setup failure path
//! - Steady-state reads, decoding and length validation

use protocol::{
    COMMAND_REQUEST, INIT1_COMMAND, INIT2_COMMAND, SETUP_REQUEST, TEMPERATURE_COMMAND,
};
use std::time::Duration;
use temper::test_utils::{MockBus, MockDevice, SETUP_CALL_COUNT, UsbCall};
use temper::{DiscoveryError, Error, Session, SessionConfig, SessionState, SetupStep, TransferOp};

fn config() -> SessionConfig {
    SessionConfig {
        timeout: Duration::from_millis(10),
    }
}

fn command(payload: [u8; 8]) -> UsbCall {
    UsbCall::Control {
        request: COMMAND_REQUEST,
        data: payload.to_vec(),
    }
}

fn read() -> UsbCall {
    UsbCall::InterruptRead {
        endpoint: 0x82,
        len: 8,
    }
}

/// Setup calls made on the device by a successful open, in order
fn expected_setup() -> Vec<UsbCall> {
    vec![
        UsbCall::Reset,
        UsbCall::AutoDetach(true),
        UsbCall::SetConfiguration(1),
        UsbCall::ClaimInterface {
            interface: 0,
            alt_setting: 0,
        },
        UsbCall::ClaimInterface {
            interface: 1,
            alt_setting: 0,
        },
        UsbCall::Control {
            request: SETUP_REQUEST,
            data: vec![0x01, 0x01],
        },
        command(TEMPERATURE_COMMAND),
        read(),
        command(INIT1_COMMAND),
        read(),
        command(INIT2_COMMAND),
        read(),
        read(),
    ]
}

mod discovery {
    use super::*;

    #[test]
    fn test_no_device_found() {
        let bus = MockBus::new();
        let result = Session::open(&bus, config());

        assert!(matches!(
            result,
            Err(Error::Discovery(DiscoveryError::NotFound {
                vendor_id: 0x0c45,
                product_id: 0x7401
            }))
        ));
        // Only the lookup happened, no configuration calls
        assert_eq!(
            bus.log().calls(),
            vec![UsbCall::Find {
                vendor_id: 0x0c45,
                product_id: 0x7401
            }]
        );
    }

    #[test]
    fn test_enumeration_failure() {
        let bus = MockBus::new()
            .with_device(MockDevice::new())
            .with_enumeration_error(rusb::Error::Io);
        let result = Session::open(&bus, config());

        assert!(matches!(
            result,
            Err(Error::Discovery(DiscoveryError::Enumeration(rusb::Error::Io)))
        ));
        assert_eq!(bus.log().len(), 1);
    }

    #[test]
    fn test_open_failure() {
        let bus = MockBus::new()
            .with_device(MockDevice::new())
            .with_open_error(rusb::Error::Access);
        let result = Session::open(&bus, config());

        assert!(matches!(
            result,
            Err(Error::Discovery(DiscoveryError::Open(rusb::Error::Access)))
        ));
        assert_eq!(bus.log().count(|c| *c == UsbCall::Reset), 0);
    }

    #[test]
    fn test_first_device_is_selected() {
        let bus = MockBus::new()
            .with_device(MockDevice::new())
            .with_device(MockDevice::new())
            .with_device(MockDevice::new());
        let _session = Session::open(&bus, config()).unwrap();

        let calls = bus.log().calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, UsbCall::Open(_))).count(), 1);
        assert_eq!(calls[1], UsbCall::Open(0));
    }
}

mod setup {
    use super::*;

    #[test]
    fn test_setup_call_order() {
        let bus = MockBus::new().with_device(MockDevice::new());
        let session = Session::open(&bus, config()).unwrap();

        let calls = bus.log().calls();
        assert_eq!(calls[2..], expected_setup()[..]);
        assert_eq!(expected_setup().len(), SETUP_CALL_COUNT);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.interface(), 1);
    }

    #[test]
    fn test_every_setup_failure_releases_exactly_once() {
        for index in 0..SETUP_CALL_COUNT {
            let device = MockDevice::new().fail_call(index, rusb::Error::Pipe);
            let log = device.log();

            let result = Session::initialize(device, config());
            assert!(
                matches!(
                    result,
                    Err(Error::Setup {
                        source: rusb::Error::Pipe,
                        ..
                    })
                ),
                "call {} should abort setup",
                index
            );

            let calls = log.calls();
            // Nothing after the failing call except the close
            assert_eq!(calls.len(), index + 2, "call {}", index);
            assert_eq!(calls[..=index], expected_setup()[..=index]);
            assert_eq!(calls.last(), Some(&UsbCall::Close));
            assert_eq!(log.count(|c| *c == UsbCall::Close), 1);
        }
    }

    #[test]
    fn test_setup_failure_reports_step() {
        let cases = [
            (0, SetupStep::Reset),
            (1, SetupStep::AutoDetach),
            (2, SetupStep::Configuration(1)),
            (3, SetupStep::ClaimInterface(0)),
            (4, SetupStep::ClaimInterface(1)),
            (5, SetupStep::SetupControl),
            (6, SetupStep::Command(protocol::Command::ReadTemperature)),
            (
                7,
                SetupStep::DrainRead {
                    command: protocol::Command::ReadTemperature,
                    read: 1,
                },
            ),
            (8, SetupStep::Command(protocol::Command::Init1)),
            (10, SetupStep::Command(protocol::Command::Init2)),
            (
                12,
                SetupStep::DrainRead {
                    command: protocol::Command::Init2,
                    read: 2,
                },
            ),
        ];

        for (index, expected) in cases {
            let device = MockDevice::new().fail_call(index, rusb::Error::Timeout);
            match Session::initialize(device, config()) {
                Err(Error::Setup { step, .. }) => assert_eq!(step, expected, "call {}", index),
                Err(e) => panic!("unexpected error for call {}: {}", index, e),
                Ok(_) => panic!("setup should fail at call {}", index),
            }
        }
    }

    #[test]
    fn test_failure_through_open_releases_once() {
        let bus = MockBus::new().with_device(MockDevice::new().fail_call(9, rusb::Error::Timeout));
        let result = Session::open(&bus, config());

        assert!(result.is_err());
        assert_eq!(bus.log().count(|c| *c == UsbCall::Close), 1);
    }
}

mod steady_state {
    use super::*;

    fn ready(device: MockDevice) -> (Session<MockDevice>, temper::test_utils::CallLog) {
        let log = device.log();
        let session = Session::initialize(device, config()).unwrap();
        log.clear();
        (session, log)
    }

    #[test]
    fn test_documented_readings() {
        let device = MockDevice::new()
            .with_response(&[0; 8])
            // Handshake drains four responses
            .queue_response(&[0; 8])
            .queue_response(&[0; 8])
            .queue_response(&[0; 8])
            .queue_response(&[0; 8])
            .queue_response(&[0xaa, 0xbb, 0x16, 0x80, 0x01, 0x02, 0x03, 0x04])
            .queue_response(&[0xff, 0xff, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff])
            .queue_response(&[0x00, 0x00, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);
        let (mut session, _log) = ready(device);

        assert_eq!(session.get_temperature().unwrap(), 22.5);
        assert_eq!(session.get_temperature().unwrap(), 0.0);
        assert_eq!(session.get_temperature().unwrap(), 255.99609375);
    }

    #[test]
    fn test_each_read_is_one_control_and_one_interrupt() {
        let (mut session, log) =
            ready(MockDevice::new().with_response(&[0, 0, 0x17, 0x00, 0, 0, 0, 0]));

        for _ in 0..3 {
            assert_eq!(session.get_temperature().unwrap(), 23.0);
        }

        let one_read = vec![command(TEMPERATURE_COMMAND), read()];
        let expected: Vec<UsbCall> = one_read.iter().cloned().cycle().take(6).collect();
        assert_eq!(log.calls(), expected);
    }

    #[test]
    fn test_short_response_is_protocol_error() {
        let (mut session, log) = ready(MockDevice::new().with_response(&[0, 0, 0x16]));

        let err = session.get_temperature().unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(protocol::ProtocolError::UnexpectedLength {
                expected: 8,
                actual: 3
            })
        ));
        assert_eq!(log.len(), 2);
        // The session stays usable
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_transfer_errors_are_surfaced() {
        let device = MockDevice::new()
            .fail_call(SETUP_CALL_COUNT, rusb::Error::Timeout)
            .fail_call(SETUP_CALL_COUNT + 2, rusb::Error::NoDevice);
        let (mut session, log) = ready(device);

        let err = session.get_temperature().unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer {
                operation: TransferOp::Control(protocol::Command::ReadTemperature),
                source: rusb::Error::Timeout
            }
        ));
        assert!(err.is_timeout());
        // No interrupt read after a failed control transfer, no retry
        assert_eq!(log.len(), 1);

        let err = session.get_temperature().unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer {
                operation: TransferOp::InterruptRead,
                source: rusb::Error::NoDevice
            }
        ));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_drop_releases_device() {
        let (session, log) = ready(MockDevice::new());
        drop(session);
        assert_eq!(log.calls(), vec![UsbCall::Close]);
    }
}

use pretty_assertions::assert_eq;
use std::time::Duration;
use ucam_core::config::SessionConfig;
use ucam_core::protocol::mock::{LinkEvent, MockConnector, MockLink, MockSleeper};
use ucam_core::protocol::{
    Brightness, Contrast, ErrorKind, Exposure, ImageFormat, JpegResolution, ProtocolError,
    RawResolution, Session, SessionState,
};

const SYNC_ACK: [u8; 6] = [0xAA, 0x0E, 0x0D, 0x00, 0x00, 0x00];
const SYNC: [u8; 6] = [0xAA, 0x0D, 0x00, 0x00, 0x00, 0x00];

fn session(link: &MockLink) -> Session<MockConnector, MockSleeper> {
    Session::new(SessionConfig::new("/dev/ttyUSB0"), link.connector(), link.sleeper())
}

fn connected(link: &MockLink) -> Session<MockConnector, MockSleeper> {
    let mut session = session(link);
    link.push_ack(0x0D, &[]);
    session.connect().unwrap();
    link.clear_events();
    session
}

#[test]
fn test_connect_ack_on_third_sync() {
    let link = MockLink::new();
    link.push_silence(2).push_ack(0x0D, &SYNC);
    let mut session = session(&link);

    session.connect().unwrap();

    assert_eq!(session.state(), SessionState::Connected);
    let events = link.events();
    assert_eq!(
        events,
        vec![
            LinkEvent::Open(SessionConfig::new("/dev/ttyUSB0").port_settings()),
            LinkEvent::Write(SYNC.to_vec()),
            LinkEvent::Sleep(Duration::from_millis(5)),
            LinkEvent::Write(SYNC.to_vec()),
            LinkEvent::Sleep(Duration::from_millis(6)),
            LinkEvent::Write(SYNC.to_vec()),
            LinkEvent::Write(SYNC_ACK.to_vec()),
            LinkEvent::Flush,
            LinkEvent::Sleep(Duration::from_secs(2)),
        ]
    );
}

#[test]
fn test_connect_failure_reports_sync() {
    let mut config = SessionConfig::new("/dev/ttyUSB0");
    config.max_attempts = 5;
    let link = MockLink::new();
    let mut session = Session::new(config, link.connector(), link.sleeper());

    let err = session.connect().unwrap_err();
    assert!(matches!(err, ProtocolError::SyncFailed { attempts: 5 }));
    assert_eq!(err.kind(), ErrorKind::ProtocolTimeout);
    assert!(!link.writes().contains(&SYNC_ACK.to_vec()));
}

#[test]
fn test_connect_open_failure() {
    let link = MockLink::new();
    link.fail_next_open();
    let mut session = session(&link);

    let err = session.connect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_unsupported_baud_rate_does_no_io() {
    let link = MockLink::new();
    let mut session = connected(&link);

    for rate in [0, 300, 14400, 115201, 4_000_000] {
        let err = session.set_baud_rate(rate).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBaudRate(r) if r == rate));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert!(link.events().is_empty());
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_baud_change_reopens_link() {
    let link = MockLink::new();
    let mut session = connected(&link);
    link.push_ack(0x07, &[]);

    session.set_baud_rate(57600).unwrap();

    let mut reopened = SessionConfig::new("/dev/ttyUSB0").port_settings();
    reopened.baud_rate = 57600;
    assert_eq!(
        link.events(),
        vec![
            LinkEvent::Write(vec![0xAA, 0x07, 31, 1, 0x00, 0x00]),
            LinkEvent::Flush,
            LinkEvent::Close,
            LinkEvent::Open(reopened),
            LinkEvent::Sleep(Duration::from_millis(500)),
        ]
    );
    assert_eq!(session.baud_rate(), 57600);
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(link.max_live_handles(), 1);
}

#[test]
fn test_commands_use_new_link_after_baud_change() {
    let link = MockLink::new();
    let mut session = connected(&link);
    link.push_ack(0x07, &[]).push_ack(0x15, &[]);

    session.set_baud_rate(921600).unwrap();
    session.set_sleep_timeout(30).unwrap();

    assert_eq!(link.opens().last().map(|s| s.baud_rate), Some(921600));
    assert_eq!(
        link.writes().last(),
        Some(&vec![0xAA, 0x15, 30, 0x00, 0x00, 0x00])
    );
}

#[test]
fn test_disable_sleep_matches_zero_timeout() {
    let link = MockLink::new();
    let mut session = connected(&link);
    link.push_ack(0x15, &[]).push_ack(0x15, &[]);

    session.disable_sleep_timeout().unwrap();
    session.set_sleep_timeout(0).unwrap();

    let writes = link.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], writes[1]);
    assert_eq!(writes[0], vec![0xAA, 0x15, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn test_capture_settings_frames() {
    let link = MockLink::new();
    let mut session = connected(&link);
    link.push_ack(0x01, &[]).push_ack(0x14, &[]).push_ack(0x13, &[]);

    session
        .set_image_format(
            ImageFormat::Jpeg,
            RawResolution::R160x120,
            JpegResolution::R320x240,
        )
        .unwrap();
    session
        .set_exposure(Contrast::High, Brightness::Low, Exposure::MinusOne)
        .unwrap();
    session.set_light_frequency(50).unwrap();

    assert_eq!(
        link.writes(),
        vec![
            vec![0xAA, 0x01, 0x00, 0x07, 0x03, 0x05],
            vec![0xAA, 0x14, 0x03, 0x01, 0x01, 0x00],
            vec![0xAA, 0x13, 0x00, 0x00, 0x00, 0x00],
        ]
    );
}

#[test]
fn test_backoff_is_per_session() {
    let mut config = SessionConfig::new("/dev/ttyUSB0");
    config.max_attempts = 3;
    let first_link = MockLink::new();
    let mut first = Session::new(config, first_link.connector(), first_link.sleeper());
    first_link.push_ack(0x0D, &[]);
    first.connect().unwrap();
    let second_link = MockLink::new();
    let mut second = connected(&second_link);

    // First session grows its backoff without ever seeing an ACK
    assert!(first.set_sleep_timeout(1).is_err());
    assert!(first.set_sleep_timeout(1).is_err());

    second_link.push_silence(1).push_ack(0x15, &[]);
    second.set_sleep_timeout(1).unwrap();
    assert_eq!(second_link.sleeps(), vec![Duration::from_millis(5)]);
}

#[test]
fn test_session_drop_closes_link() {
    let link = MockLink::new();
    {
        let _session = connected(&link);
    }
    assert_eq!(link.events(), vec![LinkEvent::Flush, LinkEvent::Close]);
}

//! Session management
//!
//! Handles the session lifecycle: opening the link, the SYNC handshake,
//! camera configuration and baud-rate renegotiation.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    capture,
    channel::CommandChannel,
    commands::{baud_divisors, CommandFrame},
    response::Ack,
    transport::{Connector, SerialConnector, Sleeper, ThreadSleeper, Transport},
    Brightness, Contrast, Exposure, ImageFormat, JpegResolution, PictureKind, ProtocolError,
    RawResolution, ResetKind, SnapshotKind,
};
use crate::config::SessionConfig;

/// Smallest package size the camera accepts
pub const MIN_PACKAGE_SIZE: u16 = 64;

/// Largest package size the camera accepts
pub const MAX_PACKAGE_SIZE: u16 = 512;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No link open
    Disconnected,
    /// Link open, SYNC not yet acknowledged
    Connecting,
    /// Synchronized and ready for commands
    Connected,
    /// Old link closed, new one not yet open
    Reconfiguring,
}

/// A camera session
///
/// Owns the link exclusively. Commands other than SYNC are only sent in the
/// [`SessionState::Connected`] state.
pub struct Session<C: Connector, S: Sleeper = ThreadSleeper> {
    connector: C,
    transport: Option<C::Transport>,
    state: SessionState,
    config: SessionConfig,
    baud_rate: u32,
    package_size: Option<u16>,
    channel: CommandChannel<S>,
}

impl Session<SerialConnector, ThreadSleeper> {
    /// Session over a real serial port
    pub fn open_serial(config: SessionConfig) -> Self {
        Self::new(config, SerialConnector, ThreadSleeper)
    }
}

impl<C: Connector, S: Sleeper> Session<C, S> {
    /// Create a new session (link not yet opened)
    pub fn new(config: SessionConfig, connector: C, sleeper: S) -> Self {
        let mut channel = CommandChannel::new(sleeper, config.backoff(), config.max_attempts);
        channel.set_logging(config.logging);
        Self {
            connector,
            transport: None,
            state: SessionState::Disconnected,
            baud_rate: config.baud_rate,
            config,
            package_size: None,
            channel,
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Baud rate of the current link
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Package size acknowledged by the camera, if any
    pub fn package_size(&self) -> Option<u16> {
        self.package_size
    }

    /// Settings the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Enable/disable frame-level logging
    pub fn set_logging(&mut self, enable: bool) {
        self.channel.set_logging(enable);
    }

    /// Whether frame-level logging is on
    pub fn logging(&self) -> bool {
        self.channel.logging()
    }

    /// Send a command on a synchronized link
    fn command(&mut self, frame: CommandFrame) -> Result<Ack, ProtocolError> {
        if self.state != SessionState::Connected {
            return Err(ProtocolError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;
        self.channel.send(transport, &frame)
    }

    /// Synchronize with the camera
    ///
    /// Opens the link if needed, repeats SYNC until the camera ACKs, answers
    /// with the host ACK and then waits for the camera to warm up. Commands
    /// sent before that wait is over are unreliable.
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.transport.is_none() {
            let settings = self.config.port_settings().with_baud_rate(self.baud_rate);
            if self.channel.logging() {
                info!("Opening {} at {} baud", settings.port_name, settings.baud_rate);
            }
            self.transport = Some(self.connector.open(&settings)?);
        }
        self.state = SessionState::Connecting;
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;

        match self.channel.send(transport, &CommandFrame::sync()) {
            Ok(_) => {}
            Err(ProtocolError::CommandFailed { attempts, .. }) => {
                return Err(ProtocolError::SyncFailed { attempts })
            }
            Err(e) => return Err(e),
        }

        transport.write_all(CommandFrame::sync_ack().as_bytes())?;
        transport.flush()?;
        self.state = SessionState::Connected;
        if self.channel.logging() {
            info!(
                "Established connection with camera after {} attempts",
                self.channel.last_attempts()
            );
        }

        self.channel.pause(self.config.sync_settle());
        Ok(())
    }

    /// Close the link
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.flush() {
                warn!("Flush before close failed: {}", e);
            }
            if let Err(e) = transport.close() {
                warn!("Close failed: {}", e);
            }
        }
        self.package_size = None;
        self.state = SessionState::Disconnected;
    }

    /// INITIAL: colour format and resolutions
    pub fn set_image_format(
        &mut self,
        format: ImageFormat,
        raw_resolution: RawResolution,
        jpeg_resolution: JpegResolution,
    ) -> Result<(), ProtocolError> {
        self.command(CommandFrame::initial(format, raw_resolution, jpeg_resolution))?;
        if self.logging() {
            info!("Image format and resolution set");
        }
        Ok(())
    }

    /// CONTRAST/BRIGHTNESS/EXPOSURE
    pub fn set_exposure(
        &mut self,
        contrast: Contrast,
        brightness: Brightness,
        exposure: Exposure,
    ) -> Result<(), ProtocolError> {
        self.command(CommandFrame::contrast_brightness_exposure(
            contrast, brightness, exposure,
        ))?;
        if self.logging() {
            info!("Exposure set");
        }
        Ok(())
    }

    /// LIGHT: mains frequency for flicker compensation, 50 or 60 Hz
    pub fn set_light_frequency(&mut self, hz: u8) -> Result<(), ProtocolError> {
        let setting = match hz {
            50 => 0,
            60 => 1,
            _ => return Err(ProtocolError::InvalidFrequency(hz)),
        };
        self.command(CommandFrame::light(setting))?;
        if self.logging() {
            info!("Light frequency set to {} Hz", hz);
        }
        Ok(())
    }

    /// SLEEP: seconds of inactivity before the camera sleeps (default 15)
    pub fn set_sleep_timeout(&mut self, seconds: u8) -> Result<(), ProtocolError> {
        self.command(CommandFrame::sleep(seconds))?;
        if self.logging() {
            info!("Sleep timeout set to {} s", seconds);
        }
        Ok(())
    }

    /// Keep the camera awake; same frame as `set_sleep_timeout(0)`
    pub fn disable_sleep_timeout(&mut self) -> Result<(), ProtocolError> {
        self.set_sleep_timeout(0)
    }

    /// SET PACKAGE SIZE: bytes per image frame, 64 to 512
    pub fn set_package_size(&mut self, size: u16) -> Result<(), ProtocolError> {
        if !(MIN_PACKAGE_SIZE..=MAX_PACKAGE_SIZE).contains(&size) {
            return Err(ProtocolError::InvalidPackageSize(size));
        }
        self.command(CommandFrame::set_package_size(size))?;
        self.package_size = Some(size);
        if self.logging() {
            info!("Package size set to {}", size);
        }
        Ok(())
    }

    /// SET BAUD RATE, then reopen the link at the new rate
    ///
    /// If the camera NAKs or stays silent the current link is kept.
    /// In case of NAK/Command ID errors, try a lower baud rate.
    pub fn set_baud_rate(&mut self, rate: u32) -> Result<(), ProtocolError> {
        let (first, second) = baud_divisors(rate).ok_or(ProtocolError::InvalidBaudRate(rate))?;
        self.command(CommandFrame::set_baud_rate(first, second))?;
        self.reopen(rate)
    }

    /// Connected → Reconfiguring → Connected
    fn reopen(&mut self, rate: u32) -> Result<(), ProtocolError> {
        self.state = SessionState::Reconfiguring;
        let mut old = self.transport.take().ok_or(ProtocolError::NotConnected)?;
        if let Err(e) = old.flush() {
            warn!("Flush before baud change failed: {}", e);
        }
        if let Err(e) = old.close() {
            self.state = SessionState::Disconnected;
            return Err(e.into());
        }

        let settings = self.config.port_settings().with_baud_rate(rate);
        match self.connector.open(&settings) {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e);
            }
        }
        self.baud_rate = rate;
        self.state = SessionState::Connected;
        if self.logging() {
            info!("Baud rate changed to {}", rate);
        }

        self.channel.pause(self.config.baud_settle());
        Ok(())
    }

    /// RESET. A system reset drops the camera back to its unsynchronized state.
    pub fn reset(&mut self, kind: ResetKind) -> Result<(), ProtocolError> {
        self.command(CommandFrame::reset(kind))?;
        if kind == ResetKind::System {
            self.package_size = None;
            self.state = SessionState::Connecting;
        }
        if self.logging() {
            info!("Camera reset ({:?})", kind);
        }
        Ok(())
    }

    /// SNAPSHOT: hold a picture in the camera buffer
    pub fn snapshot(&mut self, kind: SnapshotKind) -> Result<(), ProtocolError> {
        if self.state != SessionState::Connected {
            return Err(ProtocolError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;
        capture::snapshot(&mut self.channel, transport, kind, self.config.shutter_delay())
    }

    /// GET PICTURE: download a picture
    ///
    /// Requires a package size to have been set.
    pub fn get_picture(&mut self, kind: PictureKind) -> Result<Vec<u8>, ProtocolError> {
        let package_size = self.package_size.ok_or(ProtocolError::PackageSizeNotSet)?;
        if self.state != SessionState::Connected {
            return Err(ProtocolError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;
        capture::get_picture(&mut self.channel, transport, kind, package_size)
    }
}

impl<C: Connector, S: Sleeper> Drop for Session<C, S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::{LinkEvent, MockConnector, MockLink, MockSleeper};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn connected(link: &MockLink) -> Session<MockConnector, MockSleeper> {
        let mut session =
            Session::new(SessionConfig::new("mock"), link.connector(), link.sleeper());
        link.push_ack(0x0D, &[]);
        session.connect().unwrap();
        link.clear_events();
        session
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let link = MockLink::new();
        let session = Session::new(SessionConfig::new("mock"), link.connector(), link.sleeper());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.package_size(), None);
        assert_eq!(session.baud_rate(), 115200);
    }

    #[test]
    fn test_commands_require_connection() {
        let link = MockLink::new();
        let mut session =
            Session::new(SessionConfig::new("mock"), link.connector(), link.sleeper());
        assert!(matches!(
            session.set_sleep_timeout(10),
            Err(ProtocolError::NotConnected)
        ));
        assert!(link.events().is_empty());
    }

    #[test]
    fn test_light_frequency_domain() {
        let link = MockLink::new();
        let mut session = connected(&link);
        assert!(matches!(
            session.set_light_frequency(55),
            Err(ProtocolError::InvalidFrequency(55))
        ));
        assert!(link.writes().is_empty());

        link.push_ack(0x13, &[]);
        session.set_light_frequency(60).unwrap();
        assert_eq!(link.writes(), vec![vec![0xAA, 0x13, 0x01, 0x00, 0x00, 0x00]]);
    }

    #[test]
    fn test_package_size_domain_and_recording() {
        let link = MockLink::new();
        let mut session = connected(&link);
        assert!(matches!(
            session.set_package_size(1024),
            Err(ProtocolError::InvalidPackageSize(1024))
        ));
        assert_eq!(session.package_size(), None);

        link.push_ack(0x06, &[]);
        session.set_package_size(256).unwrap();
        assert_eq!(session.package_size(), Some(256));
        assert_eq!(link.writes(), vec![vec![0xAA, 0x06, 0x08, 0x00, 0x01, 0x00]]);
    }

    #[test]
    fn test_failed_baud_change_keeps_link() {
        let mut config = SessionConfig::new("mock");
        config.max_attempts = 2;
        let link = MockLink::new();
        let mut session = Session::new(config, link.connector(), link.sleeper());
        link.push_ack(0x0D, &[]);
        session.connect().unwrap();
        link.clear_events();

        assert!(session.set_baud_rate(921600).is_err());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.baud_rate(), 115200);
        assert!(!link.events().contains(&LinkEvent::Close));
    }

    #[test]
    fn test_reopen_failure_leaves_session_disconnected() {
        let link = MockLink::new();
        let mut session = connected(&link);
        link.push_ack(0x07, &[]);
        link.fail_next_open();

        assert!(matches!(
            session.set_baud_rate(230400),
            Err(ProtocolError::SerialError(_))
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_system_reset_requires_resync() {
        let link = MockLink::new();
        let mut session = connected(&link);
        link.push_ack(0x06, &[]).push_ack(0x08, &[]);
        session.set_package_size(512).unwrap();
        session.reset(ResetKind::System).unwrap();

        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.package_size(), None);
        assert!(matches!(
            session.snapshot(SnapshotKind::Jpeg),
            Err(ProtocolError::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_closes_link() {
        let link = MockLink::new();
        let mut session = connected(&link);
        session.disconnect();

        assert_eq!(link.events(), vec![LinkEvent::Flush, LinkEvent::Close]);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_sync_failure() {
        let mut config = SessionConfig::new("mock");
        config.max_attempts = 4;
        let link = MockLink::new();
        let mut session = Session::new(config, link.connector(), link.sleeper());

        assert!(matches!(
            session.connect(),
            Err(ProtocolError::SyncFailed { attempts: 4 })
        ));
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(link.sleeps().len(), 3);
        assert!(!link.sleeps().contains(&Duration::from_secs(2)));
    }
}

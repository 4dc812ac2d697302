//! Serial Protocol Communication
//!
//! Implements the uCAM-III command/response protocol.
//!
//! Every host command is a fixed 6-byte frame starting with `0xAA`. The camera
//! answers with ACK (`AA 0E`) or NAK (`AA 0F`) frames, or stays silent while it
//! sleeps. Image data is downloaded as a sequence of id/size prefixed frames.

pub mod capture;
pub mod catalog;
pub mod channel;
pub mod commands;
mod error;
pub mod mock;
pub mod response;
mod session;
pub mod transport;

pub use capture::{FrameHeader, ImageTransfer};
pub use channel::{Backoff, CommandChannel};
pub use commands::{
    Brightness, Command, CommandFrame, Contrast, Exposure, ImageFormat, JpegResolution,
    PictureKind, RawResolution, ResetKind, SnapshotKind,
};
pub use error::{ErrorKind, ProtocolError};
pub use response::{Ack, Response};
pub use session::{Session, SessionState, MAX_PACKAGE_SIZE, MIN_PACKAGE_SIZE};
pub use transport::{
    Connector, PortSettings, SerialConnector, SerialTransport, Sleeper, ThreadSleeper, Transport,
};

/// Sync byte that opens every command and response frame
pub const SYNC_BYTE: u8 = 0xAA;

/// Length of every command and acknowledgment frame
pub const FRAME_LEN: usize = 6;

/// Default baud rate for camera communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default per-read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Maximum attempts for any retried command
pub const MAX_ATTEMPTS: u32 = 60;

/// Backoff after the first failed attempt, in milliseconds
pub const BACKOFF_BASE_MS: u64 = 5;

/// Backoff growth per failed attempt, in milliseconds
pub const BACKOFF_STEP_MS: u64 = 1;

/// Wait after a successful SYNC before the first command ("first photo delay")
pub const SYNC_SETTLE_MS: u64 = 2000;

/// Wait after reopening the port at a new baud rate
pub const BAUD_SETTLE_MS: u64 = 500;

/// Wait after SNAPSHOT before the picture can be fetched
pub const SHUTTER_DELAY_MS: u64 = 200;

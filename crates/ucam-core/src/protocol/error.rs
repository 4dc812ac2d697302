//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Command issued outside the connected state
    #[error("Not connected to camera")]
    NotConnected,

    /// Retry ceiling reached without an ACK
    #[error("No camera response. Command {command:#04x} failed ({name}) after {attempts} attempts")]
    CommandFailed {
        /// Command id
        command: u8,
        /// Command name, for diagnostics
        name: String,
        /// Attempts made
        attempts: u32,
        /// Error code of the last NAK seen, if the camera answered at all
        last_nak: Option<u8>,
    },

    /// SYNC handshake never acknowledged
    #[error("Camera did not acknowledge SYNC after {attempts} attempts")]
    SyncFailed {
        /// SYNC frames sent
        attempts: u32,
    },

    /// Rate missing from the divisor table
    #[error(
        "Invalid baud rate ({0}). Valid baud rates are: 2400, 4800, 9600, 19200, 38400, 57600, \
         115200, 153600, 230400, 460800, 921600, 1228800, 1843200, 3686400"
    )]
    InvalidBaudRate(u32),

    /// Mains frequency other than 50 or 60 Hz
    #[error("Invalid light frequency ({0} Hz). Valid frequencies are 50 and 60")]
    InvalidFrequency(u8),

    /// Package size outside 64..=512
    #[error("Invalid package size ({0}). Valid sizes are 64 to 512 bytes")]
    InvalidPackageSize(u16),

    /// Picture requested before SET PACKAGE SIZE
    #[error("Package size must be set before downloading a picture")]
    PackageSizeNotSet,

    /// Reply of an unexpected shape after an ACK
    #[error("Invalid response from camera: {0}")]
    InvalidResponse(String),

    /// Picture download aborted
    #[error("Image transfer failed after {received} of {expected} bytes: {reason}")]
    Transfer {
        /// Payload bytes received before the failure
        received: usize,
        /// Announced image size, or the buffer bound when none was announced
        expected: usize,
        /// What went wrong
        reason: String,
    },

    /// Frame would write past the image buffer
    #[error("Frame {frame_id} overflows image buffer: {cursor} + {frame_size} > {capacity}")]
    ImageOverflow {
        /// Offending frame id
        frame_id: u16,
        /// Write position in the image
        cursor: usize,
        /// Payload size of the frame
        frame_size: usize,
        /// Image buffer capacity
        capacity: usize,
    },

    /// Transport read or write failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Broad failure classes, used by callers to decide between retrying and aborting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport open/read/write failure
    Connection,
    /// Retry ceiling exhausted without an ACK
    ProtocolTimeout,
    /// Caller value outside an accepted domain, rejected before any I/O
    InvalidArgument,
    /// Camera replied with something the protocol does not allow
    Device,
    /// Failure in the middle of a bulk image transfer
    Transfer,
}

impl ProtocolError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::SerialError(_)
            | ProtocolError::NotConnected
            | ProtocolError::IoError(_) => ErrorKind::Connection,
            ProtocolError::CommandFailed { .. } | ProtocolError::SyncFailed { .. } => {
                ErrorKind::ProtocolTimeout
            }
            ProtocolError::InvalidBaudRate(_)
            | ProtocolError::InvalidFrequency(_)
            | ProtocolError::InvalidPackageSize(_)
            | ProtocolError::PackageSizeNotSet => ErrorKind::InvalidArgument,
            ProtocolError::InvalidResponse(_) => ErrorKind::Device,
            ProtocolError::Transfer { .. } | ProtocolError::ImageOverflow { .. } => {
                ErrorKind::Transfer
            }
        }
    }

    /// Whether repeating the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ProtocolTimeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ProtocolError::InvalidBaudRate(1).kind(), ErrorKind::InvalidArgument);
        assert_eq!(ProtocolError::PackageSizeNotSet.kind(), ErrorKind::InvalidArgument);
        assert_eq!(ProtocolError::SyncFailed { attempts: 60 }.kind(), ErrorKind::ProtocolTimeout);
        assert_eq!(ProtocolError::NotConnected.kind(), ErrorKind::Connection);
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(ProtocolError::from(io).kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        let failed = ProtocolError::CommandFailed {
            command: 0x04,
            name: "GET PICTURE".to_string(),
            attempts: 60,
            last_nak: None,
        };
        assert!(failed.is_retryable());
        let transfer = ProtocolError::Transfer {
            received: 10,
            expected: 20,
            reason: "stream ended".to_string(),
        };
        assert!(!transfer.is_retryable());
    }

    #[test]
    fn test_command_failed_display_names_command() {
        let err = ProtocolError::CommandFailed {
            command: 0x05,
            name: "SNAPSHOT".to_string(),
            attempts: 60,
            last_nak: Some(0x0F),
        };
        let text = err.to_string();
        assert!(text.contains("0x05"));
        assert!(text.contains("SNAPSHOT"));
    }
}

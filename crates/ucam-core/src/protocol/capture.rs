//! Snapshot and picture download
//!
//! After GET PICTURE is acknowledged the camera announces the image size in a
//! DATA frame and then streams the image in frames, one per host ACK:
//!
//! - 2 bytes: Frame id (little-endian)
//! - 2 bytes: Payload size (little-endian)
//! - N bytes: Payload, at most the negotiated package size
//!
//! Some firmware appends a 2-byte verify code (low byte of the sum of all
//! preceding frame bytes). It is checked when it arrives together with the
//! frame and is never waited for.
//!
//! The download bypasses [`CommandChannel`] classification because these
//! frames do not start with the sync byte, and it is never retried: once frame
//! ids and the write cursor disagree with the camera there is nothing to resume.

use byteorder::{ByteOrder, LittleEndian};
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    channel::CommandChannel,
    response::Ack,
    transport::{Sleeper, Transport},
    CommandFrame, PictureKind, ProtocolError, SnapshotKind, FRAME_LEN,
};

/// Frame id + payload size
pub const FRAME_HEADER_LEN: usize = 4;

/// Optional verify code trailing a frame
pub const FRAME_VERIFY_LEN: usize = 2;

/// Largest image accepted when the camera does not announce a size
pub const MAX_IMAGE_LEN: usize = u16::MAX as usize;

/// Parsed image frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame id, echoed in the ACK requesting the next frame
    pub id: u16,
    /// Payload bytes following the header
    pub size: u16,
}

impl FrameHeader {
    /// Parse the first four bytes of a frame
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FRAME_HEADER_LEN {
            return None;
        }
        Some(Self {
            id: LittleEndian::read_u16(&bytes[0..2]),
            size: LittleEndian::read_u16(&bytes[2..4]),
        })
    }
}

/// Low byte of the sum of id, size and payload bytes
pub fn verify_code(frame_without_trailer: &[u8]) -> u8 {
    frame_without_trailer
        .iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Reassembly state for one picture download
#[derive(Debug)]
pub struct ImageTransfer {
    image: Vec<u8>,
    capacity: usize,
    announced: bool,
    package_size: usize,
    scratch: Vec<u8>,
    frames: u32,
}

impl ImageTransfer {
    /// Buffer for `total` announced image bytes, in frames of at most `package_size` payload bytes
    pub fn new(total: usize, package_size: u16) -> Self {
        Self::with_capacity(total, true, package_size)
    }

    /// Buffer for an image of unknown size, ended by the camera going quiet
    pub fn open_ended(package_size: u16) -> Self {
        Self::with_capacity(MAX_IMAGE_LEN, false, package_size)
    }

    fn with_capacity(capacity: usize, announced: bool, package_size: u16) -> Self {
        let package_size = package_size as usize;
        Self {
            image: Vec::with_capacity(if announced { capacity } else { 0 }),
            capacity,
            announced,
            package_size,
            scratch: vec![0; FRAME_HEADER_LEN + package_size + FRAME_VERIFY_LEN],
            frames: 0,
        }
    }

    /// Announced image size, if the camera sent one
    pub fn total(&self) -> Option<usize> {
        self.announced.then_some(self.capacity)
    }

    /// Upper bound on the image size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Payload bytes copied so far
    pub fn received(&self) -> usize {
        self.image.len()
    }

    /// Frames received so far
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Whether the announced size has been reached
    pub fn is_complete(&self) -> bool {
        self.announced && self.image.len() == self.capacity
    }

    /// Largest payload a single frame may carry
    pub fn max_payload(&self) -> usize {
        self.package_size
    }

    fn failure(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::Transfer {
            received: self.image.len(),
            expected: self.capacity,
            reason: reason.into(),
        }
    }

    fn io_failure(&self, err: io::Error) -> ProtocolError {
        self.failure(format!("I/O error: {}", err))
    }

    /// Read until `filled` reaches `target`
    fn fill<T: Transport>(
        &mut self,
        transport: &mut T,
        filled: &mut usize,
        target: usize,
    ) -> Result<(), ProtocolError> {
        while *filled < target {
            let n = match transport.read(&mut self.scratch[*filled..]) {
                Ok(n) => n,
                Err(e) => return Err(self.io_failure(e)),
            };
            if n == 0 {
                return Err(self.failure(format!(
                    "stream ended after {} of {} frame bytes",
                    filled, target
                )));
            }
            *filled += n;
        }
        Ok(())
    }

    /// Receive one frame and append its payload to the image
    ///
    /// Returns `None` when an open-ended transfer meets silence where the next
    /// frame would start.
    pub fn receive_frame<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<Option<FrameHeader>, ProtocolError> {
        let mut filled = 0;
        if !self.announced {
            filled = transport
                .read(&mut self.scratch)
                .map_err(|e| self.io_failure(e))?;
            if filled == 0 {
                return Ok(None);
            }
        }
        // A single read may deliver less than a header
        self.fill(transport, &mut filled, FRAME_HEADER_LEN)?;
        let header = FrameHeader::parse(&self.scratch[..FRAME_HEADER_LEN])
            .ok_or_else(|| self.failure("short frame header"))?;

        let size = header.size as usize;
        if size > self.max_payload() {
            return Err(self.failure(format!(
                "frame {} announces {} bytes, package allows {}",
                header.id,
                size,
                self.max_payload()
            )));
        }
        if self.image.len() + size > self.capacity {
            return Err(ProtocolError::ImageOverflow {
                frame_id: header.id,
                cursor: self.image.len(),
                frame_size: size,
                capacity: self.capacity,
            });
        }

        let payload_end = FRAME_HEADER_LEN + size;
        self.fill(transport, &mut filled, payload_end)?;
        self.check_trailer(header.id, payload_end, filled);

        self.image
            .extend_from_slice(&self.scratch[FRAME_HEADER_LEN..payload_end]);
        self.frames += 1;
        Ok(Some(header))
    }

    /// Check a verify code that arrived with the frame
    fn check_trailer(&self, frame_id: u16, payload_end: usize, filled: usize) {
        let frame_len = payload_end + FRAME_VERIFY_LEN;
        if filled < frame_len {
            return;
        }
        if filled > frame_len {
            warn!(
                "Frame {}: {} unexpected bytes after verify code",
                frame_id,
                filled - frame_len
            );
        }
        let expected = verify_code(&self.scratch[..payload_end]);
        let actual = self.scratch[payload_end];
        if expected != actual {
            warn!(
                "Frame {}: verify code mismatch (expected 0x{:02X}, got 0x{:02X})",
                frame_id, expected, actual
            );
        }
    }

    /// Finished image
    pub fn into_image(self) -> Vec<u8> {
        self.image
    }
}

/// Hold a picture in the camera buffer, then wait out the shutter delay
pub fn snapshot<S: Sleeper, T: Transport>(
    channel: &mut CommandChannel<S>,
    transport: &mut T,
    kind: SnapshotKind,
    shutter_delay: Duration,
) -> Result<(), ProtocolError> {
    channel.send(transport, &CommandFrame::snapshot(kind))?;
    if channel.logging() {
        info!("Snapshot held in buffer");
    }
    channel.pause(shutter_delay);
    Ok(())
}

/// Image size from the DATA frame following a GET PICTURE ack
///
/// The DATA frame usually arrives in the same read as the ACK; if not, it is
/// read from the transport here. Silence instead of a DATA frame yields `None`.
fn announced_length<T: Transport>(
    transport: &mut T,
    ack: &mut Ack,
) -> Result<Option<u16>, ProtocolError> {
    let mut buf = [0u8; FRAME_LEN];
    while ack.data_length().is_none() && ack.trailing.len() < FRAME_LEN {
        let wanted = FRAME_LEN - ack.trailing.len();
        let n = transport.read(&mut buf[..wanted])?;
        if n == 0 {
            break;
        }
        ack.extend_trailing(&buf[..n]);
    }
    match ack.data_length() {
        Some(len) => Ok(Some(len)),
        None if ack.trailing.is_empty() => Ok(None),
        None => Err(ProtocolError::InvalidResponse(format!(
            "GET PICTURE ack followed by {:02X?} instead of a DATA frame",
            ack.trailing
        ))),
    }
}

/// Download a picture as a single buffer
///
/// Ends when the payload received equals the size announced by the camera. If
/// no size was announced, frames are collected until the camera goes quiet
/// between frames.
pub fn get_picture<S: Sleeper, T: Transport>(
    channel: &mut CommandChannel<S>,
    transport: &mut T,
    kind: PictureKind,
    package_size: u16,
) -> Result<Vec<u8>, ProtocolError> {
    let logging = channel.logging();
    let mut ack = channel.send(transport, &CommandFrame::get_picture(kind))?;
    let mut transfer = match announced_length(transport, &mut ack)? {
        Some(total) => {
            if logging {
                info!("Image size is: {} bytes", total);
            }
            ImageTransfer::new(total as usize, package_size)
        }
        None => {
            warn!("No image size announced, reading until the camera goes quiet");
            ImageTransfer::open_ended(package_size)
        }
    };
    if transfer.is_complete() {
        return Ok(transfer.into_image());
    }

    transport
        .write_all(CommandFrame::frame_ack(0).as_bytes())
        .map_err(|e| transfer.io_failure(e))?;

    while !transfer.is_complete() {
        let header = match transfer.receive_frame(transport)? {
            Some(header) => header,
            None => break,
        };
        if logging {
            debug!(
                "Frame {}: {} bytes, {} of {}",
                header.id,
                header.size,
                transfer.received(),
                transfer.capacity()
            );
        }
        transport
            .write_all(CommandFrame::frame_ack(header.id).as_bytes())
            .map_err(|e| transfer.io_failure(e))?;
    }

    if logging {
        info!(
            "Received {} bytes in {} frames",
            transfer.received(),
            transfer.frames()
        );
    }
    Ok(transfer.into_image())
}

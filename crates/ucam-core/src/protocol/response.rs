//! Response classification
//!
//! Turns the raw bytes of one read into a typed [`Response`], so call sites
//! never compare byte prefixes themselves.

use byteorder::{ByteOrder, LittleEndian};

use super::{commands::Command, FRAME_LEN, SYNC_BYTE};

/// A decoded ACK frame
///
/// Layout: `AA 0E <acked command> <ack counter> <package id lo> <package id hi>`,
/// optionally followed by more frames delivered in the same read (the DATA
/// frame after a GET PICTURE ack, the camera's own SYNC after a SYNC ack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Command id being acknowledged
    pub command_id: u8,
    /// Camera-side ack counter
    pub counter: u8,
    /// Package id field
    pub package_id: u16,
    /// Bytes received after the 6-byte ACK frame
    pub trailing: Vec<u8>,
}

impl Ack {
    fn decode(bytes: &[u8]) -> Self {
        let byte = |i: usize| bytes.get(i).copied().unwrap_or(0);
        Self {
            command_id: byte(2),
            counter: byte(3),
            package_id: u16::from_le_bytes([byte(4), byte(5)]),
            trailing: bytes.get(FRAME_LEN..).map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }

    /// Image size announced by the DATA frame following this ACK
    ///
    /// DATA layout: `AA 0A <picture type> <len lo> <len hi> <len top>`.
    pub fn data_length(&self) -> Option<u16> {
        data_frame_length(&self.trailing)
    }

    /// Append bytes that arrived in a later read
    pub fn extend_trailing(&mut self, bytes: &[u8]) {
        self.trailing.extend_from_slice(bytes);
    }
}

/// Decode the length carried by a DATA frame
pub fn data_frame_length(frame: &[u8]) -> Option<u16> {
    if frame.len() < FRAME_LEN || frame[0] != SYNC_BYTE || frame[1] != Command::Data.id() {
        return None;
    }
    Some(LittleEndian::read_u16(&frame[3..5]))
}

/// Classified answer to one command attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `AA 0E ...`
    Ack(Ack),
    /// `AA 0F ...` with the device error code at offset 4
    Nak {
        /// Device error code, see [`super::catalog::error_description`]
        error_code: u8,
    },
    /// Nothing arrived within the read timeout
    Timeout,
    /// Bytes that are neither ACK nor NAK
    Malformed {
        /// Raw bytes as read
        bytes: Vec<u8>,
    },
}

impl Response {
    /// Classify the bytes returned by a single read
    pub fn classify(bytes: &[u8]) -> Self {
        match bytes {
            [] => Response::Timeout,
            [SYNC_BYTE, 0x0E, ..] => Response::Ack(Ack::decode(bytes)),
            [SYNC_BYTE, 0x0F, ..] => Response::Nak {
                error_code: bytes.get(4).copied().unwrap_or(0),
            },
            _ => Response::Malformed {
                bytes: bytes.to_vec(),
            },
        }
    }

    /// Whether the camera acknowledged
    pub fn is_ack(&self) -> bool {
        matches!(self, Response::Ack(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_ack() {
        let response = Response::classify(&[0xAA, 0x0E, 0x0D, 0x07, 0x00, 0x00]);
        assert_eq!(
            response,
            Response::Ack(Ack {
                command_id: 0x0D,
                counter: 0x07,
                package_id: 0,
                trailing: Vec::new(),
            })
        );
    }

    #[test]
    fn test_classify_nak_reads_error_code() {
        let response = Response::classify(&[0xAA, 0x0F, 0x00, 0x00, 0x0B, 0x00]);
        assert_eq!(response, Response::Nak { error_code: 0x0B });
    }

    #[test]
    fn test_classify_empty_is_timeout() {
        assert_eq!(Response::classify(&[]), Response::Timeout);
    }

    #[test]
    fn test_classify_garbage_is_malformed() {
        assert_eq!(
            Response::classify(&[0x00, 0x0E]),
            Response::Malformed {
                bytes: vec![0x00, 0x0E]
            }
        );
        assert_eq!(
            Response::classify(&[0xAA]),
            Response::Malformed { bytes: vec![0xAA] }
        );
    }

    #[test]
    fn test_data_length_follows_ack() {
        let response = Response::classify(&[
            0xAA, 0x0E, 0x04, 0x00, 0x00, 0x00, // ACK
            0xAA, 0x0A, 0x01, 0xE8, 0x03, 0x00, // DATA, 1000 bytes
        ]);
        match response {
            Response::Ack(ack) => assert_eq!(ack.data_length(), Some(1000)),
            other => panic!("Expected ACK, got {:?}", other),
        }
    }

    #[test]
    fn test_data_length_missing() {
        let mut ack = match Response::classify(&[0xAA, 0x0E, 0x04, 0x00, 0x00, 0x00]) {
            Response::Ack(ack) => ack,
            other => panic!("Expected ACK, got {:?}", other),
        };
        assert_eq!(ack.data_length(), None);
        ack.extend_trailing(&[0xAA, 0x0A, 0x05, 0x00, 0x02, 0x00]);
        assert_eq!(ack.data_length(), Some(512));
    }
}

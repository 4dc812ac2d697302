//! Protocol commands
//!
//! Defines the uCAM-III command set and builds the 6-byte command frames.
//!
//! Frame layout: `AA <command id> <arg0> <arg1> <arg2> <arg3>`. Unused
//! arguments are zero.

use serde::{Deserialize, Serialize};

use super::{FRAME_LEN, SYNC_BYTE};

/// Command ids understood by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Set image format and resolutions (AA01h)
    Initial,
    /// Request picture data (AA04h)
    GetPicture,
    /// Capture a still into the camera buffer (AA05h)
    Snapshot,
    /// Set bulk transfer package size (AA06h)
    SetPackageSize,
    /// Change the serial baud rate (AA07h)
    SetBaudRate,
    /// Reset the camera (AA08h)
    Reset,
    /// Data length announcement sent by the camera (AA0Ah)
    Data,
    /// Synchronize host and camera (AA0Dh)
    Sync,
    /// Positive acknowledgment (AA0Eh)
    Ack,
    /// Negative acknowledgment (AA0Fh)
    Nak,
    /// Light frequency for flicker compensation (AA13h)
    Light,
    /// Contrast, brightness and exposure (AA14h)
    ContrastBrightnessExposure,
    /// Sleep timeout (AA15h)
    Sleep,
}

impl Command {
    /// Get the command id byte
    pub fn id(&self) -> u8 {
        match self {
            Command::Initial => 0x01,
            Command::GetPicture => 0x04,
            Command::Snapshot => 0x05,
            Command::SetPackageSize => 0x06,
            Command::SetBaudRate => 0x07,
            Command::Reset => 0x08,
            Command::Data => 0x0A,
            Command::Sync => 0x0D,
            Command::Ack => 0x0E,
            Command::Nak => 0x0F,
            Command::Light => 0x13,
            Command::ContrastBrightnessExposure => 0x14,
            Command::Sleep => 0x15,
        }
    }

    /// Look up a command by id byte
    pub fn from_id(id: u8) -> Option<Self> {
        let command = match id {
            0x01 => Command::Initial,
            0x04 => Command::GetPicture,
            0x05 => Command::Snapshot,
            0x06 => Command::SetPackageSize,
            0x07 => Command::SetBaudRate,
            0x08 => Command::Reset,
            0x0A => Command::Data,
            0x0D => Command::Sync,
            0x0E => Command::Ack,
            0x0F => Command::Nak,
            0x13 => Command::Light,
            0x14 => Command::ContrastBrightnessExposure,
            0x15 => Command::Sleep,
            _ => return None,
        };
        Some(command)
    }
}

/// Supported baud rates and their divisor bytes
pub const BAUD_DIVISORS: [(u32, u8, u8); 14] = [
    (2400, 31, 47),
    (4800, 31, 23),
    (9600, 31, 11),
    (19200, 31, 5),
    (38400, 31, 2),
    (57600, 31, 1),
    (115200, 31, 0),
    (153600, 7, 2),
    (230400, 7, 1),
    (460800, 7, 0),
    (921600, 1, 1),
    (1228800, 2, 0),
    (1843200, 1, 0),
    (3686400, 0, 0),
];

/// Divisor bytes for a baud rate, if the camera supports it
pub fn baud_divisors(rate: u32) -> Option<(u8, u8)> {
    BAUD_DIVISORS
        .iter()
        .find(|(r, _, _)| *r == rate)
        .map(|&(_, d1, d2)| (d1, d2))
}

/// Image colour format (INITIAL argument 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// 8-bit grey scale RAW
    Raw8BitGrayScale,
    /// 16-bit colour RAW, CrYCbY
    Raw16BitCrYCbY,
    /// 16-bit colour RAW, RGB565
    Raw16BitRgb,
    /// JPEG
    Jpeg,
}

impl ImageFormat {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            ImageFormat::Raw8BitGrayScale => 0x03,
            ImageFormat::Raw16BitCrYCbY => 0x08,
            ImageFormat::Raw16BitRgb => 0x06,
            ImageFormat::Jpeg => 0x07,
        }
    }
}

/// RAW preview resolution (INITIAL argument 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawResolution {
    /// 80 x 60
    R80x60,
    /// 160 x 120
    R160x120,
    /// 128 x 128
    R128x128,
    /// 128 x 96
    R128x96,
}

impl RawResolution {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            RawResolution::R80x60 => 0x01,
            RawResolution::R160x120 => 0x03,
            RawResolution::R128x128 => 0x09,
            RawResolution::R128x96 => 0x0B,
        }
    }
}

/// JPEG resolution (INITIAL argument 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JpegResolution {
    /// 160 x 128
    R160x128,
    /// 320 x 240
    R320x240,
    /// 640 x 480
    R640x480,
}

impl JpegResolution {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            JpegResolution::R160x128 => 0x03,
            JpegResolution::R320x240 => 0x05,
            JpegResolution::R640x480 => 0x07,
        }
    }
}

/// Five-step level shared by contrast and brightness
macro_rules! level_enum {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            /// Lowest setting
            Min,
            /// One step below normal
            Low,
            /// Camera default
            Normal,
            /// One step above normal
            High,
            /// Highest setting
            Max,
        }

        impl $name {
            /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
                match self {
                    $name::Min => 0x00,
                    $name::Low => 0x01,
                    $name::Normal => 0x02,
                    $name::High => 0x03,
                    $name::Max => 0x04,
                }
            }
        }
    };
}

level_enum!(
    /// Contrast level
    Contrast
);
level_enum!(
    /// Brightness level
    Brightness
);

/// Exposure compensation, -2 to +2 EV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exposure {
    /// -2 EV
    MinusTwo,
    /// -1 EV
    MinusOne,
    /// No compensation
    Zero,
    /// +1 EV
    PlusOne,
    /// +2 EV
    PlusTwo,
}

impl Exposure {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            Exposure::MinusTwo => 0x00,
            Exposure::MinusOne => 0x01,
            Exposure::Zero => 0x02,
            Exposure::PlusOne => 0x03,
            Exposure::PlusTwo => 0x04,
        }
    }
}

/// What SNAPSHOT should hold in the camera buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotKind {
    /// Uncompressed RAW picture
    Raw,
    /// Compressed JPEG picture
    Jpeg,
}

impl SnapshotKind {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            SnapshotKind::Jpeg => 0x00,
            SnapshotKind::Raw => 0x01,
        }
    }
}

/// Which picture GET PICTURE should download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PictureKind {
    /// Live RAW picture
    Raw,
    /// Live JPEG picture
    Jpeg,
    /// Picture previously held by SNAPSHOT
    Snapshot,
}

impl PictureKind {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            PictureKind::Snapshot => 0x01,
            PictureKind::Raw => 0x02,
            PictureKind::Jpeg => 0x05,
        }
    }
}

/// RESET scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetKind {
    /// Full system reset
    System,
    /// Reset the command state machine only
    StateMachine,
}

impl ResetKind {
    /// Argument byte on the wire
    pub fn as_byte(&self) -> u8 {
        match self {
            ResetKind::System => 0x00,
            ResetKind::StateMachine => 0x01,
        }
    }
}

/// An immutable 6-byte command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Build a frame from a command and its four argument bytes
    pub fn new(command: Command, args: [u8; 4]) -> Self {
        Self::from_id(command.id(), args)
    }

    /// Build a frame from a raw command id byte
    pub fn from_id(id: u8, args: [u8; 4]) -> Self {
        Self([SYNC_BYTE, id, args[0], args[1], args[2], args[3]])
    }

    /// Raw bytes as sent on the wire
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Command id byte
    pub fn command_id(&self) -> u8 {
        self.0[1]
    }

    /// Decoded command, if the id is known
    pub fn command(&self) -> Option<Command> {
        Command::from_id(self.command_id())
    }

    /// The four argument bytes
    pub fn args(&self) -> [u8; 4] {
        [self.0[2], self.0[3], self.0[4], self.0[5]]
    }

    /// SYNC
    pub fn sync() -> Self {
        Self::new(Command::Sync, [0; 4])
    }

    /// INITIAL: colour format, RAW and JPEG resolutions
    pub fn initial(format: ImageFormat, raw: RawResolution, jpeg: JpegResolution) -> Self {
        Self::new(
            Command::Initial,
            [0x00, format.as_byte(), raw.as_byte(), jpeg.as_byte()],
        )
    }

    /// GET PICTURE
    pub fn get_picture(kind: PictureKind) -> Self {
        Self::new(Command::GetPicture, [kind.as_byte(), 0, 0, 0])
    }

    /// SNAPSHOT
    pub fn snapshot(kind: SnapshotKind) -> Self {
        Self::new(Command::Snapshot, [kind.as_byte(), 0, 0, 0])
    }

    /// SET PACKAGE SIZE: fixed `0x08` marker, then the size little-endian
    pub fn set_package_size(size: u16) -> Self {
        let [lo, hi] = size.to_le_bytes();
        Self::new(Command::SetPackageSize, [0x08, lo, hi, 0])
    }

    /// SET BAUD RATE with divisors from [`baud_divisors`]
    pub fn set_baud_rate(first_divisor: u8, second_divisor: u8) -> Self {
        Self::new(Command::SetBaudRate, [first_divisor, second_divisor, 0, 0])
    }

    /// RESET
    pub fn reset(kind: ResetKind) -> Self {
        Self::new(Command::Reset, [kind.as_byte(), 0, 0, 0])
    }

    /// LIGHT: 0 for 50 Hz, 1 for 60 Hz
    pub fn light(setting: u8) -> Self {
        Self::new(Command::Light, [setting, 0, 0, 0])
    }

    /// CONTRAST/BRIGHTNESS/EXPOSURE
    pub fn contrast_brightness_exposure(
        contrast: Contrast,
        brightness: Brightness,
        exposure: Exposure,
    ) -> Self {
        Self::new(
            Command::ContrastBrightnessExposure,
            [contrast.as_byte(), brightness.as_byte(), exposure.as_byte(), 0],
        )
    }

    /// SLEEP: timeout in seconds, 0 disables sleep
    pub fn sleep(seconds: u8) -> Self {
        Self::new(Command::Sleep, [seconds, 0, 0, 0])
    }

    /// Host ACK completing the SYNC handshake
    pub fn sync_ack() -> Self {
        Self::new(Command::Ack, [Command::Sync.id(), 0, 0, 0])
    }

    /// Host ACK requesting the image frame after `frame_id`
    ///
    /// Frame id 0 requests the first frame.
    pub fn frame_ack(frame_id: u16) -> Self {
        let [lo, hi] = frame_id.to_le_bytes();
        Self::new(Command::Ack, [0, 0, lo, hi])
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

//! Diagnostic text for device error codes and command ids
//!
//! Used only to make logs and error messages readable, never for control flow.

use std::borrow::Cow;

/// Describe an error code carried in a NAK frame
pub fn error_description(code: u8) -> Cow<'static, str> {
    let text = match code {
        0x01 => "Picture Type Error",
        0x02 => "Picture Up Scale",
        0x03 => "Picture Scale Error",
        0x04 => "Unexpected Reply",
        0x05 => "Send Picture Timeout",
        0x06 => "Unexpected Command",
        0x07 => "SRAM JPEG Type Error",
        0x08 => "SRAM JPEG Size Error",
        0x09 => "Picture Format Error",
        0x0A => "Picture Size Error",
        0x0B => "Parameter Error",
        0x0C => "Send Register Timeout",
        0x0D => "Command ID Error",
        0x0F => "Picture Not Ready",
        0x10 => "Transfer Package Number Error",
        0x11 => "Set Transfer Package Size Wrong",
        0xF0 => "Command Header Error",
        0xF1 => "Command Length Error",
        0xF5 => "Send Picture Error",
        0xFF => "Send Command Error",
        _ => return Cow::Owned(format!("Undocumented error (0x{:02X})", code)),
    };
    Cow::Borrowed(text)
}

/// Name a command id
pub fn command_name(id: u8) -> Cow<'static, str> {
    let name = match id {
        0x01 => "INITIAL",
        0x04 => "GET PICTURE",
        0x05 => "SNAPSHOT",
        0x06 => "SET PACKAGE SIZE",
        0x07 => "SET BAUD RATE",
        0x08 => "RESET",
        0x0A => "DATA",
        0x0D => "SYNC",
        0x0E => "ACK",
        0x0F => "NAK",
        0x13 => "LIGHT",
        0x14 => "CONTRAST / BRIGHTNESS / EXPOSURE",
        0x15 => "SLEEP",
        _ => return Cow::Owned(format!("Unknown command (0x{:02X})", id)),
    };
    Cow::Borrowed(name)
}

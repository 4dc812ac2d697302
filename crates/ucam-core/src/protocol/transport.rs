//! Transport handling
//!
//! The protocol engine talks to the camera through the [`Transport`] and
//! [`Connector`] traits. [`SerialConnector`] is the production implementation
//! on top of the `serialport` crate; tests script the link with
//! [`crate::protocol::mock`].

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};

/// Parameters needed to open the link to the camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound on a single read
    pub read_timeout: Duration,
}

impl PortSettings {
    /// Settings for `port_name` at the default baud rate and read timeout
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }

    /// Same port at a different baud rate
    pub fn with_baud_rate(&self, baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..self.clone()
        }
    }
}

/// An open, byte-oriented, half-duplex link
pub trait Transport {
    /// Write some bytes, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Read whatever arrives within the read timeout
    ///
    /// `Ok(0)` means nothing arrived in time; it is not an error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Discard anything buffered in either direction
    fn flush(&mut self) -> io::Result<()>;

    /// Release the link. The handle is consumed and cannot be used again.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;

    /// Write every byte of `bytes`
    fn write_all(&mut self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            match self.write(bytes) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "transport accepted no bytes",
                    ))
                }
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Opens transports; a session reopens through it on every baud-rate change
pub trait Connector {
    /// Transport type produced by this connector
    type Transport: Transport;

    /// Open a new link with the given settings
    fn open(&mut self, settings: &PortSettings) -> Result<Self::Transport, ProtocolError>;
}

/// Blocking wait used for backoff and the camera's mandated delays
pub trait Sleeper {
    /// Block for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// [`Sleeper`] that parks the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Serial port link to the camera
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.port.write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // A sleeping camera simply does not answer
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()?;
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::from)
    }

    fn close(self) -> io::Result<()> {
        drop(self.port);
        Ok(())
    }
}

/// Opens [`SerialTransport`]s with the 8N1 framing the camera expects
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Transport = SerialTransport;

    fn open(&mut self, settings: &PortSettings) -> Result<SerialTransport, ProtocolError> {
        let mut port = open_port(settings)?;
        configure_port(port.as_mut())?;
        clear_buffers(port.as_mut())?;
        Ok(SerialTransport { port })
    }
}

/// Open a serial port
pub fn open_port(settings: &PortSettings) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let baud = if settings.baud_rate == 0 {
        DEFAULT_BAUD_RATE
    } else {
        settings.baud_rate
    };

    serialport::new(&settings.port_name, baud)
        .timeout(settings.read_timeout)
        .open()
        .map_err(|e| ProtocolError::SerialError(format!("{}: {}", settings.port_name, e)))
}

/// Configure a serial port for camera communication
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    // Standard 8N1 configuration, no hardware handshake
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

//! Command channel
//!
//! Sends command frames and retries them until the camera acknowledges,
//! waiting a little longer after every unsuccessful attempt.

use std::time::Duration;
use tracing::{debug, warn};

use super::{
    catalog::{command_name, error_description},
    response::{Ack, Response},
    transport::{Sleeper, Transport},
    CommandFrame, ProtocolError, BACKOFF_BASE_MS, BACKOFF_STEP_MS, MAX_ATTEMPTS,
};

/// Size of the buffer for one command response read
const RESPONSE_BUF_LEN: usize = 128;

/// Linear backoff, reset to its base on every ACK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    step: Duration,
    current: Duration,
}

impl Backoff {
    /// Backoff starting at `base` and growing by `step` per failed attempt
    pub fn new(base: Duration, step: Duration) -> Self {
        Self {
            base,
            step,
            current: base,
        }
    }

    /// Wait to apply after the next failed attempt
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the current wait and grow it by one step
    pub fn advance(&mut self) -> Duration {
        let wait = self.current;
        self.current = self.current.saturating_add(self.step);
        wait
    }

    /// Back to the baseline after an ACK
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(BACKOFF_BASE_MS),
            Duration::from_millis(BACKOFF_STEP_MS),
        )
    }
}

/// Retrying sender for 6-byte command frames
///
/// Owns the backoff state, so two sessions never influence each other's timing.
#[derive(Debug)]
pub struct CommandChannel<S: Sleeper> {
    sleeper: S,
    backoff: Backoff,
    max_attempts: u32,
    logging: bool,
    last_attempts: u32,
}

impl<S: Sleeper> CommandChannel<S> {
    /// Channel retrying at most `max_attempts` times (at least once)
    pub fn new(sleeper: S, backoff: Backoff, max_attempts: u32) -> Self {
        Self {
            sleeper,
            backoff,
            max_attempts: max_attempts.max(1),
            logging: false,
            last_attempts: 0,
        }
    }

    /// Channel with the protocol defaults (60 attempts, 5 ms + 1 ms per attempt)
    pub fn with_defaults(sleeper: S) -> Self {
        Self::new(sleeper, Backoff::default(), MAX_ATTEMPTS)
    }

    /// Enable/disable frame-level logging
    pub fn set_logging(&mut self, enable: bool) {
        self.logging = enable;
    }

    /// Whether frame-level logging is on
    pub fn logging(&self) -> bool {
        self.logging
    }

    /// Retry ceiling
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts used by the most recent `send`
    pub fn last_attempts(&self) -> u32 {
        self.last_attempts
    }

    /// Current backoff state
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Block for a mandated device delay
    pub fn pause(&mut self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    /// Send `frame` until the camera ACKs it or the attempt ceiling is reached
    ///
    /// NAKs, silence and unrecognised replies are all retried. Transport
    /// errors are not: they are returned immediately.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        frame: &CommandFrame,
    ) -> Result<Ack, ProtocolError> {
        let mut last_nak = None;
        let mut buf = [0u8; RESPONSE_BUF_LEN];

        for attempt in 1..=self.max_attempts {
            self.last_attempts = attempt;
            transport.write_all(frame.as_bytes())?;
            if self.logging {
                debug!("Sent    : {:02X?}", frame.as_bytes());
            }

            let n = transport.read(&mut buf)?;
            let response = Response::classify(&buf[..n]);
            if self.logging && n > 0 {
                debug!("Received: {:02X?}", &buf[..n]);
            }

            match response {
                Response::Ack(ack) => {
                    self.backoff.reset();
                    return Ok(ack);
                }
                Response::Nak { error_code } => {
                    warn!(
                        "{} NAK: {} (0x{:02X}), attempt {}",
                        command_name(frame.command_id()),
                        error_description(error_code),
                        error_code,
                        attempt
                    );
                    last_nak = Some(error_code);
                }
                Response::Timeout => {}
                Response::Malformed { bytes } => {
                    if self.logging {
                        debug!("Unrecognised reply: {:02X?}", bytes);
                    }
                }
            }

            if attempt < self.max_attempts {
                let wait = self.backoff.advance();
                self.sleeper.sleep(wait);
            }
        }

        Err(ProtocolError::CommandFailed {
            command: frame.command_id(),
            name: command_name(frame.command_id()).into_owned(),
            attempts: self.max_attempts,
            last_nak,
        })
    }
}

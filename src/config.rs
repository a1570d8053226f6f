use core::convert::Infallible;
use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

use crate::retry::RetryPolicy;

pub const SEQUANS_MODULE_BAUD_RATE: u32 = 115_200;
pub const COMMAND_NUM_RETRIES: u8 = 5;
pub const COMMAND_RETRY_SLEEP: Duration = Duration::from_millis(500);

/// Stand-in for a line that is not wired.
///
/// As an input it reads low, so a board with CTS tied to ground can pass it
/// as the CTS pin and always be clear to send.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl InputPin for NoPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Output behind an inverting level shifter.
pub struct ReverseOutputPin<P: OutputPin<Error = Infallible>>(pub P);

impl<P: OutputPin<Error = Infallible>> ErrorType for ReverseOutputPin<P> {
    type Error = Infallible;
}

impl<P: OutputPin<Error = Infallible>> OutputPin for ReverseOutputPin<P> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_state(&mut self, state: PinState) -> Result<(), Self::Error> {
        self.0.set_state(!state)
    }
}

pub struct ReverseInputPin<P: InputPin<Error = Infallible>>(pub P);

impl<P: InputPin<Error = Infallible>> ErrorType for ReverseInputPin<P> {
    type Error = Infallible;
}

impl<P: InputPin<Error = Infallible>> InputPin for ReverseInputPin<P> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) retry: RetryPolicy,
    pub(crate) response_timeout: Duration,
    pub(crate) urc_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) boot_timeout: Duration,
    pub(crate) reset_time: Duration,
    pub(crate) baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            response_timeout: Duration::from_secs(5),
            urc_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(1),
            boot_timeout: Duration::from_secs(10),
            reset_time: Duration::from_millis(10),
            baud_rate: SEQUANS_MODULE_BAUD_RATE,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy used by `retry_command`.
    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }

    /// Longest silence tolerated while reading a response.
    pub fn with_response_timeout(self, response_timeout: Duration) -> Self {
        Self {
            response_timeout,
            ..self
        }
    }

    /// Default wait of `Controller::wait_for_urc_default`.
    pub fn with_urc_timeout(self, urc_timeout: Duration) -> Self {
        Self {
            urc_timeout,
            ..self
        }
    }

    /// How long a write may wait on a full TX buffer or a deasserted CTS.
    pub fn with_write_timeout(self, write_timeout: Duration) -> Self {
        Self {
            write_timeout,
            ..self
        }
    }

    /// How long to wait for `+SYSSTART` after a reset.
    pub fn with_boot_timeout(self, boot_timeout: Duration) -> Self {
        Self {
            boot_timeout,
            ..self
        }
    }

    /// Low time of the reset line.
    pub fn with_reset_time(self, reset_time: Duration) -> Self {
        Self { reset_time, ..self }
    }

    pub fn baud_rate<B: Into<u32>>(self, baud_rate: B) -> Self {
        Self {
            baud_rate: baud_rate.into(),
            ..self
        }
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn urc_timeout(&self) -> Duration {
        self.urc_timeout
    }

    /// Baud rate the board should configure its UART with.
    pub fn get_baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

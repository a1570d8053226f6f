use atat::helpers::LossyStr;
use atat::AtatCmd;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::command::control::types::Echo;
use crate::command::control::SetEcho;
use crate::command::SYSSTART;
use crate::config::Config;
use crate::error::Error;
use crate::response::{match_terminator, ResponseResult, TerminatorWindow};
use crate::retry::{as_delay_ms, RetryPolicy};
use crate::traits::Uart;
use crate::transport::{PowerSaveMode, Transport, RX_BUFFER_SIZE, TX_BUFFER_SIZE};

/// Longest serialised typed command accepted by [`Controller::send`].
pub const COMMAND_BUFFER_SIZE: usize = 256;
/// Response buffer used by [`Controller::send`].
pub const RESPONSE_BUFFER_SIZE: usize = 512;

const POLL_INTERVAL_MS: u32 = 1;
const COMMAND_TERMINATOR: u8 = b'\r';

/// Foreground side of the modem link.
///
/// Every blocking call polls the [`Transport`] once per millisecond and
/// re-evaluates flow control on each poll. Timeouts count polls, so the
/// delay provider's accuracy bounds them.
pub struct Controller<
    'a,
    M: RawMutex,
    U,
    RTS,
    CTS,
    RST,
    D,
    const RX: usize = RX_BUFFER_SIZE,
    const TX: usize = TX_BUFFER_SIZE,
> {
    transport: &'a Transport<M, U, RTS, CTS, RX, TX>,
    reset_pin: Option<RST>,
    delay: D,
    config: Config,
    initialized: bool,
}

impl<'a, M, U, RTS, CTS, RST, D, const RX: usize, const TX: usize>
    Controller<'a, M, U, RTS, CTS, RST, D, RX, TX>
where
    M: RawMutex,
    U: Uart,
    RTS: OutputPin,
    CTS: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    /// The reset line is pulsed low on [`begin`](Self::begin). Wrap it in
    /// [`ReverseOutputPin`](crate::ReverseOutputPin) for an active high reset.
    pub fn new(
        transport: &'a Transport<M, U, RTS, CTS, RX, TX>,
        reset_pin: Option<RST>,
        delay: D,
        config: Config,
    ) -> Self {
        Self {
            transport,
            reset_pin,
            delay,
            config,
            initialized: false,
        }
    }

    pub fn transport(&self) -> &'a Transport<M, U, RTS, CTS, RX, TX> {
        self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bring the link up.
    ///
    /// Enables the UART and flow control, resets the modem if a reset line
    /// was given and waits for `+SYSSTART`, then checks that the modem
    /// answers `AT` and turns command echo off. On failure the link is shut
    /// down again.
    pub fn begin(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }

        self.transport.enable();
        match self.boot() {
            Ok(()) => {
                self.initialized = true;
                info!("Modem link up");
                Ok(())
            }
            Err(e) => {
                error!("Modem bring-up failed: {:?}", e);
                self.end();
                Err(e)
            }
        }
    }

    fn boot(&mut self) -> Result<(), Error> {
        if self.reset_pin.is_some() {
            let previous = self.transport.arm_capture(SYSSTART)?;
            let booted = self
                .hard_reset()
                .and_then(|()| self.await_capture(self.config.boot_timeout));
            self.transport.disarm_capture(SYSSTART, previous);
            if booted.is_err() {
                warn!("No +SYSSTART within {} ms", self.config.boot_timeout.as_millis());
            }
            booted?;
        }

        self.retry_command("AT").ok()?;
        self.send(&SetEcho { enabled: Echo::Off }).map(|_| ())
    }

    fn hard_reset(&mut self) -> Result<(), Error> {
        if let Some(pin) = self.reset_pin.as_mut() {
            debug!("Resetting modem");
            pin.set_low().map_err(|_| Error::IoPin)?;
            self.delay.delay_ms(as_delay_ms(self.config.reset_time));
            pin.set_high().map_err(|_| Error::IoPin)?;
        }
        Ok(())
    }

    /// Shut the link down. Buffers are cleared and power-save is left;
    /// registered callbacks are kept for the next [`begin`](Self::begin).
    pub fn end(&mut self) {
        self.transport.disable();
        self.initialized = false;
    }

    fn ensure_enabled(&self) -> Result<(), Error> {
        if self.transport.is_enabled() {
            Ok(())
        } else {
            Err(Error::Uninitialized)
        }
    }

    fn poll(&mut self) {
        self.transport.cts_update();
        self.delay.delay_ms(POLL_INTERVAL_MS);
    }

    // Command/response engine

    /// Queue `data` for transmission.
    ///
    /// Blocks while the TX buffer is full. With `wait_for_completion`, also
    /// blocks until the last byte has left the UART. Either wait gives up
    /// after the configured write timeout without progress, dropping
    /// whatever is still queued.
    pub fn write_bytes(&mut self, data: &[u8], wait_for_completion: bool) -> Result<(), Error> {
        self.ensure_enabled()?;
        let limit = as_delay_ms(self.config.write_timeout);

        for &byte in data {
            let mut waited = 0;
            while self.transport.queue_byte(byte).is_err() {
                if waited >= limit {
                    warn!("TX stalled, is CTS asserted?");
                    self.transport.clear_transmit_buffer();
                    return Err(Error::Timeout);
                }
                self.poll();
                waited += POLL_INTERVAL_MS;
            }
        }

        if wait_for_completion {
            let mut waited = 0;
            while !self.transport.is_tx_idle() {
                if waited >= limit {
                    warn!("TX did not drain");
                    self.transport.clear_transmit_buffer();
                    return Err(Error::Timeout);
                }
                self.poll();
                waited += POLL_INTERVAL_MS;
            }
        }
        Ok(())
    }

    /// Drop stale input, then send `command` terminated by `\r` and wait for
    /// it to leave the UART.
    pub fn write_command(&mut self, command: &str) -> Result<(), Error> {
        self.send_command(command.as_bytes())
    }

    fn send_command(&mut self, command: &[u8]) -> Result<(), Error> {
        self.ensure_enabled()?;
        trace!("Sending {:?}", LossyStr(command));
        self.transport.clear_receive_buffer();
        self.write_bytes(command, false)?;
        self.write_bytes(&[COMMAND_TERMINATOR], true)
    }

    pub fn read_response(&mut self, buf: &mut [u8]) -> (ResponseResult, usize) {
        self.read_response_with_timeout(buf, self.config.response_timeout)
    }

    /// Read a response into `buf`, up to its final `OK` or `ERROR`.
    ///
    /// Returns the outcome and the number of bytes of `buf` holding response
    /// data, terminator excluded. The timeout restarts with every byte
    /// received. A response that does not fit in `buf` is
    /// `BufferOverflow`, never a truncated `Ok`.
    pub fn read_response_with_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (ResponseResult, usize) {
        if self.ensure_enabled().is_err() {
            return (ResponseResult::None, 0);
        }

        let limit = as_delay_ms(timeout);
        let mut len = 0;
        let mut idle = 0;
        loop {
            if self.transport.take_rx_fault() {
                warn!("Serial read error");
                return (ResponseResult::SerialReadError, len);
            }

            let Some(byte) = self.transport.read_byte() else {
                if idle >= limit {
                    return (ResponseResult::Timeout, len);
                }
                self.poll();
                idle += POLL_INTERVAL_MS;
                continue;
            };
            idle = 0;

            let Some(slot) = buf.get_mut(len) else {
                return (ResponseResult::BufferOverflow, len);
            };
            *slot = byte;
            len += 1;

            if byte == b'\n' && len >= 2 && buf[len - 2] == b'\r' {
                if let Some((result, data_len)) = match_terminator(&buf[..len]) {
                    return (result, data_len);
                }
            }
        }
    }

    /// Read and drop a response, keeping only its outcome.
    pub fn discard_response(&mut self) -> ResponseResult {
        self.discard_response_with_timeout(self.config.response_timeout)
    }

    pub fn discard_response_with_timeout(&mut self, timeout: Duration) -> ResponseResult {
        if self.ensure_enabled().is_err() {
            return ResponseResult::None;
        }

        let limit = as_delay_ms(timeout);
        let mut window = TerminatorWindow::default();
        let mut idle = 0;
        loop {
            if self.transport.take_rx_fault() {
                warn!("Serial read error");
                return ResponseResult::SerialReadError;
            }

            match self.transport.read_byte() {
                Some(byte) => {
                    idle = 0;
                    if let Some(result) = window.push(byte) {
                        return result;
                    }
                }
                None if idle >= limit => return ResponseResult::Timeout,
                None => {
                    self.poll();
                    idle += POLL_INTERVAL_MS;
                }
            }
        }
    }

    /// A single exchange: send `command`, read its response into `buf`.
    pub fn command(&mut self, command: &str, buf: &mut [u8]) -> (ResponseResult, usize) {
        let timeout = self.config.response_timeout;
        self.exchange(command.as_bytes(), Some(buf), timeout)
    }

    /// Repeat `command` under the configured [`RetryPolicy`] until the modem
    /// answers `OK`. The response body is dropped.
    pub fn retry_command(&mut self, command: &str) -> ResponseResult {
        let policy = self.config.retry;
        let timeout = self.config.response_timeout;
        self.retry(command.as_bytes(), None, &policy, timeout).0
    }

    /// [`retry_command`](Self::retry_command) keeping the response of the
    /// last attempt in `buf`.
    pub fn retry_command_with(
        &mut self,
        command: &str,
        buf: &mut [u8],
        policy: &RetryPolicy,
    ) -> (ResponseResult, usize) {
        let timeout = self.config.response_timeout;
        self.retry(command.as_bytes(), Some(buf), policy, timeout)
    }

    fn exchange(
        &mut self,
        command: &[u8],
        buf: Option<&mut [u8]>,
        timeout: Duration,
    ) -> (ResponseResult, usize) {
        match self.send_command(command) {
            Ok(()) => {}
            Err(Error::Uninitialized) => return (ResponseResult::None, 0),
            Err(_) => return (ResponseResult::Timeout, 0),
        }

        match buf {
            Some(buf) => self.read_response_with_timeout(buf, timeout),
            None => (self.discard_response_with_timeout(timeout), 0),
        }
    }

    fn retry(
        &mut self,
        command: &[u8],
        mut buf: Option<&mut [u8]>,
        policy: &RetryPolicy,
        timeout: Duration,
    ) -> (ResponseResult, usize) {
        let mut backoff = policy.backoff();
        loop {
            let outcome = self.exchange(command, buf.as_deref_mut(), timeout);
            if outcome.0.is_ok() || outcome.0 == ResponseResult::None {
                return outcome;
            }

            match backoff.next() {
                Some(wait) => {
                    debug!("{:?} got {:?}, retrying", LossyStr(command), outcome.0);
                    self.delay.delay_ms(as_delay_ms(wait));
                }
                None => {
                    warn!(
                        "{:?} failed after {} attempts: {:?}",
                        LossyStr(command),
                        policy.attempts(),
                        outcome.0
                    );
                    return outcome;
                }
            }
        }
    }

    /// Send a typed command and parse its response.
    ///
    /// The command's own attempt count and timeout apply, with the delay
    /// between attempts taken from the configured retry policy.
    pub fn send<Cmd: AtatCmd>(&mut self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        if Cmd::MAX_LEN > COMMAND_BUFFER_SIZE {
            return Err(Error::CommandTooLong);
        }

        let mut command = [0u8; COMMAND_BUFFER_SIZE];
        let len = cmd.write(&mut command);
        // The modem wants a lone `\r`, whatever the command was declared with.
        let command = command[..len].trim_ascii_end();

        let policy = self.config.retry.with_attempts(Cmd::ATTEMPTS);
        let timeout = Duration::from_millis(u64::from(Cmd::MAX_TIMEOUT_MS));
        let mut response = [0u8; RESPONSE_BUFFER_SIZE];

        match self.retry(command, Some(&mut response[..]), &policy, timeout) {
            (ResponseResult::Ok, len) => Ok(cmd.parse(Ok(response[..len].trim_ascii()))?),
            (ResponseResult::None, _) => Err(Error::Uninitialized),
            (result, _) => Err(result.into()),
        }
    }

    pub fn clear_receive_buffer(&mut self) {
        self.transport.clear_receive_buffer();
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.transport.read_byte()
    }

    // Notifications and blocking waits

    /// Subscribe `callback` to `+<identifier>:` notifications.
    ///
    /// The callback runs in interrupt context with RTS released and must be
    /// short. With `discard_payload` the notification never shows up in
    /// command responses.
    pub fn register_callback(
        &mut self,
        identifier: &str,
        callback: fn(&[u8]),
        discard_payload: bool,
    ) -> Result<(), Error> {
        self.transport
            .register_callback(identifier, callback, discard_payload)
    }

    pub fn unregister_callback(&mut self, identifier: &str) {
        self.transport.unregister_callback(identifier);
    }

    /// [`wait_for_urc`](Self::wait_for_urc) with the configured URC timeout.
    pub fn wait_for_urc_default(
        &mut self,
        identifier: &str,
        out: &mut [u8],
    ) -> Result<usize, Error> {
        let timeout = self.config.urc_timeout;
        self.wait_for_urc(identifier, out, timeout)
    }

    /// Block until a `+<identifier>:` notification arrives and copy its
    /// payload into `out`, returning the payload length.
    ///
    /// Any callback already registered for `identifier` is set aside for the
    /// wait and put back afterwards.
    pub fn wait_for_urc(
        &mut self,
        identifier: &str,
        out: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Error> {
        self.ensure_enabled()?;
        let previous = self.transport.arm_capture(identifier)?;
        let captured = self.await_capture(timeout);
        self.transport.disarm_capture(identifier, previous);

        let payload = captured?;
        let dst = out
            .get_mut(..payload.len())
            .ok_or(Error::BufferTooSmall)?;
        dst.copy_from_slice(&payload);
        Ok(payload.len())
    }

    fn await_capture(&mut self, timeout: Duration) -> Result<crate::transport::Payload, Error> {
        let limit = as_delay_ms(timeout);
        let mut waited = 0;
        loop {
            if let Some(payload) = self.transport.take_capture() {
                return Ok(payload);
            }
            if waited >= limit {
                return Err(Error::Timeout);
            }
            self.poll();
            waited += POLL_INTERVAL_MS;
        }
    }

    /// Drop received bytes until `byte` arrives.
    pub fn wait_for_byte(&mut self, byte: u8, timeout: Duration) -> Result<(), Error> {
        self.ensure_enabled()?;
        let limit = as_delay_ms(timeout);
        let mut waited = 0;
        loop {
            match self.transport.read_byte() {
                Some(b) if b == byte => return Ok(()),
                Some(_) => {}
                None if waited >= limit => return Err(Error::Timeout),
                None => {
                    self.poll();
                    waited += POLL_INTERVAL_MS;
                }
            }
        }
    }

    // Power and critical sections

    /// With power-save enabled RTS stays released so stray bytes cannot wake
    /// the modem, and `ring_callback` runs on every ring line edge.
    pub fn set_power_save_mode(&mut self, mode: PowerSaveMode, ring_callback: Option<fn()>) {
        self.transport.set_power_save_mode(mode, ring_callback);
    }

    /// Hold RTS released, independent of buffer occupancy.
    pub fn start_critical_section(&mut self) {
        self.transport.set_critical_section(true);
    }

    pub fn stop_critical_section(&mut self) {
        self.transport.set_critical_section(false);
    }

    pub fn cts_update(&mut self) {
        self.transport.cts_update();
    }
}

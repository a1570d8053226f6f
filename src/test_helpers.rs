//! Simulated board and modem for host tests.
//!
//! [`Wire`] stands for the UART and flow control lines. [`Modem`] adds a
//! scripted peer on the other end of it, with [`ModemDelay`] moving bytes
//! in both directions on every millisecond the controller waits.

use core::convert::Infallible;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Once;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

use crate::controller::Controller;
use crate::traits::Uart;
use crate::transport::Transport;

pub(crate) type TestTransport = Transport<NoopRawMutex, MockUart, MockRts, MockCts>;
pub(crate) type TestController<'a> =
    Controller<'a, NoopRawMutex, MockUart, MockRts, MockCts, MockReset, ModemDelay<'a>>;

static INIT: Once = Once::new();

pub(crate) fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
            .is_test(true)
            .try_init();
    });
}

struct Lines {
    rts: PinState,
    cts: PinState,
    reset: PinState,
    resets: usize,
    uart_enabled: bool,
    tx_interrupt: bool,
    sent: Vec<u8>,
}

impl Default for Lines {
    fn default() -> Self {
        Self {
            rts: PinState::High,
            cts: PinState::Low,
            reset: PinState::High,
            resets: 0,
            uart_enabled: false,
            tx_interrupt: false,
            sent: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct Wire(Rc<RefCell<Lines>>);

impl Wire {
    pub(crate) fn transport(&self) -> TestTransport {
        Transport::new(
            MockUart(self.clone()),
            MockRts(self.clone()),
            MockCts(self.clone()),
        )
    }

    pub(crate) fn rts(&self) -> PinState {
        self.0.borrow().rts
    }

    pub(crate) fn set_cts(&self, state: PinState) {
        self.0.borrow_mut().cts = state;
    }

    pub(crate) fn tx_interrupt(&self) -> bool {
        self.0.borrow().tx_interrupt
    }

    pub(crate) fn uart_enabled(&self) -> bool {
        self.0.borrow().uart_enabled
    }

    /// Everything written to the UART so far.
    pub(crate) fn sent(&self) -> Vec<u8> {
        self.0.borrow().sent.clone()
    }
}

pub(crate) struct MockUart(Wire);

impl Uart for MockUart {
    fn enable(&mut self) {
        (self.0).0.borrow_mut().uart_enabled = true;
    }

    fn disable(&mut self) {
        (self.0).0.borrow_mut().uart_enabled = false;
    }

    fn write(&mut self, byte: u8) {
        (self.0).0.borrow_mut().sent.push(byte);
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        (self.0).0.borrow_mut().tx_interrupt = enabled;
    }

    fn is_transmit_complete(&mut self) -> bool {
        true
    }
}

pub(crate) struct MockRts(Wire);

impl ErrorType for MockRts {
    type Error = Infallible;
}

impl OutputPin for MockRts {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        (self.0).0.borrow_mut().rts = PinState::Low;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        (self.0).0.borrow_mut().rts = PinState::High;
        Ok(())
    }
}

pub(crate) struct MockCts(Wire);

impl ErrorType for MockCts {
    type Error = Infallible;
}

impl InputPin for MockCts {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((self.0).0.borrow().cts == PinState::High)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok((self.0).0.borrow().cts == PinState::Low)
    }
}

/// Reset line; a low to high transition counts as one reset.
pub(crate) struct MockReset(Wire);

impl ErrorType for MockReset {
    type Error = Infallible;
}

impl OutputPin for MockReset {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        (self.0).0.borrow_mut().reset = PinState::Low;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut lines = (self.0).0.borrow_mut();
        if lines.reset == PinState::Low {
            lines.resets += 1;
        }
        lines.reset = PinState::High;
        Ok(())
    }
}

#[derive(Default)]
struct Script {
    /// Expected command (without `\r`) and the reply it triggers.
    exchanges: VecDeque<(Vec<u8>, Vec<u8>)>,
    /// Bytes on their way to the board, held back while RTS is released.
    outgoing: VecDeque<u8>,
    /// Bytes to send once the clock reaches the given millisecond.
    scheduled: Vec<(u64, Vec<u8>)>,
    boot: Vec<u8>,
    resets_seen: usize,
    /// Received bytes not yet terminated by `\r`.
    line: Vec<u8>,
    elapsed_ms: u64,
}

/// A scripted modem on the far side of a [`Wire`].
///
/// Commands are matched against the script in order. A command the script
/// does not expect gets no reply, which tests use to provoke timeouts.
#[derive(Clone, Default)]
pub(crate) struct Modem {
    wire: Wire,
    script: Rc<RefCell<Script>>,
}

impl Modem {
    pub(crate) fn transport(&self) -> TestTransport {
        self.wire.transport()
    }

    pub(crate) fn delay<'a>(&self, transport: &'a TestTransport) -> ModemDelay<'a> {
        ModemDelay {
            transport,
            modem: self.clone(),
            ns: 0,
        }
    }

    pub(crate) fn reset_pin(&self) -> MockReset {
        MockReset(self.wire.clone())
    }

    pub(crate) fn expect(&self, command: &str, reply: &str) {
        self.script
            .borrow_mut()
            .exchanges
            .push_back((command.as_bytes().to_vec(), reply.as_bytes().to_vec()));
    }

    /// Send `bytes` unprompted, starting with the next tick.
    pub(crate) fn inject(&self, bytes: &str) {
        self.script.borrow_mut().outgoing.extend(bytes.bytes());
    }

    pub(crate) fn inject_after(&self, ms: u64, bytes: &str) {
        let mut script = self.script.borrow_mut();
        let at = script.elapsed_ms + ms;
        script.scheduled.push((at, bytes.as_bytes().to_vec()));
    }

    /// What the modem prints after every reset.
    pub(crate) fn boot_with(&self, bytes: &str) {
        self.script.borrow_mut().boot = bytes.as_bytes().to_vec();
    }

    pub(crate) fn resets(&self) -> usize {
        self.wire.0.borrow().resets
    }

    pub(crate) fn sent(&self) -> Vec<u8> {
        self.wire.sent()
    }

    pub(crate) fn rts(&self) -> PinState {
        self.wire.rts()
    }

    pub(crate) fn set_cts(&self, state: PinState) {
        self.wire.set_cts(state);
    }

    pub(crate) fn pending_exchanges(&self) -> usize {
        self.script.borrow().exchanges.len()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pending_exchanges() == 0
    }

    /// Advance the simulation by one millisecond.
    fn tick(&self, transport: &TestTransport) {
        // Drain the TX path the way the data-register-empty interrupt would.
        let before = self.wire.0.borrow().sent.len();
        while self.wire.tx_interrupt() {
            transport.on_transmit_ready();
        }
        let sent = self.wire.0.borrow().sent[before..].to_vec();

        let mut script = self.script.borrow_mut();
        script.elapsed_ms += 1;

        for byte in sent {
            if byte != b'\r' {
                script.line.push(byte);
                continue;
            }
            let line = core::mem::take(&mut script.line);
            let expected = script
                .exchanges
                .front()
                .is_some_and(|(command, _)| *command == line);
            if expected {
                if let Some((_, reply)) = script.exchanges.pop_front() {
                    script.outgoing.extend(reply);
                }
            }
        }

        let resets = self.wire.0.borrow().resets;
        if resets > script.resets_seen {
            script.resets_seen = resets;
            let boot = script.boot.clone();
            script.outgoing.extend(boot);
        }

        let now = script.elapsed_ms;
        let (due, later): (Vec<_>, Vec<_>) =
            script.scheduled.drain(..).partition(|(at, _)| *at <= now);
        script.scheduled = later;
        for (_, bytes) in due {
            script.outgoing.extend(bytes);
        }

        // Release the borrow before calling into the transport, whose
        // notification handlers may call back into test state.
        let mut outgoing = core::mem::take(&mut script.outgoing);
        drop(script);

        while self.wire.rts() == PinState::Low {
            let Some(byte) = outgoing.pop_front() else {
                break;
            };
            transport.on_receive(byte);
        }

        let mut script = self.script.borrow_mut();
        outgoing.extend(script.outgoing.drain(..));
        script.outgoing = outgoing;
    }
}

/// Delay provider that runs the [`Modem`] while the controller waits.
pub(crate) struct ModemDelay<'a> {
    transport: &'a TestTransport,
    modem: Modem,
    ns: u32,
}

impl DelayNs for ModemDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.ns = self.ns.saturating_add(ns);
        while self.ns >= 1_000_000 {
            self.ns -= 1_000_000;
            self.modem.tick(self.transport);
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.modem.tick(self.transport);
        }
    }
}

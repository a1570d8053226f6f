use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use heapless::Vec;

use crate::error::Error;
use crate::flow_control::{clear_to_send, Inbound, Outbound};
use crate::ring_buffer::{ByteRingBuffer, Exhausted};
use crate::traits::Uart;
use crate::urc::{Handler, Registration, UrcParser, UrcRegistry, URC_DATA_BUFFER_SIZE};

pub const RX_BUFFER_SIZE: usize = 512;
pub const TX_BUFFER_SIZE: usize = 128;

pub type Payload = Vec<u8, URC_DATA_BUFFER_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSaveMode {
    Disabled,
    /// The modem may sleep; RTS stays released and the ring line wakes us.
    Enabled,
}

/// Everything the interrupt handlers and the foreground share.
struct Inner<U, RTS, CTS, const RX: usize, const TX: usize> {
    uart: U,
    rts: RTS,
    cts: CTS,

    rx: ByteRingBuffer<RX>,
    tx: ByteRingBuffer<TX>,
    parser: UrcParser,
    registry: UrcRegistry,
    /// Payload caught by a `Handler::Capture` registration.
    capture: Option<Payload>,

    enabled: bool,
    critical_section: bool,
    power_save: bool,
    dispatching: bool,
    ring_callback: Option<fn()>,
    /// Received bytes were lost since the receive buffer was last cleared.
    rx_fault: bool,
}

impl<U, RTS, CTS, const RX: usize, const TX: usize> Inner<U, RTS, CTS, RX, TX>
where
    U: Uart,
    RTS: OutputPin,
    CTS: InputPin,
{
    fn inbound(&self) -> Inbound {
        Inbound {
            rx_count: self.rx.len(),
            rx_capacity: self.rx.capacity(),
            critical_section: self.critical_section,
            power_save: self.power_save,
            dispatching: self.dispatching,
        }
    }

    fn update_rts(&mut self) {
        let state = if self.enabled {
            self.inbound().rts_state()
        } else {
            PinState::High
        };
        if self.rts.set_state(state).is_err() {
            error!("Failed to drive RTS");
        }
    }

    fn peer_clear_to_send(&mut self) -> bool {
        match self.cts.is_low() {
            Ok(low) => clear_to_send(if low { PinState::Low } else { PinState::High }),
            Err(_) => false,
        }
    }

    fn update_tx_interrupt(&mut self) {
        let outbound = Outbound {
            peer_clear_to_send: self.peer_clear_to_send(),
            tx_count: self.tx.len(),
        };
        self.uart.set_tx_interrupt(outbound.tx_interrupt_enabled());
    }

    fn receive(&mut self, byte: u8) -> Option<(fn(&[u8]), Payload)> {
        if self.rx.push(byte).is_err() {
            // The parser counts every byte it sees as buffered, so it must
            // not see this one.
            self.rx_fault = true;
            self.parser.reset();
            warn!("RX buffer overrun, dropping byte");
            self.update_rts();
            return None;
        }

        let dispatch = match self.parser.process(byte, &mut self.rx, &self.registry) {
            Some(notification) => match notification.handler {
                Handler::Capture => {
                    self.capture = Some(notification.payload);
                    None
                }
                Handler::Callback(callback) => {
                    self.dispatching = true;
                    Some((callback, notification.payload))
                }
            },
            None => None,
        };

        self.update_rts();
        dispatch
    }

    fn reset_buffers(&mut self) {
        self.rx.clear();
        self.tx.clear();
        self.parser.reset();
        self.capture = None;
        self.rx_fault = false;
    }
}

/// The interrupt-shared half of the modem link.
///
/// Holds both ring buffers, the URC parser and registry, and the UART and
/// flow control lines, all behind one blocking mutex. With
/// `CriticalSectionRawMutex` every access masks interrupts for the length of
/// the update only. Boards usually keep it in a `static` and forward their
/// UART and CTS interrupts to the `on_*` methods.
pub struct Transport<
    M: RawMutex,
    U,
    RTS,
    CTS,
    const RX: usize = RX_BUFFER_SIZE,
    const TX: usize = TX_BUFFER_SIZE,
> {
    inner: Mutex<M, RefCell<Inner<U, RTS, CTS, RX, TX>>>,
}

impl<M, U, RTS, CTS, const RX: usize, const TX: usize> Transport<M, U, RTS, CTS, RX, TX>
where
    M: RawMutex,
    U: Uart,
    RTS: OutputPin,
    CTS: InputPin,
{
    pub const fn new(uart: U, rts: RTS, cts: CTS) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                uart,
                rts,
                cts,
                rx: ByteRingBuffer::new(),
                tx: ByteRingBuffer::new(),
                parser: UrcParser::new(),
                registry: UrcRegistry::new(),
                capture: None,
                enabled: false,
                critical_section: false,
                power_save: false,
                dispatching: false,
                ring_callback: None,
                rx_fault: false,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<U, RTS, CTS, RX, TX>) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.borrow_mut()))
    }

    // Interrupt entry points

    /// RX-complete interrupt.
    ///
    /// A matched notification with a callback handler is dispatched from
    /// here, outside the lock, with RTS held released until it returns.
    pub fn on_receive(&self, byte: u8) {
        if let Some((callback, payload)) = self.with(|inner| inner.receive(byte)) {
            callback(&payload);
            self.with(|inner| {
                inner.dispatching = false;
                inner.update_rts();
            });
        }
    }

    /// UART framing, parity or hardware overrun error.
    pub fn on_receive_error(&self) {
        self.with(|inner| inner.rx_fault = true);
    }

    /// Data-register-empty interrupt.
    pub fn on_transmit_ready(&self) {
        self.with(|inner| {
            if inner.peer_clear_to_send() {
                if let Some(byte) = inner.tx.pop() {
                    inner.uart.write(byte);
                }
            }
            inner.update_tx_interrupt();
        });
    }

    /// Level change on CTS.
    pub fn on_cts_change(&self) {
        self.with(|inner| inner.update_tx_interrupt());
    }

    /// Edge on the ring line. Runs the power-save callback while power-save is active.
    pub fn on_ring(&self) {
        let callback = self.with(|inner| {
            if inner.power_save {
                inner.ring_callback
            } else {
                None
            }
        });
        if let Some(callback) = callback {
            callback();
        }
    }

    // Foreground side

    pub(crate) fn enable(&self) {
        self.with(|inner| {
            inner.reset_buffers();
            inner.enabled = true;
            inner.uart.enable();
            inner.update_rts();
            inner.update_tx_interrupt();
        });
        debug!("Transport enabled");
    }

    pub(crate) fn disable(&self) {
        self.with(|inner| {
            inner.uart.set_tx_interrupt(false);
            inner.uart.disable();
            inner.enabled = false;
            inner.critical_section = false;
            inner.power_save = false;
            inner.ring_callback = None;
            inner.reset_buffers();
            inner.update_rts();
        });
        debug!("Transport disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.with(|inner| inner.enabled)
    }

    /// Re-evaluate both flow control directions.
    ///
    /// The CTS edge interrupt can be missed under load, so every blocking
    /// loop calls this on each poll.
    pub fn cts_update(&self) {
        self.with(|inner| {
            inner.update_tx_interrupt();
            inner.update_rts();
        });
    }

    pub fn read_byte(&self) -> Option<u8> {
        self.with(|inner| {
            let byte = inner.rx.pop();
            inner.update_rts();
            byte
        })
    }

    pub(crate) fn queue_byte(&self, byte: u8) -> Result<(), Exhausted> {
        self.with(|inner| {
            let res = inner.tx.push(byte);
            inner.update_tx_interrupt();
            res
        })
    }

    /// TX buffer drained and the last byte on the wire.
    pub(crate) fn is_tx_idle(&self) -> bool {
        self.with(|inner| inner.tx.is_empty() && inner.uart.is_transmit_complete())
    }

    pub fn is_rx_ready(&self) -> bool {
        self.with(|inner| !inner.rx.is_empty())
    }

    pub fn is_tx_ready(&self) -> bool {
        self.with(|inner| !inner.tx.is_full())
    }

    pub fn rx_len(&self) -> usize {
        self.with(|inner| inner.rx.len())
    }

    pub fn tx_len(&self) -> usize {
        self.with(|inner| inner.tx.len())
    }

    pub fn clear_receive_buffer(&self) {
        self.with(|inner| {
            inner.rx.clear();
            inner.rx_fault = false;
            inner.update_rts();
        });
    }

    /// Drop every byte still waiting to go out.
    pub fn clear_transmit_buffer(&self) {
        self.with(|inner| {
            inner.tx.clear();
            inner.update_tx_interrupt();
        });
    }

    pub(crate) fn take_rx_fault(&self) -> bool {
        self.with(|inner| core::mem::take(&mut inner.rx_fault))
    }

    pub fn register_callback(
        &self,
        identifier: &str,
        callback: fn(&[u8]),
        discard_payload: bool,
    ) -> Result<(), Error> {
        self.with(|inner| {
            inner
                .registry
                .register(identifier, Handler::Callback(callback), discard_payload)
        })
        .map(|_| ())
    }

    pub fn unregister_callback(&self, identifier: &str) {
        self.with(|inner| inner.registry.unregister(identifier));
    }

    /// Route `identifier` to the capture slot, returning what it displaced.
    pub(crate) fn arm_capture(&self, identifier: &str) -> Result<Option<Registration>, Error> {
        self.with(|inner| {
            inner.capture = None;
            inner.registry.register(identifier, Handler::Capture, true)
        })
    }

    pub(crate) fn take_capture(&self) -> Option<Payload> {
        self.with(|inner| inner.capture.take())
    }

    pub(crate) fn disarm_capture(&self, identifier: &str, previous: Option<Registration>) {
        self.with(|inner| {
            inner.registry.unregister(identifier);
            inner.capture = None;
            if let Some(previous) = previous {
                // The slot was just freed, so this cannot run out of room.
                let _ = inner.registry.restore(previous);
            }
        });
    }

    pub fn set_critical_section(&self, active: bool) {
        self.with(|inner| {
            inner.critical_section = active;
            inner.update_rts();
        });
    }

    pub fn set_power_save_mode(&self, mode: PowerSaveMode, ring_callback: Option<fn()>) {
        self.with(|inner| {
            match mode {
                PowerSaveMode::Enabled => {
                    inner.power_save = true;
                    inner.ring_callback = ring_callback;
                }
                PowerSaveMode::Disabled => {
                    inner.power_save = false;
                    inner.ring_callback = None;
                }
            }
            inner.update_rts();
        });
    }

    pub fn power_save_mode(&self) -> PowerSaveMode {
        if self.with(|inner| inner.power_save) {
            PowerSaveMode::Enabled
        } else {
            PowerSaveMode::Disabled
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::*;
    use crate::urc::ParserState;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (TestTransport, Wire) {
        let wire = Wire::default();
        (wire.transport(), wire)
    }

    #[test]
    fn rts_released_near_full() {
        let (transport, wire) = setup();
        transport.enable();
        assert_eq!(wire.rts(), PinState::Low);

        for _ in 0..(RX_BUFFER_SIZE - 3) {
            transport.on_receive(b'a');
        }
        assert_eq!(wire.rts(), PinState::Low);

        transport.on_receive(b'a');
        assert_eq!(transport.rx_len(), RX_BUFFER_SIZE - 2);
        assert_eq!(wire.rts(), PinState::High);

        transport.read_byte();
        assert_eq!(wire.rts(), PinState::Low);
    }

    #[test]
    fn overrun_latches_fault() {
        let (transport, _wire) = setup();
        transport.enable();
        for _ in 0..(RX_BUFFER_SIZE + 4) {
            transport.on_receive(b'x');
        }
        assert_eq!(transport.rx_len(), RX_BUFFER_SIZE);
        assert!(transport.take_rx_fault());
        assert!(!transport.take_rx_fault());

        transport.on_receive_error();
        transport.clear_receive_buffer();
        assert!(!transport.take_rx_fault());
        assert_eq!(transport.rx_len(), 0);
    }

    #[test]
    fn overrun_abandons_partial_urc() {
        let (transport, _wire) = setup();
        transport.enable();
        transport.register_callback("CEREG", |_| {}, true).unwrap();

        for _ in 0..(RX_BUFFER_SIZE - 3) {
            transport.on_receive(b'a');
        }
        for &byte in b"+CE" {
            transport.on_receive(byte);
        }
        assert_eq!(
            transport.with(|inner| inner.parser.state()),
            ParserState::ParsingIdentifier
        );

        transport.on_receive(b'R');
        assert_eq!(transport.with(|inner| inner.parser.state()), ParserState::Idle);
        assert_eq!(transport.rx_len(), RX_BUFFER_SIZE);
        assert!(transport.take_rx_fault());
    }

    #[test]
    fn critical_section_and_power_save_hold_rts() {
        let (transport, wire) = setup();
        transport.enable();

        transport.set_critical_section(true);
        assert_eq!(wire.rts(), PinState::High);
        transport.on_receive(b'a');
        transport.read_byte();
        assert_eq!(wire.rts(), PinState::High);
        transport.set_critical_section(false);
        assert_eq!(wire.rts(), PinState::Low);

        transport.set_power_save_mode(PowerSaveMode::Enabled, None);
        assert_eq!(wire.rts(), PinState::High);
        assert_eq!(transport.power_save_mode(), PowerSaveMode::Enabled);
        transport.set_power_save_mode(PowerSaveMode::Disabled, None);
        assert_eq!(wire.rts(), PinState::Low);
    }

    static RINGS: AtomicUsize = AtomicUsize::new(0);

    fn on_ring() {
        RINGS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn ring_callback_only_in_power_save() {
        let (transport, _wire) = setup();
        transport.enable();
        let before = RINGS.load(Ordering::SeqCst);

        transport.on_ring();
        transport.set_power_save_mode(PowerSaveMode::Enabled, Some(on_ring));
        transport.on_ring();
        transport.set_power_save_mode(PowerSaveMode::Disabled, Some(on_ring));
        transport.on_ring();

        assert_eq!(RINGS.load(Ordering::SeqCst) - before, 1);
    }

    #[test]
    fn transmit_follows_cts() {
        let (transport, wire) = setup();
        transport.enable();
        assert!(!wire.tx_interrupt());

        wire.set_cts(PinState::High);
        transport.queue_byte(b'A').unwrap();
        transport.queue_byte(b'T').unwrap();
        assert!(!wire.tx_interrupt());

        // Missed CTS edge, picked up by the reconciliation poll.
        wire.set_cts(PinState::Low);
        assert!(!wire.tx_interrupt());
        transport.cts_update();
        assert!(wire.tx_interrupt());

        transport.on_transmit_ready();
        wire.set_cts(PinState::High);
        transport.on_cts_change();
        assert!(!wire.tx_interrupt());
        transport.on_transmit_ready();
        assert_eq!(wire.sent(), b"A");

        wire.set_cts(PinState::Low);
        transport.on_cts_change();
        transport.on_transmit_ready();
        assert_eq!(wire.sent(), b"AT");
        assert!(!wire.tx_interrupt());
        assert!(transport.is_tx_idle());
    }

    thread_local! {
        static DISPATCH_RTS: core::cell::RefCell<std::vec::Vec<PinState>> =
            core::cell::RefCell::new(std::vec::Vec::new());
        static DISPATCH_WIRE: core::cell::RefCell<Option<Wire>> =
            core::cell::RefCell::new(None);
    }

    fn record_rts(_payload: &[u8]) {
        DISPATCH_WIRE.with(|w| {
            if let Some(wire) = w.borrow().as_ref() {
                DISPATCH_RTS.with(|r| r.borrow_mut().push(wire.rts()));
            }
        });
    }

    #[test]
    fn handler_runs_with_rts_released() {
        let (transport, wire) = setup();
        DISPATCH_WIRE.with(|w| *w.borrow_mut() = Some(wire.clone()));
        transport.enable();
        transport.register_callback("FOO", record_rts, true).unwrap();

        for &b in b"+FOO: 1\r\n" {
            transport.on_receive(b);
        }

        DISPATCH_RTS.with(|r| assert_eq!(*r.borrow(), [PinState::High]));
        assert_eq!(wire.rts(), PinState::Low);
        assert_eq!(transport.rx_len(), 0);
    }

    #[test]
    fn capture_restores_previous_registration() {
        let (transport, _wire) = setup();
        transport.enable();
        transport.register_callback("CEREG", record_rts, false).unwrap();

        let previous = transport.arm_capture("CEREG").unwrap();
        assert!(previous.is_some());
        for &b in b"+CEREG: 5\r\n" {
            transport.on_receive(b);
        }
        assert_eq!(transport.take_capture().unwrap().as_slice(), b"5");
        transport.disarm_capture("CEREG", previous);

        // Back to the original, non-discarding callback.
        for &b in b"+CEREG: 1\r\n" {
            transport.on_receive(b);
        }
        assert!(transport.take_capture().is_none());
        assert_eq!(transport.rx_len(), b"+CEREG: 1\r\n".len());
    }

    #[test]
    fn disable_resets_state() {
        let (transport, wire) = setup();
        transport.enable();
        assert!(wire.uart_enabled());
        transport.on_receive(b'x');
        transport.set_critical_section(true);

        transport.disable();
        assert!(!transport.is_enabled());
        assert!(!wire.uart_enabled());
        assert_eq!(wire.rts(), PinState::High);
        assert_eq!(transport.rx_len(), 0);

        transport.enable();
        assert_eq!(wire.rts(), PinState::Low);
    }
}

//! RTS/CTS policy.
//!
//! Neither direction stores any state of its own: the line levels are a pure
//! function of buffer occupancy and the overrides held by the transport.

use embedded_hal::digital::PinState;

/// Bytes kept free in the RX buffer once RTS is released, for bytes the
/// modem already had in flight.
pub const RX_HEADROOM: usize = 2;

/// Inputs to the "ready to receive" output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inbound {
    pub rx_count: usize,
    pub rx_capacity: usize,
    /// Foreground declared a span where no data may arrive.
    pub critical_section: bool,
    /// The modem was put to sleep and must not be woken by us.
    pub power_save: bool,
    /// A notification handler is running.
    pub dispatching: bool,
}

impl Inbound {
    pub fn suppressed(&self) -> bool {
        self.critical_section || self.power_save || self.dispatching
    }

    pub fn ready(&self) -> bool {
        !self.suppressed() && self.rx_count < self.rx_capacity.saturating_sub(RX_HEADROOM)
    }

    /// RTS is active low.
    pub fn rts_state(&self) -> PinState {
        if self.ready() {
            PinState::Low
        } else {
            PinState::High
        }
    }
}

/// Inputs to the transmit-data-empty interrupt enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    pub peer_clear_to_send: bool,
    pub tx_count: usize,
}

impl Outbound {
    pub fn tx_interrupt_enabled(&self) -> bool {
        self.peer_clear_to_send && self.tx_count > 0
    }
}

/// CTS is active low.
pub fn clear_to_send(cts: PinState) -> bool {
    cts == PinState::Low
}

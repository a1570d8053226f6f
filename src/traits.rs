/// The board's UART peripheral, as seen by the transport.
///
/// Implementations only touch registers. Receiving is push based: the
/// board's RX-complete interrupt reads the data register and hands the byte
/// to [`Transport::on_receive`](crate::Transport::on_receive).
pub trait Uart {
    /// Enable the receiver, transmitter and the RX-complete interrupt.
    fn enable(&mut self);

    fn disable(&mut self);

    /// Write one byte to the transmit data register.
    fn write(&mut self, byte: u8);

    /// Enable or disable the data-register-empty interrupt, whose handler must
    /// call [`Transport::on_transmit_ready`](crate::Transport::on_transmit_ready).
    fn set_tx_interrupt(&mut self, enabled: bool);

    /// The last byte has left the shift register.
    fn is_transmit_complete(&mut self) -> bool;
}

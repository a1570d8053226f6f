#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow_control;
pub mod response;
pub mod retry;
pub mod ring_buffer;
pub mod traits;
pub mod transport;
pub mod urc;

#[cfg(test)]
mod test_helpers;

pub use atat;
pub use heapless;

pub use config::{Config, NoPin, ReverseInputPin, ReverseOutputPin};
pub use controller::Controller;
pub use error::Error;
pub use response::{extract_field, extract_field_into, unquote, ResponseResult};
pub use retry::RetryPolicy;
pub use ring_buffer::ByteRingBuffer;
pub use traits::Uart;
pub use transport::{PowerSaveMode, Transport};

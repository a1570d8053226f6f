use atat::helpers::LossyStr;
use heapless::Vec;

use super::registry::{Handler, UrcRegistry, URC_IDENTIFIER_BUFFER_SIZE};
use crate::ring_buffer::ByteRingBuffer;

/// Largest payload delivered to a handler. Longer payloads are truncated.
pub const URC_DATA_BUFFER_SIZE: usize = 256;

pub const URC_IDENTIFIER_START_CHARACTER: u8 = b'+';
pub const URC_IDENTIFIER_END_CHARACTER: u8 = b':';
pub const CARRIAGE_RETURN: u8 = b'\r';
pub const LINE_FEED: u8 = b'\n';
const SPACE: u8 = b' ';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParserState {
    Idle,
    EvaluatingIdentifierStart,
    ParsingIdentifier,
    ParsingPayload,
}

/// A fully parsed notification, ready for dispatch.
#[derive(Debug, PartialEq)]
pub struct Notification {
    pub handler: Handler,
    pub payload: Vec<u8, URC_DATA_BUFFER_SIZE>,
}

#[derive(Debug, Clone, Copy)]
struct Matched {
    handler: Handler,
    discard_payload: bool,
}

/// Incremental URC classifier, fed every received byte from the RX interrupt.
///
/// The byte has already been pushed into the RX buffer when [`process`] sees
/// it. Bytes belonging to a notification registered with `discard_payload`
/// are retracted from the buffer again, so the response reader never sees
/// them.
///
/// [`process`]: UrcParser::process
#[derive(Debug)]
pub struct UrcParser {
    state: ParserState,
    identifier: Vec<u8, URC_IDENTIFIER_BUFFER_SIZE>,
    payload: Vec<u8, URC_DATA_BUFFER_SIZE>,
    /// Payload bytes pushed to the RX buffer, including skipped and truncated ones.
    payload_consumed: usize,
    truncated: bool,
    matched: Option<Matched>,
    /// A discarded notification ended on `\r`; drop the `\n` that follows.
    swallow_line_feed: bool,
}

impl Default for UrcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UrcParser {
    pub const fn new() -> Self {
        Self {
            state: ParserState::Idle,
            identifier: Vec::new(),
            payload: Vec::new(),
            payload_consumed: 0,
            truncated: false,
            matched: None,
            swallow_line_feed: false,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.identifier.clear();
        self.payload.clear();
        self.payload_consumed = 0;
        self.truncated = false;
        self.matched = None;
        self.swallow_line_feed = false;
    }

    pub fn process<const RX: usize, const R: usize>(
        &mut self,
        byte: u8,
        rx: &mut ByteRingBuffer<RX>,
        registry: &UrcRegistry<R>,
    ) -> Option<Notification> {
        if core::mem::take(&mut self.swallow_line_feed) && byte == LINE_FEED {
            rx.retract(1);
            return None;
        }

        match self.state {
            ParserState::Idle => {
                if byte == URC_IDENTIFIER_START_CHARACTER {
                    self.identifier.clear();
                    self.state = ParserState::EvaluatingIdentifierStart;
                }
                None
            }
            ParserState::EvaluatingIdentifierStart => {
                // "+12..." is a signed numeric field, not a notification.
                if byte.is_ascii_digit() {
                    self.state = ParserState::Idle;
                } else {
                    self.parse_identifier(byte, rx, registry);
                }
                None
            }
            ParserState::ParsingIdentifier => {
                self.parse_identifier(byte, rx, registry);
                None
            }
            ParserState::ParsingPayload => self.parse_payload(byte, rx),
        }
    }

    fn parse_identifier<const RX: usize, const R: usize>(
        &mut self,
        byte: u8,
        rx: &mut ByteRingBuffer<RX>,
        registry: &UrcRegistry<R>,
    ) {
        if byte != URC_IDENTIFIER_END_CHARACTER && byte != CARRIAGE_RETURN {
            self.state = if self.identifier.push(byte).is_ok() {
                ParserState::ParsingIdentifier
            } else {
                ParserState::Idle
            };
            return;
        }

        let Some(registration) = registry.find(&self.identifier) else {
            self.state = ParserState::Idle;
            return;
        };

        trace!("Matched URC {:?}", LossyStr(&self.identifier));

        // Start and end marker plus the identifier itself.
        let discard_payload =
            registration.discard_payload && rx.retract(self.identifier.len() + 2);
        if registration.discard_payload && !discard_payload {
            warn!(
                "URC {:?} already partly read, leaving it in the buffer",
                LossyStr(&self.identifier)
            );
        }

        self.matched = Some(Matched {
            handler: registration.handler,
            discard_payload,
        });
        self.payload.clear();
        self.payload_consumed = 0;
        self.truncated = false;
        self.state = ParserState::ParsingPayload;
    }

    fn parse_payload<const RX: usize>(
        &mut self,
        byte: u8,
        rx: &mut ByteRingBuffer<RX>,
    ) -> Option<Notification> {
        if byte != CARRIAGE_RETURN && byte != LINE_FEED {
            self.payload_consumed += 1;
            if byte == SPACE && self.payload_consumed == 1 {
                return None;
            }
            if self.payload.push(byte).is_err() && !self.truncated {
                self.truncated = true;
                warn!("URC payload exceeds {} bytes, truncating", URC_DATA_BUFFER_SIZE);
            }
            return None;
        }

        self.state = ParserState::Idle;
        let matched = self.matched.take()?;

        if matched.discard_payload {
            if rx.retract(self.payload_consumed + 1) {
                self.swallow_line_feed = byte == CARRIAGE_RETURN;
            } else {
                warn!("URC payload already partly read, leaving it in the buffer");
            }
        }

        Some(Notification {
            handler: matched.handler,
            payload: core::mem::take(&mut self.payload),
        })
    }
}

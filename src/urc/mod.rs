//! Unsolicited result codes: lines like `+CEREG: 5` that the modem sends on
//! its own, interleaved with command responses.

mod parser;
mod registry;

pub use parser::{
    Notification, ParserState, UrcParser, URC_DATA_BUFFER_SIZE, URC_IDENTIFIER_END_CHARACTER,
    URC_IDENTIFIER_START_CHARACTER,
};
pub use registry::{
    Handler, Registration, UrcRegistry, MAX_URC_CALLBACKS, URC_IDENTIFIER_BUFFER_SIZE,
};

//! V.25ter control commands

pub mod types;

use atat::atat_derive::AtatCmd;
use types::Echo;

use super::NoResponse;

/// Command echo E
///
/// With echo on, the modem repeats every command before its response. The
/// controller expects it off.
#[derive(Clone, AtatCmd)]
#[at_cmd("E", NoResponse, value_sep = false)]
pub struct SetEcho {
    #[at_arg(position = 0)]
    pub enabled: Echo,
}

//! Mobile equipment control and status

pub mod responses;
pub mod types;

use atat::atat_derive::AtatCmd;
use responses::ModuleFunctionality;
use types::{Functionality, ResetMode};

use super::NoResponse;

/// Set phone functionality +CFUN
///
/// Switching the radio on or off can take a while on a cold modem.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CFUN", NoResponse, attempts = 1, timeout_ms = 15000)]
pub struct SetModuleFunctionality {
    #[at_arg(position = 0)]
    pub fun: Functionality,
    #[at_arg(position = 1)]
    pub rst: Option<ResetMode>,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CFUN?", ModuleFunctionality)]
pub struct GetModuleFunctionality;

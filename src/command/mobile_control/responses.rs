//! Responses for mobile equipment control commands
use super::types::Functionality;
use atat::atat_derive::AtatResp;

/// Set phone functionality +CFUN
#[derive(Debug, Clone, PartialEq, Eq, AtatResp)]
pub struct ModuleFunctionality {
    #[at_arg(position = 0)]
    pub fun: Functionality,
}

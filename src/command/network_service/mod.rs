//! Network service

pub mod responses;
pub mod types;

use atat::atat_derive::AtatCmd;
use responses::EPSNetworkRegistrationStatus;
use types::EPSNetworkRegistrationUrcConfig;

use super::NoResponse;

/// Identifier of the EPS registration notification.
pub const CEREG: &str = "CEREG";

/// EPS network registration status +CEREG
///
/// Configures the `+CEREG` notification. With <n>=1 the modem reports
/// `+CEREG: <stat>` on every registration change; higher values add the
/// location, reject cause and assigned PSM timers.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CEREG", NoResponse)]
pub struct SetEPSNetworkRegistrationStatus {
    #[at_arg(position = 0)]
    pub n: EPSNetworkRegistrationUrcConfig,
}

#[derive(Clone, AtatCmd)]
#[at_cmd("+CEREG?", EPSNetworkRegistrationStatus)]
pub struct GetEPSNetworkRegistrationStatus;

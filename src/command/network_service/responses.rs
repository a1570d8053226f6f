//! Responses for network service commands
use super::types::{EPSNetworkRegistrationStat, EPSNetworkRegistrationUrcConfig};
use atat::atat_derive::AtatResp;
use heapless::String;

/// EPS network registration status +CEREG
///
/// Reject causes and PSM timers reported with <n>=3 and above are not
/// decoded; pull them out of the raw line with
/// [`extract_field`](crate::extract_field) when needed.
#[derive(Debug, Clone, PartialEq, Eq, AtatResp)]
pub struct EPSNetworkRegistrationStatus {
    #[at_arg(position = 0)]
    pub n: EPSNetworkRegistrationUrcConfig,
    #[at_arg(position = 1)]
    pub stat: EPSNetworkRegistrationStat,
    /// Tracking area code, hex
    #[at_arg(position = 2)]
    pub tac: Option<String<4>>,
    /// E-UTRAN cell id, hex
    #[at_arg(position = 3)]
    pub ci: Option<String<8>>,
    #[at_arg(position = 4)]
    pub act: Option<u8>,
}

//! Argument and parameter types used by network service commands
use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EPSNetworkRegistrationUrcConfig {
    /// 0: notification disabled
    UrcDisabled = 0,
    /// 1: `+CEREG: <stat>`
    UrcEnabled = 1,
    /// 2: `+CEREG: <stat>[,[<tac>],[<ci>],[<AcT>]]`
    UrcVerbose = 2,
    /// 3: as 2, plus the reject cause
    UrcExtended = 3,
    /// 4: as 2, plus the assigned PSM timers
    UrcPsm = 4,
    /// 5: everything
    UrcPsmExtended = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EPSNetworkRegistrationStat {
    NotRegistered = 0,
    Registered = 1,
    Searching = 2,
    RegistrationDenied = 3,
    Unknown = 4,
    RegisteredRoaming = 5,
    EmergencyOnly = 8,
}

impl EPSNetworkRegistrationStat {
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Registered | Self::RegisteredRoaming)
    }
}

//! Argument and parameter types used by mobile equipment control commands
use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Functionality {
    /// 0: RF off, SIM powered down
    Minimum = 0,
    /// 1: full functionality
    Full = 1,
    /// 4: RF off, SIM still accessible
    AirplaneMode = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetMode {
    DontReset = 0,
    Reset = 1,
}

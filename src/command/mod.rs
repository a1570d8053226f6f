//! AT commands for the Sequans Monarch family
//!
//! Only what the controller needs to bring the link up and watch network
//! registration. Collaborators define their own commands the same way and
//! exchange them through [`Controller::send`](crate::Controller::send).

pub mod control;
pub mod mobile_control;
pub mod network_service;

use atat::atat_derive::{AtatCmd, AtatResp};

/// Notification the modem sends once its firmware has booted.
pub const SYSSTART: &str = "SYSSTART";

#[derive(Debug, Clone, PartialEq, Eq, AtatResp)]
pub struct NoResponse;

#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse)]
pub struct AT;

#[cfg(test)]
pub(crate) mod test {
    use atat::AtatCmd;

    /// The bytes a command puts on the wire, without its terminator.
    pub(crate) fn rendered<Cmd: AtatCmd>(cmd: &Cmd) -> std::string::String {
        let mut buf = [0u8; 256];
        let len = cmd.write(&mut buf);
        std::string::String::from_utf8_lossy(&buf[..len])
            .trim_end()
            .to_owned()
    }

    #[test]
    fn at_is_bare() {
        assert_eq!(rendered(&super::AT), "AT");
    }
}

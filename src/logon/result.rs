//! Status byte of the logon challenge and proof responses.

use std::fmt::{Display, Formatter};

/// Logon status as sent by the server.
///
/// Codes without a variant are kept in [`LogonResult::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogonResult {
    Success,
    FailUnknown0,
    FailUnknown1,
    FailBanned,
    FailUnknownAccount,
    FailIncorrectPassword,
    FailAlreadyOnline,
    FailNoTime,
    FailDbBusy,
    FailVersionInvalid,
    FailVersionUpdate,
    FailInvalidServer,
    FailSuspended,
    FailNoAccess,
    SuccessSurvey,
    FailParentControl,
    FailLockedEnforced,
    FailTrialEnded,
    FailUseBattlenet,
    FailAntiIndulgence,
    FailExpired,
    FailNoGameAccount,
    FailChargeback,
    FailInternetGameRoomWithoutBnet,
    FailGameAccountLocked,
    FailUnlockableLock,
    FailConversionRequired,
    FailDisconnected,
    Unknown(u8),
}

impl LogonResult {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::FailUnknown0,
            0x02 => Self::FailUnknown1,
            0x03 => Self::FailBanned,
            0x04 => Self::FailUnknownAccount,
            0x05 => Self::FailIncorrectPassword,
            0x06 => Self::FailAlreadyOnline,
            0x07 => Self::FailNoTime,
            0x08 => Self::FailDbBusy,
            0x09 => Self::FailVersionInvalid,
            0x0A => Self::FailVersionUpdate,
            0x0B => Self::FailInvalidServer,
            0x0C => Self::FailSuspended,
            0x0D => Self::FailNoAccess,
            0x0E => Self::SuccessSurvey,
            0x0F => Self::FailParentControl,
            0x10 => Self::FailLockedEnforced,
            0x11 => Self::FailTrialEnded,
            0x12 => Self::FailUseBattlenet,
            0x13 => Self::FailAntiIndulgence,
            0x14 => Self::FailExpired,
            0x15 => Self::FailNoGameAccount,
            0x16 => Self::FailChargeback,
            0x17 => Self::FailInternetGameRoomWithoutBnet,
            0x18 => Self::FailGameAccountLocked,
            0x19 => Self::FailUnlockableLock,
            0x20 => Self::FailConversionRequired,
            0xFF => Self::FailDisconnected,
            v => Self::Unknown(v),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::FailUnknown0 => 0x01,
            Self::FailUnknown1 => 0x02,
            Self::FailBanned => 0x03,
            Self::FailUnknownAccount => 0x04,
            Self::FailIncorrectPassword => 0x05,
            Self::FailAlreadyOnline => 0x06,
            Self::FailNoTime => 0x07,
            Self::FailDbBusy => 0x08,
            Self::FailVersionInvalid => 0x09,
            Self::FailVersionUpdate => 0x0A,
            Self::FailInvalidServer => 0x0B,
            Self::FailSuspended => 0x0C,
            Self::FailNoAccess => 0x0D,
            Self::SuccessSurvey => 0x0E,
            Self::FailParentControl => 0x0F,
            Self::FailLockedEnforced => 0x10,
            Self::FailTrialEnded => 0x11,
            Self::FailUseBattlenet => 0x12,
            Self::FailAntiIndulgence => 0x13,
            Self::FailExpired => 0x14,
            Self::FailNoGameAccount => 0x15,
            Self::FailChargeback => 0x16,
            Self::FailInternetGameRoomWithoutBnet => 0x17,
            Self::FailGameAccountLocked => 0x18,
            Self::FailUnlockableLock => 0x19,
            Self::FailConversionRequired => 0x20,
            Self::FailDisconnected => 0xFF,
            Self::Unknown(v) => v,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The server rejected the client version rather than the account.
    pub const fn is_version_mismatch(self) -> bool {
        matches!(self, Self::FailVersionInvalid | Self::FailVersionUpdate)
    }

    /// Text that can be shown to the user.
    pub fn message(self) -> String {
        let s = match self {
            Self::Success => "Success",
            Self::FailUnknown0 => "Unknown error (0x01)",
            Self::FailUnknown1 => "Unknown error (0x02)",
            Self::FailBanned => "This account has been banned",
            Self::FailUnknownAccount => "Account not found - check your username",
            Self::FailIncorrectPassword => "Incorrect password",
            Self::FailAlreadyOnline => "This account is already logged in",
            Self::FailNoTime => "Account out of credit/time",
            Self::FailDbBusy => "Server is busy - try again later",
            Self::FailVersionInvalid => "Version mismatch - this client is WotLK 3.3.5a (build 12340). The server requires a different client version",
            Self::FailVersionUpdate => "Client update required - the server expects a different build version. This client only supports WotLK 3.3.5a (build 12340)",
            Self::FailInvalidServer => "Invalid server",
            Self::FailSuspended => "This account has been suspended",
            Self::FailNoAccess => "Access denied",
            Self::SuccessSurvey => "Survey required",
            Self::FailParentControl => "Blocked by parental controls",
            Self::FailLockedEnforced => "Account locked - check your email",
            Self::FailTrialEnded => "Trial period has expired",
            Self::FailUseBattlenet => "Battle.net error",
            Self::FailAntiIndulgence => "Play time limit reached",
            Self::FailExpired => "Account subscription has expired",
            Self::FailNoGameAccount => "No game account is attached to this login",
            Self::FailChargeback => "Account locked due to a chargeback",
            Self::FailInternetGameRoomWithoutBnet => {
                "Internet game room play requires a Battle.net account"
            }
            Self::FailGameAccountLocked => "This game account has been locked",
            Self::FailUnlockableLock => "This account is locked and can not be unlocked",
            Self::FailConversionRequired => "Account conversion required",
            Self::FailDisconnected => "Disconnected by the server",
            Self::Unknown(code) => {
                return format!("Server rejected login (error code 0x{:02X})", code);
            }
        };

        s.to_string()
    }
}

impl From<u8> for LogonResult {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

impl Display for LogonResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

#[cfg(test)]
mod test {
    use crate::logon::result::LogonResult;

    #[test]
    fn known_codes_round_trip() {
        for v in (0x00..=0x19).chain([0x20, 0xFF]) {
            let result = LogonResult::from_u8(v);
            assert!(!matches!(result, LogonResult::Unknown(_)), "0x{:02X}", v);
            assert_eq!(result.as_u8(), v);
        }
    }

    #[test]
    fn messages() {
        assert_eq!(LogonResult::from_u8(0x05).message(), "Incorrect password");
        assert_eq!(
            LogonResult::from_u8(0x04).message(),
            "Account not found - check your username"
        );
        assert!(LogonResult::from_u8(0x09).is_version_mismatch());
        assert!(LogonResult::from_u8(0x00).is_success());
    }

    #[test]
    fn unknown_code_uses_template() {
        assert_eq!(LogonResult::from_u8(0x1A), LogonResult::Unknown(0x1A));
        assert_eq!(
            LogonResult::from_u8(0x42).message(),
            "Server rejected login (error code 0x42)"
        );
    }
}

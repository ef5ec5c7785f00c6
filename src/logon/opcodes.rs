//! First byte of every [Login Packet](https://wowdev.wiki/Login_Packet).

use std::fmt::{Display, Formatter};

/// Logon message opcode. Direction is implied by who sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogonOpcode {
    LogonChallenge,
    LogonProof,
    /// Not used by this client.
    ReconnectChallenge,
    /// Not used by this client.
    ReconnectProof,
    /// Client to server only.
    Authenticator,
    RealmList,
}

impl LogonOpcode {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::LogonChallenge => 0x00,
            Self::LogonProof => 0x01,
            Self::ReconnectChallenge => 0x02,
            Self::ReconnectProof => 0x03,
            Self::Authenticator => 0x04,
            Self::RealmList => 0x10,
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::LogonChallenge,
            0x01 => Self::LogonProof,
            0x02 => Self::ReconnectChallenge,
            0x03 => Self::ReconnectProof,
            0x04 => Self::Authenticator,
            0x10 => Self::RealmList,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::LogonChallenge => "LOGON_CHALLENGE",
            Self::LogonProof => "LOGON_PROOF",
            Self::ReconnectChallenge => "RECONNECT_CHALLENGE",
            Self::ReconnectProof => "RECONNECT_PROOF",
            Self::Authenticator => "AUTHENTICATOR",
            Self::RealmList => "REALM_LIST",
        }
    }
}

impl Display for LogonOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

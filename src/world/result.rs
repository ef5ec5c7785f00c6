//! Result byte of `SMSG_AUTH_RESPONSE`.

use std::fmt::{Display, Formatter};

/// World authentication result.
///
/// Codes without a variant are kept in [`WorldAuthResult::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldAuthResult {
    Ok,
    Failed,
    Reject,
    BadServerProof,
    Unavailable,
    SystemError,
    BillingError,
    BillingExpired,
    VersionMismatch,
    UnknownAccount,
    IncorrectPassword,
    SessionExpired,
    ServerShuttingDown,
    AlreadyLoggingIn,
    LoginServerNotFound,
    WaitQueue,
    Banned,
    AlreadyOnline,
    NoTime,
    DbBusy,
    Suspended,
    ParentalControl,
    LockedEnforced,
    Unknown(u8),
}

const TABLE: [(u8, WorldAuthResult, &str); 23] = [
    (0x0C, WorldAuthResult::Ok, "OK - Authentication successful"),
    (0x0D, WorldAuthResult::Failed, "FAILED - Authentication failed"),
    (0x0E, WorldAuthResult::Reject, "REJECT - Connection rejected"),
    (0x0F, WorldAuthResult::BadServerProof, "BAD_SERVER_PROOF - Invalid server proof"),
    (0x10, WorldAuthResult::Unavailable, "UNAVAILABLE - Server unavailable"),
    (0x11, WorldAuthResult::SystemError, "SYSTEM_ERROR - System error occurred"),
    (0x12, WorldAuthResult::BillingError, "BILLING_ERROR - Billing error"),
    (0x13, WorldAuthResult::BillingExpired, "BILLING_EXPIRED - Subscription expired"),
    (0x14, WorldAuthResult::VersionMismatch, "VERSION_MISMATCH - Client version mismatch"),
    (0x15, WorldAuthResult::UnknownAccount, "UNKNOWN_ACCOUNT - Account not found"),
    (0x16, WorldAuthResult::IncorrectPassword, "INCORRECT_PASSWORD - Wrong password"),
    (0x17, WorldAuthResult::SessionExpired, "SESSION_EXPIRED - Session has expired"),
    (0x18, WorldAuthResult::ServerShuttingDown, "SERVER_SHUTTING_DOWN - Server is shutting down"),
    (0x19, WorldAuthResult::AlreadyLoggingIn, "ALREADY_LOGGING_IN - Already logging in"),
    (0x1A, WorldAuthResult::LoginServerNotFound, "LOGIN_SERVER_NOT_FOUND - Can't contact login server"),
    (0x1B, WorldAuthResult::WaitQueue, "WAIT_QUEUE - Waiting in queue"),
    (0x1C, WorldAuthResult::Banned, "BANNED - Account is banned"),
    (0x1D, WorldAuthResult::AlreadyOnline, "ALREADY_ONLINE - Character already logged in"),
    (0x1E, WorldAuthResult::NoTime, "NO_TIME - No game time remaining"),
    (0x1F, WorldAuthResult::DbBusy, "DB_BUSY - Database is busy"),
    (0x20, WorldAuthResult::Suspended, "SUSPENDED - Account is suspended"),
    (0x21, WorldAuthResult::ParentalControl, "PARENTAL_CONTROL - Parental controls active"),
    (0x22, WorldAuthResult::LockedEnforced, "LOCKED_ENFORCED - Account is locked"),
];

impl WorldAuthResult {
    pub fn from_u8(value: u8) -> Self {
        TABLE
            .iter()
            .find(|(v, _, _)| *v == value)
            .map_or(Self::Unknown(value), |(_, result, _)| *result)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unknown(v) => v,
            known => TABLE
                .iter()
                .find(|(_, result, _)| *result == known)
                .map_or(0, |(v, _, _)| *v),
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Text that can be shown to the user.
    pub fn message(self) -> String {
        match self {
            Self::Unknown(code) => format!("Server rejected login (error code 0x{:02X})", code),
            known => TABLE
                .iter()
                .find(|(_, result, _)| *result == known)
                .map_or_else(String::new, |(_, _, message)| (*message).to_string()),
        }
    }
}

impl Display for WorldAuthResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

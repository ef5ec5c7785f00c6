//! Logon server protocol: the [codec](packets), the [status table](result) and the
//! [session](session) that drives SRP6 over it.
//!
//! The logon server speaks plaintext over TCP, usually on port 3724. A client sends the
//! account name in a challenge, proves the password with SRP6 and then asks for the realm
//! list. The resulting session key is what the world session is keyed with.

pub mod opcodes;
pub mod packets;
pub mod result;
pub mod session;

pub use opcodes::LogonOpcode;
pub use packets::{Realm, RealmType, SecurityFlags};
pub use result::LogonResult;
pub use session::{LogonSession, LogonState, AUTHENTICATION_TIMEOUT};

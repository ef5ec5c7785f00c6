//! World server protocol: [opcodes], [packet bodies](packets), [framing] and the
//! [session](session).
//!
//! The world session is keyed with the [`SessionKey`](crate::key::SessionKey) from the logon
//! session and connects to the address of a [`Realm`](crate::logon::Realm).

pub mod framing;
pub mod opcodes;
pub mod packets;
pub mod result;
pub mod session;

pub use framing::WorldFramer;
pub use packets::{Character, CharacterEquipment, LoginVerifyWorld};
pub use result::WorldAuthResult;
pub use session::{Outbox, WorldSession, WorldState};

//! Client protocol core for World of Warcraft logon and world servers.
//! It targets 3.3.5a (build 12340) and keeps 1.12 and 2.4.3 working where their wire
//! formats differ.
//!
//! The crate takes an account name and password, runs the game's flavor of SRP6 against a
//! logon server, fetches the realm list and then opens an authenticated, header encrypted
//! session with a world server. The world session hands out decoded packets and accepts
//! outgoing ones. What those packets mean is up to the consumer.
//!
//! **THIS SHOULD NOT BE USED FOR ANYTHING OTHER THAN WORLD OF WARCRAFT EMULATION.
//! THE CODE IS NOT CRYPTOGRAPHICALLY VERIFIED, HAS VERY LOW KEY SIZES BECAUSE OF
//! PACKET REQUIREMENTS AND MOST LIKELY CONTAINS EXPLOITS.**
//!
//! # Usage
//!
//! The crate is split into:
//! * A [`logon`] module with the logon server codec and [`LogonSession`].
//! * A [`world`] module with world framing and [`WorldSession`].
//! * A [`client`] module with the SRP6 typestate used by the logon session.
//! * A [`header_crypto`] module with the two generations of world header cipher.
//! * A [`transport`] module with the non-blocking byte streams the sessions run over.
//! * [`config`] and [`error`] modules shared by everything else.
//!
//! Both sessions are driven by calling `update` on a regular cadence. Nothing blocks and no
//! threads are spawned; callbacks run inside `update` in the order packets arrive.
//!
//! ```no_run
//! use wow_session::client::Credentials;
//! use wow_session::{ClientInfo, LogonSession, LogonState, WorldOptions, WorldSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut logon = LogonSession::connect("127.0.0.1", 3724, ClientInfo::default())?;
//! logon.authenticate("alice", Credentials::password("password")?, None)?;
//!
//! while logon.state() != LogonState::Authenticated {
//!     logon.update()?;
//! }
//! logon.request_realm_list()?;
//! while logon.state() != LogonState::RealmListReceived {
//!     logon.update()?;
//! }
//!
//! let realm = logon.realms()[0].clone();
//! let (host, port) = realm.host_and_port().ok_or("realm address has no port")?;
//! let session_key = logon.take_session_key().ok_or("no session key")?;
//!
//! let mut world = WorldSession::connect(
//!     host,
//!     port,
//!     session_key,
//!     "alice",
//!     ClientInfo::default(),
//!     WorldOptions::default().with_realm_id(realm.id.into()),
//! )?;
//! world.on_character_list(|characters| println!("{} characters", characters.len()));
//! loop {
//!     world.update()?;
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::perf,
    clippy::correctness,
    clippy::style,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::unseparated_literal_suffix
)]

pub use client::Credentials;
pub use config::{
    ClientInfo, FourCC, HashEndianness, KMode, SrpOptions, WorldOptions, DEFAULT_LOGON_PORT,
};
pub use error::{ErrorKind, SessionError};
pub use key::PublicKey;
pub use key::SessionKey;
pub use key::PROOF_LENGTH;
pub use key::PUBLIC_KEY_LENGTH;
pub use key::SALT_LENGTH;
pub use key::SESSION_KEY_LENGTH;
pub use logon::{LogonSession, LogonState, Realm};
pub use packet::Packet;
pub use primes::GENERATOR;
pub use primes::GENERATOR_LENGTH;
pub use primes::LARGE_SAFE_PRIME_BIG_ENDIAN;
pub use primes::LARGE_SAFE_PRIME_LENGTH;
pub use primes::LARGE_SAFE_PRIME_LITTLE_ENDIAN;
pub use transport::{MemoryTransport, TcpTransport, Transport};
pub use world::{WorldSession, WorldState};

pub(crate) mod bigint;
pub mod client;
pub mod config;
pub mod digest;
pub mod error;
pub mod header_crypto;
pub mod integrity;
pub mod key;
pub mod logon;
pub mod normalized_string;
pub mod packet;
pub mod pin;
pub(crate) mod primes;
pub(crate) mod srp_internal;
pub mod transport;
pub mod world;

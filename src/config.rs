//! Session configuration.
//!
//! All structs implement [`Default`] with values for the 3.3.5a (build 12340) client,
//! and have `with_*` setters for overriding single values.

use crate::bigint;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Default TCP port of logon servers.
pub const DEFAULT_LOGON_PORT: u16 = 3724;

/// Highest client build that uses the legacy header cipher instead of RC4.
///
/// 8606 is 2.4.3, the last TBC build.
pub const LAST_LEGACY_HEADER_BUILD: u16 = 8606;

/// Four byte tag written in string order and zero padded, like `"WoW\0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC([u8; 4]);

impl FourCC {
    /// Tags longer than 4 bytes are truncated.
    pub fn new(tag: &str) -> Self {
        let mut bytes = [0_u8; 4];
        for (i, b) in tag.bytes().take(4).enumerate() {
            bytes[i] = b;
        }
        Self(bytes)
    }

    /// Bytes in wire order.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Creates the tag from bytes in wire order.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for b in self.0.iter().take_while(|b| **b != 0) {
            write!(f, "{}", *b as char)?;
        }
        Ok(())
    }
}

/// Client version and locale sent during logon and world authentication.
///
/// Immutable for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u16,
    /// 3 for clients before WotLK, 8 for WotLK.
    pub protocol_version: u8,
    pub game: FourCC,
    pub platform: FourCC,
    pub os: FourCC,
    pub locale: FourCC,
    pub timezone: u32,
    /// Always zero on the wire.
    pub ip: u32,
    /// Concatenated client binaries for the integrity hash in the logon proof.
    ///
    /// A zeroed hash is sent when this is [`None`].
    pub integrity_files: Option<Vec<u8>>,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            major: 3,
            minor: 3,
            patch: 5,
            build: 12340,
            protocol_version: 8,
            game: FourCC::new("WoW"),
            platform: FourCC::new("x86"),
            os: FourCC::new("Win"),
            locale: FourCC::new("enUS"),
            timezone: 0,
            ip: 0,
            integrity_files: None,
        }
    }
}

impl ClientInfo {
    pub fn with_version(mut self, major: u8, minor: u8, patch: u8, build: u16) -> Self {
        self.major = major;
        self.minor = minor;
        self.patch = patch;
        self.build = build;
        self
    }

    pub const fn with_protocol_version(mut self, protocol_version: u8) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = FourCC::new(locale);
        self
    }

    pub fn with_platform(mut self, platform: &str, os: &str) -> Self {
        self.platform = FourCC::new(platform);
        self.os = FourCC::new(os);
        self
    }

    pub fn with_integrity_files(mut self, files: Vec<u8>) -> Self {
        self.integrity_files = Some(files);
        self
    }

    /// Protocol 8 and above carry the security flag blocks and a 16 bit realm count.
    pub const fn has_security_flags(&self) -> bool {
        self.protocol_version >= 8
    }

    pub const fn uses_legacy_header_cipher(&self) -> bool {
        self.build <= LAST_LEGACY_HEADER_BUILD
    }
}

/// Selects the SRP6 multiplier `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KMode {
    /// `k = 3`, the value used by the game client.
    Three,
    /// `k = H(N | g)` as in SRP6a.
    Hashed,
}

impl Default for KMode {
    fn default() -> Self {
        Self::Three
    }
}

/// How a SHA-1 output is interpreted when used as an integer (`x`, `u` and hashed `k`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashEndianness {
    Little,
    Big,
}

impl Default for HashEndianness {
    fn default() -> Self {
        Self::Little
    }
}

impl HashEndianness {
    pub(crate) fn hash_to_bigint(self, hash: &[u8]) -> bigint::Integer {
        match self {
            HashEndianness::Little => bigint::Integer::from_bytes_le(hash),
            HashEndianness::Big => bigint::Integer::from_bytes_be(hash),
        }
    }
}

/// Knobs for servers that deviate from the game client's SRP6 flavor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SrpOptions {
    pub k_mode: KMode,
    pub hash_endianness: HashEndianness,
}

impl SrpOptions {
    pub const fn with_k_mode(mut self, k_mode: KMode) -> Self {
        self.k_mode = k_mode;
        self
    }

    pub const fn with_hash_endianness(mut self, hash_endianness: HashEndianness) -> Self {
        self.hash_endianness = hash_endianness;
        self
    }
}

/// Settings for the world session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldOptions {
    /// Realm id sent in `CMSG_AUTH_SESSION`, taken from the selected realm.
    pub realm_id: u32,
    /// Interval between `CMSG_PING` heartbeats while in world.
    pub ping_interval: Duration,
    /// Unanswered `SMSG_WARDEN_DATA` packets before the session counts as gated.
    pub warden_gate_threshold: u32,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            realm_id: 1,
            ping_interval: Duration::from_secs(30),
            warden_gate_threshold: 3,
        }
    }
}

impl WorldOptions {
    pub const fn with_realm_id(mut self, realm_id: u32) -> Self {
        self.realm_id = realm_id;
        self
    }

    pub const fn with_ping_interval(mut self, ping_interval: Duration) -> Self {
        self.ping_interval = ping_interval;
        self
    }

    pub const fn with_warden_gate_threshold(mut self, threshold: u32) -> Self {
        self.warden_gate_threshold = threshold;
        self
    }
}

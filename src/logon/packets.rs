//! Readers and writers for the logon messages.
//!
//! Every `write` returns a complete frame starting with the opcode byte, and every `read`
//! takes a complete frame as cut by [`expected_length`].
//!
//! Integers are little endian. The game, platform, os and locale tags are [`FourCC`]s
//! in string order.

use crate::config::{ClientInfo, FourCC};
use crate::error::SessionError;
use crate::integrity::INTEGRITY_SALT_LENGTH;
use crate::key::{PROOF_LENGTH, PUBLIC_KEY_LENGTH, SALT_LENGTH};
use crate::logon::opcodes::LogonOpcode;
use crate::logon::result::LogonResult;
use crate::normalized_string::NormalizedString;
use crate::packet::Packet;
use crate::pin::{PinProof, PIN_SALT_LENGTH};
use std::fmt::{Display, Formatter};
use std::ops::BitOr;

/// First build whose successful proof response carries login flags.
pub const FIRST_LOGIN_FLAGS_BUILD: u16 = 6299;
/// First build whose successful proof response carries account flags.
pub const FIRST_ACCOUNT_FLAGS_BUILD: u16 = 8089;

/// Optional logon steps requested in the challenge response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SecurityFlags(u8);

impl SecurityFlags {
    pub const NONE: Self = Self(0x00);
    pub const PIN: Self = Self(0x01);
    pub const MATRIX_CARD: Self = Self(0x02);
    pub const AUTHENTICATOR: Self = Self(0x04);

    pub const fn new(flags: u8) -> Self {
        Self(flags)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn pin(self) -> bool {
        self.contains(Self::PIN)
    }

    pub const fn matrix_card(self) -> bool {
        self.contains(Self::MATRIX_CARD)
    }

    pub const fn authenticator(self) -> bool {
        self.contains(Self::AUTHENTICATOR)
    }
}

impl BitOr for SecurityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Whether a frame can be cut from the start of a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// Not enough bytes to know the length yet.
    Unknown,
    /// The frame is this many bytes, which may be more than is buffered.
    Known(usize),
}

/// Length of the server message at the start of `buffer`.
///
/// # Errors
///
/// Errors with a framing error for opcodes that servers never send to clients
/// and whose length therefore can not be known.
pub fn expected_length(buffer: &[u8], client_build: u16) -> Result<FrameLength, SessionError> {
    let opcode = match buffer.first() {
        None => return Ok(FrameLength::Unknown),
        Some(opcode) => *opcode,
    };

    match LogonOpcode::from_u8(opcode) {
        Some(LogonOpcode::LogonChallenge) => Ok(challenge_response_length(buffer)),
        Some(LogonOpcode::LogonProof) => Ok(proof_response_length(buffer, client_build)),
        Some(LogonOpcode::RealmList) => Ok(match buffer.get(1..3) {
            Some(size) => FrameLength::Known(3 + u16::from_le_bytes([size[0], size[1]]) as usize),
            None => FrameLength::Unknown,
        }),
        // Reconnect, authenticator and unknown opcodes carry no length, so the rest of the
        // stream can not be found again.
        _ => Err(SessionError::framing(format!(
            "can not frame logon opcode 0x{:02X}",
            opcode
        ))),
    }
}

fn challenge_response_length(buffer: &[u8]) -> FrameLength {
    // opcode, unused, status
    const FAILURE_LENGTH: usize = 3;
    const GENERATOR_LENGTH_OFFSET: usize = FAILURE_LENGTH + PUBLIC_KEY_LENGTH as usize;

    let status = match buffer.get(2) {
        None => return FrameLength::Unknown,
        Some(status) => *status,
    };
    if status != 0 {
        return FrameLength::Known(FAILURE_LENGTH);
    }

    let generator_length = match buffer.get(GENERATOR_LENGTH_OFFSET) {
        None => return FrameLength::Unknown,
        Some(v) => *v as usize,
    };
    let prime_length_offset = GENERATOR_LENGTH_OFFSET + 1 + generator_length;
    let prime_length = match buffer.get(prime_length_offset) {
        None => return FrameLength::Unknown,
        Some(v) => *v as usize,
    };
    let flags_offset = prime_length_offset
        + 1
        + prime_length
        + SALT_LENGTH as usize
        + INTEGRITY_SALT_LENGTH as usize;
    let flags = match buffer.get(flags_offset) {
        None => return FrameLength::Unknown,
        Some(v) => SecurityFlags::new(*v),
    };

    let mut length = flags_offset + 1;
    if flags.pin() {
        length += PinChallenge::LENGTH;
    }
    if flags.matrix_card() {
        length += MatrixCardChallenge::LENGTH;
    }
    if flags.authenticator() {
        length += 1;
    }

    FrameLength::Known(length)
}

fn proof_response_length(buffer: &[u8], client_build: u16) -> FrameLength {
    let status = match buffer.get(1) {
        None => return FrameLength::Unknown,
        Some(status) => *status,
    };

    if status != 0 {
        // Newer servers pad failures with two bytes, older ones do not.
        return if client_build >= FIRST_LOGIN_FLAGS_BUILD && buffer.len() >= 4 {
            FrameLength::Known(4)
        } else {
            FrameLength::Known(2)
        };
    }

    FrameLength::Known(LogonProofResponse::success_length(client_build))
}

fn frame(opcode: LogonOpcode, body: &Packet) -> Vec<u8> {
    let mut v = Vec::with_capacity(1 + body.len());
    v.push(opcode.as_u8());
    v.extend_from_slice(body.data());
    v
}

fn body(frame: &[u8], opcode: LogonOpcode) -> Result<Packet, SessionError> {
    match frame.split_first() {
        Some((first, rest)) if *first == opcode.as_u8() => {
            Ok(Packet::with_data(opcode.as_u8().into(), rest.to_vec()))
        }
        _ => Err(SessionError::protocol(format!("not a {} frame", opcode))),
    }
}

fn check_overflow(packet: &Packet, opcode: LogonOpcode) -> Result<(), SessionError> {
    if packet.has_read_overflow() {
        return Err(SessionError::protocol(format!(
            "{} is shorter than its fields",
            opcode
        )));
    }
    Ok(())
}

/// Client hello, carries the account name and client version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonChallengeRequest {
    pub protocol_version: u8,
    pub game: FourCC,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u16,
    pub platform: FourCC,
    pub os: FourCC,
    pub locale: FourCC,
    pub timezone: u32,
    pub ip: u32,
    pub account: NormalizedString,
}

impl LogonChallengeRequest {
    /// Length of the fixed fields after the size field.
    const FIXED_PAYLOAD_LENGTH: u16 = 30;

    pub fn new(client_info: &ClientInfo, account: NormalizedString) -> Self {
        Self {
            protocol_version: client_info.protocol_version,
            game: client_info.game,
            major: client_info.major,
            minor: client_info.minor,
            patch: client_info.patch,
            build: client_info.build,
            platform: client_info.platform,
            os: client_info.os,
            locale: client_info.locale,
            timezone: client_info.timezone,
            ip: client_info.ip,
            account,
        }
    }

    pub fn write(&self) -> Vec<u8> {
        let mut p = Packet::new(LogonOpcode::LogonChallenge.as_u8().into());

        p.write_u8(self.protocol_version)
            .write_u16(Self::FIXED_PAYLOAD_LENGTH + u16::from(self.account.len()))
            .write_bytes(self.game.as_bytes())
            .write_u8(self.major)
            .write_u8(self.minor)
            .write_u8(self.patch)
            .write_u16(self.build)
            .write_bytes(self.platform.as_bytes())
            .write_bytes(self.os.as_bytes())
            .write_bytes(self.locale.as_bytes())
            .write_u32(self.timezone)
            .write_u32(self.ip)
            .write_u8(self.account.len())
            .write_bytes(self.account.as_bytes());

        frame(LogonOpcode::LogonChallenge, &p)
    }
}

/// PIN grid seed and server salt, present with [`SecurityFlags::PIN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinChallenge {
    pub grid_seed: u32,
    pub server_salt: [u8; PIN_SALT_LENGTH as usize],
}

impl PinChallenge {
    const LENGTH: usize = 4 + PIN_SALT_LENGTH as usize;
}

/// Matrix card challenge, present with [`SecurityFlags::MATRIX_CARD`].
///
/// Parsed so the frame can be consumed, but never answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixCardChallenge {
    pub width: u8,
    pub height: u8,
    pub digit_count: u8,
    pub challenge_count: u8,
    pub seed: u64,
}

impl MatrixCardChallenge {
    const LENGTH: usize = 4 + 8;
}

/// Values needed to compute the logon proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerChallenge {
    /// `B`, little endian.
    pub server_public_key: [u8; PUBLIC_KEY_LENGTH as usize],
    /// `g`, little endian.
    pub generator: Vec<u8>,
    /// `N`, little endian.
    pub large_safe_prime: Vec<u8>,
    pub salt: [u8; SALT_LENGTH as usize],
    /// Salt for the integrity hash in the proof.
    pub integrity_salt: [u8; INTEGRITY_SALT_LENGTH as usize],
    pub security_flags: SecurityFlags,
    pub pin: Option<PinChallenge>,
    pub matrix_card: Option<MatrixCardChallenge>,
    /// Whether the server enforces the authenticator, present with
    /// [`SecurityFlags::AUTHENTICATOR`].
    pub authenticator_required: Option<u8>,
}

/// Server reply to [`LogonChallengeRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonChallengeResponse {
    /// Unused by clients.
    pub protocol_version: u8,
    pub result: LogonResult,
    /// Present only when `result` is [`LogonResult::Success`].
    pub challenge: Option<ServerChallenge>,
}

impl LogonChallengeResponse {
    /// # Errors
    ///
    /// Errors if the frame is not a challenge response or is shorter than its fields.
    pub fn read(frame: &[u8]) -> Result<Self, SessionError> {
        let mut p = body(frame, LogonOpcode::LogonChallenge)?;

        let protocol_version = p.read_u8();
        let result = LogonResult::from_u8(p.read_u8());

        if !result.is_success() {
            check_overflow(&p, LogonOpcode::LogonChallenge)?;
            return Ok(Self {
                protocol_version,
                result,
                challenge: None,
            });
        }

        let server_public_key = p.read_array();
        let generator_length = p.read_u8();
        let generator = p.read_bytes(generator_length.into());
        let prime_length = p.read_u8();
        let large_safe_prime = p.read_bytes(prime_length.into());
        let salt = p.read_array();
        let integrity_salt = p.read_array();
        let security_flags = SecurityFlags::new(p.read_u8());

        let pin = if security_flags.pin() {
            Some(PinChallenge {
                grid_seed: p.read_u32(),
                server_salt: p.read_array(),
            })
        } else {
            None
        };

        let matrix_card = if security_flags.matrix_card() {
            Some(MatrixCardChallenge {
                width: p.read_u8(),
                height: p.read_u8(),
                digit_count: p.read_u8(),
                challenge_count: p.read_u8(),
                seed: p.read_u64(),
            })
        } else {
            None
        };

        let authenticator_required = if security_flags.authenticator() {
            Some(p.read_u8())
        } else {
            None
        };

        check_overflow(&p, LogonOpcode::LogonChallenge)?;

        Ok(Self {
            protocol_version,
            result,
            challenge: Some(ServerChallenge {
                server_public_key,
                generator,
                large_safe_prime,
                salt,
                integrity_salt,
                security_flags,
                pin,
                matrix_card,
                authenticator_required,
            }),
        })
    }

    /// Conditional blocks follow the security flags, missing blocks are written as zeroes.
    ///
    /// # Panics
    ///
    /// Panics if the generator or the large safe prime is longer than 255 bytes, the most
    /// their length fields can hold.
    pub fn write(&self) -> Vec<u8> {
        let mut p = Packet::new(LogonOpcode::LogonChallenge.as_u8().into());
        p.write_u8(self.protocol_version)
            .write_u8(self.result.as_u8());

        if let Some(c) = &self.challenge {
            let generator_length = u8::try_from(c.generator.len());
            let prime_length = u8::try_from(c.large_safe_prime.len());
            let (generator_length, prime_length) = match (generator_length, prime_length) {
                (Ok(g), Ok(n)) => (g, n),
                _ => panic!(
                    "g of {} bytes or N of {} bytes does not fit a length byte",
                    c.generator.len(),
                    c.large_safe_prime.len()
                ),
            };

            p.write_bytes(&c.server_public_key)
                .write_u8(generator_length)
                .write_bytes(&c.generator)
                .write_u8(prime_length)
                .write_bytes(&c.large_safe_prime)
                .write_bytes(&c.salt)
                .write_bytes(&c.integrity_salt)
                .write_u8(c.security_flags.as_u8());

            if c.security_flags.pin() {
                let pin = c.pin.unwrap_or_default();
                p.write_u32(pin.grid_seed).write_bytes(&pin.server_salt);
            }

            if c.security_flags.matrix_card() {
                let m = c.matrix_card.unwrap_or_default();
                p.write_u8(m.width)
                    .write_u8(m.height)
                    .write_u8(m.digit_count)
                    .write_u8(m.challenge_count)
                    .write_u64(m.seed);
            }

            if c.security_flags.authenticator() {
                p.write_u8(c.authenticator_required.unwrap_or(1));
            }
        }

        frame(LogonOpcode::LogonChallenge, &p)
    }
}

/// Client proof of the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonProofRequest {
    /// `A`, little endian.
    pub client_public_key: [u8; PUBLIC_KEY_LENGTH as usize],
    /// `M1`.
    pub client_proof: [u8; PROOF_LENGTH as usize],
    /// Integrity hash of the client files, all zeroes when not computed.
    pub crc_hash: [u8; 20],
    /// Echo of the flags the server asked for.
    pub security_flags: SecurityFlags,
    pub pin: Option<PinProof>,
}

impl LogonProofRequest {
    /// Protocols before 8 end after the key count.
    pub fn write(&self, protocol_version: u8) -> Vec<u8> {
        let mut p = Packet::new(LogonOpcode::LogonProof.as_u8().into());
        p.write_bytes(&self.client_public_key)
            .write_bytes(&self.client_proof)
            .write_bytes(&self.crc_hash)
            // Number of telemetry keys
            .write_u8(0);

        if protocol_version >= 8 {
            p.write_u8(self.security_flags.as_u8());

            if self.security_flags.pin() {
                let pin = self.pin.unwrap_or(PinProof {
                    client_salt: [0; PIN_SALT_LENGTH as usize],
                    hash: [0; 20],
                });
                p.write_bytes(&pin.client_salt).write_bytes(&pin.hash);
            }
        }

        frame(LogonOpcode::LogonProof, &p)
    }
}

/// Authenticator token, sent right after [`LogonProofRequest`] when the server asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorRequest {
    pub token: String,
}

impl AuthenticatorRequest {
    /// Tokens longer than 255 bytes are truncated.
    pub fn write(&self) -> Vec<u8> {
        let token = &self.token.as_bytes()[..self.token.len().min(u8::MAX as usize)];

        let mut p = Packet::new(LogonOpcode::Authenticator.as_u8().into());
        p.write_u8(token.len() as u8).write_bytes(token);

        frame(LogonOpcode::Authenticator, &p)
    }
}

/// Server reply to [`LogonProofRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogonProofResponse {
    pub result: LogonResult,
    /// `M2`, present only on success.
    pub server_proof: Option<[u8; PROOF_LENGTH as usize]>,
    pub account_flags: u32,
    pub survey_id: u32,
    pub login_flags: u16,
}

impl LogonProofResponse {
    /// Length of a successful response for `client_build`, opcode included.
    pub const fn success_length(client_build: u16) -> usize {
        const BASE: usize = 1 + 1 + PROOF_LENGTH as usize + 4;

        if client_build >= FIRST_ACCOUNT_FLAGS_BUILD {
            BASE + 4 + 2
        } else if client_build >= FIRST_LOGIN_FLAGS_BUILD {
            BASE + 2
        } else {
            BASE
        }
    }

    /// # Errors
    ///
    /// Errors if the frame is not a proof response or is shorter than its fields.
    pub fn read(frame: &[u8], client_build: u16) -> Result<Self, SessionError> {
        let mut p = body(frame, LogonOpcode::LogonProof)?;

        let result = LogonResult::from_u8(p.read_u8());
        if !result.is_success() {
            check_overflow(&p, LogonOpcode::LogonProof)?;
            return Ok(Self {
                result,
                server_proof: None,
                account_flags: 0,
                survey_id: 0,
                login_flags: 0,
            });
        }

        let server_proof = p.read_array();
        let account_flags = if client_build >= FIRST_ACCOUNT_FLAGS_BUILD {
            p.read_u32()
        } else {
            0
        };
        let survey_id = p.read_u32();
        let login_flags = if client_build >= FIRST_LOGIN_FLAGS_BUILD {
            p.read_u16()
        } else {
            0
        };

        check_overflow(&p, LogonOpcode::LogonProof)?;

        Ok(Self {
            result,
            server_proof: Some(server_proof),
            account_flags,
            survey_id,
            login_flags,
        })
    }

    pub fn write(&self, client_build: u16) -> Vec<u8> {
        let mut p = Packet::new(LogonOpcode::LogonProof.as_u8().into());
        p.write_u8(self.result.as_u8());

        match self.server_proof {
            Some(server_proof) if self.result.is_success() => {
                p.write_bytes(&server_proof);
                if client_build >= FIRST_ACCOUNT_FLAGS_BUILD {
                    p.write_u32(self.account_flags);
                }
                p.write_u32(self.survey_id);
                if client_build >= FIRST_LOGIN_FLAGS_BUILD {
                    p.write_u16(self.login_flags);
                }
            }
            _ => {
                if client_build >= FIRST_LOGIN_FLAGS_BUILD {
                    p.write_u16(0);
                }
            }
        }

        frame(LogonOpcode::LogonProof, &p)
    }
}

/// Asks for the realm list once authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealmListRequest;

impl RealmListRequest {
    pub fn write(&self) -> Vec<u8> {
        let mut p = Packet::new(LogonOpcode::RealmList.as_u8().into());
        p.write_u32(0);

        frame(LogonOpcode::RealmList, &p)
    }
}

/// Realm icon, which also decides the ruleset shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealmType {
    Normal,
    PlayerVsPlayer,
    RolePlaying,
    RolePlayingPlayerVsPlayer,
    Other(u8),
}

impl RealmType {
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Normal,
            1 => Self::PlayerVsPlayer,
            6 => Self::RolePlaying,
            8 => Self::RolePlayingPlayerVsPlayer,
            v => Self::Other(v),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::PlayerVsPlayer => 1,
            Self::RolePlaying => 6,
            Self::RolePlayingPlayerVsPlayer => 8,
            Self::Other(v) => v,
        }
    }
}

impl Display for RealmType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RealmType::Normal => f.write_str("Normal"),
            RealmType::PlayerVsPlayer => f.write_str("PvP"),
            RealmType::RolePlaying => f.write_str("RP"),
            RealmType::RolePlayingPlayerVsPlayer => f.write_str("RP-PvP"),
            RealmType::Other(v) => write!(f, "Unknown ({})", v),
        }
    }
}

/// Realm flag bits.
pub mod realm_flags {
    pub const INVALID: u8 = 0x01;
    pub const OFFLINE: u8 = 0x02;
    pub const SPECIFY_BUILD: u8 = 0x04;
}

/// Client version a realm expects, present with [`realm_flags::SPECIFY_BUILD`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealmVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u16,
}

/// One entry of the realm list.
#[derive(Debug, Clone, PartialEq)]
pub struct Realm {
    pub realm_type: RealmType,
    /// Nonzero when the realm is locked.
    pub locked: u8,
    pub flags: u8,
    pub name: String,
    /// `host:port` of the world server.
    pub address: String,
    pub population: f32,
    /// Characters the account has on the realm.
    pub characters: u8,
    pub timezone: u8,
    pub id: u8,
    pub version: Option<RealmVersion>,
}

impl Realm {
    pub const fn is_locked(&self) -> bool {
        self.locked != 0
    }

    pub const fn is_invalid(&self) -> bool {
        self.flags & realm_flags::INVALID != 0
    }

    pub const fn is_offline(&self) -> bool {
        self.flags & realm_flags::OFFLINE != 0
    }

    pub const fn has_version(&self) -> bool {
        self.flags & realm_flags::SPECIFY_BUILD != 0
    }

    /// Splits the address at the last `:`.
    ///
    /// Returns [`None`] if there is no port or it is not a number.
    pub fn host_and_port(&self) -> Option<(&str, u16)> {
        let (host, port) = self.address.rsplit_once(':')?;
        let port = port.parse().ok()?;

        Some((host, port))
    }

    fn read(p: &mut Packet) -> Self {
        let realm_type = RealmType::from_u8(p.read_u8());
        let locked = p.read_u8();
        let flags = p.read_u8();
        let name = p.read_cstring();
        let address = p.read_cstring();
        let population = p.read_f32();
        let characters = p.read_u8();
        let timezone = p.read_u8();
        let id = p.read_u8();

        let version = if flags & realm_flags::SPECIFY_BUILD != 0 {
            Some(RealmVersion {
                major: p.read_u8(),
                minor: p.read_u8(),
                patch: p.read_u8(),
                build: p.read_u16(),
            })
        } else {
            None
        };

        Self {
            realm_type,
            locked,
            flags,
            name,
            address,
            population,
            characters,
            timezone,
            id,
            version,
        }
    }

    fn write(&self, p: &mut Packet) {
        p.write_u8(self.realm_type.as_u8())
            .write_u8(self.locked)
            .write_u8(self.flags)
            .write_cstring(&self.name)
            .write_cstring(&self.address)
            .write_f32(self.population)
            .write_u8(self.characters)
            .write_u8(self.timezone)
            .write_u8(self.id);

        if self.has_version() {
            let v = self.version.unwrap_or_default();
            p.write_u8(v.major)
                .write_u8(v.minor)
                .write_u8(v.patch)
                .write_u16(v.build);
        }
    }
}

/// Server reply to [`RealmListRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RealmListResponse {
    /// Unused by clients.
    pub header_padding: u32,
    pub realms: Vec<Realm>,
    /// Bytes after the last realm that are covered by the size field.
    pub trailing: Vec<u8>,
}

impl RealmListResponse {
    /// The realm count is a u16 from protocol 8 and a u8 before.
    ///
    /// # Errors
    ///
    /// Errors if the frame is not a realm list or the realms do not fit in it.
    pub fn read(frame: &[u8], protocol_version: u8) -> Result<Self, SessionError> {
        let mut p = body(frame, LogonOpcode::RealmList)?;

        let size = p.read_u16() as usize;
        if p.remaining() != size {
            return Err(SessionError::protocol(format!(
                "REALM_LIST size field is {} but the body has {} bytes",
                size,
                p.remaining()
            )));
        }

        let header_padding = p.read_u32();
        let count = if protocol_version >= 8 {
            p.read_u16()
        } else {
            p.read_u8().into()
        };

        let mut realms = Vec::with_capacity(count.into());
        for _ in 0..count {
            realms.push(Realm::read(&mut p));
            check_overflow(&p, LogonOpcode::RealmList)?;
        }
        check_overflow(&p, LogonOpcode::RealmList)?;

        let trailing = p.read_bytes(p.remaining());

        Ok(Self {
            header_padding,
            realms,
            trailing,
        })
    }

    pub fn write(&self, protocol_version: u8) -> Vec<u8> {
        let mut inner = Packet::new(0);
        inner.write_u32(self.header_padding);
        if protocol_version >= 8 {
            inner.write_u16(self.realms.len() as u16);
        } else {
            inner.write_u8(self.realms.len() as u8);
        }
        for realm in &self.realms {
            realm.write(&mut inner);
        }
        inner.write_bytes(&self.trailing);

        let mut p = Packet::new(LogonOpcode::RealmList.as_u8().into());
        p.write_u16(inner.len() as u16).write_bytes(inner.data());

        frame(LogonOpcode::RealmList, &p)
    }
}

#[cfg(test)]
mod test {
    use crate::config::ClientInfo;
    use crate::logon::packets::{
        expected_length, AuthenticatorRequest, FrameLength, LogonChallengeRequest,
        LogonChallengeResponse, LogonProofRequest, LogonProofResponse, PinChallenge, Realm,
        RealmListRequest, RealmListResponse, RealmType, RealmVersion, SecurityFlags,
        ServerChallenge,
    };
    use crate::logon::result::LogonResult;
    use crate::normalized_string::NormalizedString;
    use crate::pin::PinProof;
    use crate::primes::LARGE_SAFE_PRIME_LITTLE_ENDIAN;

    fn challenge(flags: SecurityFlags) -> LogonChallengeResponse {
        LogonChallengeResponse {
            protocol_version: 0,
            result: LogonResult::Success,
            challenge: Some(ServerChallenge {
                server_public_key: [0xBB; 32],
                generator: vec![7],
                large_safe_prime: LARGE_SAFE_PRIME_LITTLE_ENDIAN.to_vec(),
                salt: [0x55; 32],
                integrity_salt: [0x11; 16],
                security_flags: flags,
                pin: if flags.pin() {
                    Some(PinChallenge {
                        grid_seed: 0x0102_0304,
                        server_salt: [0x22; 16],
                    })
                } else {
                    None
                },
                matrix_card: None,
                authenticator_required: if flags.authenticator() { Some(1) } else { None },
            }),
        }
    }

    #[test]
    fn challenge_request_layout() {
        let account = NormalizedString::new("a").unwrap();
        let frame = LogonChallengeRequest::new(&ClientInfo::default(), account).write();

        let expected = [
            0x00, // opcode
            0x08, // protocol
            31, 0, // size
            b'W', b'o', b'W', 0, // game
            3, 3, 5, // version
            0x34, 0x30, // build 12340
            b'x', b'8', b'6', 0, // platform
            b'W', b'i', b'n', 0, // os
            b'e', b'n', b'U', b'S', // locale
            0, 0, 0, 0, // timezone
            0, 0, 0, 0, // ip
            1, b'A', // account
        ];
        assert_eq!(frame, expected);
        assert_eq!(frame.len(), 4 + 31);
    }

    #[test]
    fn challenge_response_flag_combinations() {
        for flags in [0x00, 0x01, 0x04, 0x05] {
            let response = challenge(SecurityFlags::new(flags));
            let frame = response.write();

            assert_eq!(
                expected_length(&frame, 12340).unwrap(),
                FrameLength::Known(frame.len()),
                "flags 0x{:02X}",
                flags
            );
            assert_eq!(LogonChallengeResponse::read(&frame).unwrap(), response);
        }

        // 36 + g + 1 + N + 32 + 16 + 1
        assert_eq!(challenge(SecurityFlags::NONE).write().len(), 119);
        assert_eq!(challenge(SecurityFlags::PIN).write().len(), 139);
    }

    #[test]
    fn challenge_response_length_needs_all_length_fields() {
        let frame = challenge(SecurityFlags::PIN).write();

        for end in [0, 2, 35, 36, 37, 85] {
            assert_eq!(
                expected_length(&frame[..end], 12340).unwrap(),
                FrameLength::Unknown,
                "{} bytes",
                end
            );
        }
    }

    #[test]
    fn challenge_response_with_large_prime() {
        let mut response = challenge(SecurityFlags::NONE);
        if let Some(c) = response.challenge.as_mut() {
            c.large_safe_prime = vec![0xFF; 255];
            c.generator = vec![0x02; 255];
        }
        let frame = response.write();

        assert_eq!(
            expected_length(&frame, 12340).unwrap(),
            FrameLength::Known(36 + 255 + 1 + 255 + 32 + 16 + 1)
        );
        assert_eq!(LogonChallengeResponse::read(&frame).unwrap(), response);
    }

    #[test]
    #[should_panic(expected = "does not fit a length byte")]
    fn challenge_response_prime_of_256_bytes_can_not_be_written() {
        let mut response = challenge(SecurityFlags::NONE);
        if let Some(c) = response.challenge.as_mut() {
            c.large_safe_prime = vec![0xFF; 256];
        }
        let _ = response.write();
    }

    #[test]
    fn challenge_failure() {
        let frame = [0x00, 0x00, 0x04];
        assert_eq!(expected_length(&frame, 12340).unwrap(), FrameLength::Known(3));

        let response = LogonChallengeResponse::read(&frame).unwrap();
        assert_eq!(response.result, LogonResult::FailUnknownAccount);
        assert!(response.challenge.is_none());
    }

    #[test]
    fn truncated_challenge_is_a_protocol_error() {
        let frame = challenge(SecurityFlags::NONE).write();
        let e = LogonChallengeResponse::read(&frame[..frame.len() - 1]).unwrap_err();
        assert_eq!(e.kind(), crate::error::ErrorKind::Protocol);
    }

    #[test]
    fn proof_request_layout() {
        let request = LogonProofRequest {
            client_public_key: [0xAA; 32],
            client_proof: [0xBB; 20],
            crc_hash: [0; 20],
            security_flags: SecurityFlags::PIN,
            pin: Some(PinProof {
                client_salt: [0xCC; 16],
                hash: [0xDD; 20],
            }),
        };

        let modern = request.write(8);
        assert_eq!(modern.len(), 1 + 32 + 20 + 20 + 1 + 1 + 16 + 20);
        assert_eq!(modern[0], 0x01);
        assert_eq!(modern[74], 0x01);
        assert_eq!(&modern[75..91], &[0xCC; 16]);

        let legacy = request.write(3);
        assert_eq!(legacy.len(), 1 + 32 + 20 + 20 + 1);
        assert_eq!(&legacy[..], &modern[..legacy.len()]);
    }

    #[test]
    fn authenticator_request_layout() {
        let frame = AuthenticatorRequest {
            token: "123456".to_string(),
        }
        .write();

        assert_eq!(frame, b"\x04\x06123456".to_vec());
    }

    #[test]
    fn proof_response_lengths_follow_build() {
        let response = LogonProofResponse {
            result: LogonResult::Success,
            server_proof: Some([0x42; 20]),
            account_flags: 0x0080_0000,
            survey_id: 0,
            login_flags: 0,
        };

        for (build, length) in [(12340, 32), (8089, 32), (8088, 28), (6299, 28), (5875, 26)] {
            let frame = response.write(build);
            assert_eq!(frame.len(), length, "build {}", build);
            assert_eq!(
                expected_length(&frame, build).unwrap(),
                FrameLength::Known(length)
            );

            let parsed = LogonProofResponse::read(&frame, build).unwrap();
            assert_eq!(parsed.server_proof, Some([0x42; 20]));
        }
    }

    #[test]
    fn proof_failure_lengths() {
        assert_eq!(
            expected_length(&[0x01, 0x05, 0x00, 0x00], 12340).unwrap(),
            FrameLength::Known(4)
        );
        assert_eq!(
            expected_length(&[0x01, 0x05], 12340).unwrap(),
            FrameLength::Known(2)
        );
        assert_eq!(
            expected_length(&[0x01, 0x05, 0x00, 0x00], 5875).unwrap(),
            FrameLength::Known(2)
        );

        let parsed = LogonProofResponse::read(&[0x01, 0x05, 0x00, 0x00], 12340).unwrap();
        assert_eq!(parsed.result, LogonResult::FailIncorrectPassword);
        assert_eq!(parsed.server_proof, None);
    }

    #[test]
    fn unframeable_opcodes() {
        for opcode in [0x02, 0x03, 0x04, 0x99] {
            let e = expected_length(&[opcode, 0, 0, 0], 12340).unwrap_err();
            assert_eq!(e.kind(), crate::error::ErrorKind::Framing);
        }
        assert_eq!(expected_length(&[], 12340).unwrap(), FrameLength::Unknown);
    }

    #[test]
    fn realm_list_request() {
        assert_eq!(RealmListRequest.write(), vec![0x10, 0, 0, 0, 0]);
    }

    fn two_realms() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&0_u32.to_le_bytes());
        body.extend_from_slice(&2_u16.to_le_bytes());

        // Alpha
        body.extend_from_slice(&[0, 0, 0]);
        body.extend_from_slice(b"Alpha\0127.0.0.1:8085\0");
        body.extend_from_slice(&0.2_f32.to_le_bytes());
        body.extend_from_slice(&[3, 1, 1]);

        // Beta
        body.extend_from_slice(&[1, 1, 0x04]);
        body.extend_from_slice(b"Beta\0127.0.0.1:8086\0");
        body.extend_from_slice(&1.0_f32.to_le_bytes());
        body.extend_from_slice(&[0, 1, 2]);
        body.extend_from_slice(&[3, 3, 5]);
        body.extend_from_slice(&12340_u16.to_le_bytes());

        // Footer
        body.extend_from_slice(&[0x10, 0x00]);

        let mut frame = vec![0x10];
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.extend_from_slice(&body);
        frame
    }

    #[test]
    fn realm_list_round_trip() {
        let frame = two_realms();
        assert_eq!(
            expected_length(&frame, 12340).unwrap(),
            FrameLength::Known(frame.len())
        );

        let response = RealmListResponse::read(&frame, 8).unwrap();
        assert_eq!(response.realms.len(), 2);

        let alpha = &response.realms[0];
        assert_eq!(alpha.name, "Alpha");
        assert_eq!(alpha.realm_type, RealmType::Normal);
        assert!(!alpha.is_locked());
        assert_eq!(alpha.address, "127.0.0.1:8085");
        assert_eq!(alpha.host_and_port(), Some(("127.0.0.1", 8085)));
        assert_eq!(alpha.population, 0.2);
        assert_eq!(alpha.characters, 3);
        assert_eq!(alpha.id, 1);
        assert_eq!(alpha.version, None);

        let beta = &response.realms[1];
        assert_eq!(beta.name, "Beta");
        assert_eq!(beta.realm_type, RealmType::PlayerVsPlayer);
        assert!(beta.is_locked());
        assert!(beta.has_version());
        assert_eq!(
            beta.version,
            Some(RealmVersion {
                major: 3,
                minor: 3,
                patch: 5,
                build: 12340
            })
        );

        assert_eq!(response.trailing, vec![0x10, 0x00]);
        assert_eq!(response.write(8), frame);
    }

    #[test]
    fn realm_list_with_u8_count() {
        let response = RealmListResponse {
            header_padding: 0,
            realms: vec![Realm {
                realm_type: RealmType::RolePlaying,
                locked: 0,
                flags: 0x02,
                name: String::new(),
                address: "localhost".to_string(),
                population: 0.0,
                characters: 0,
                timezone: 1,
                id: 9,
                version: None,
            }],
            trailing: Vec::new(),
        };

        let frame = response.write(3);
        assert_eq!(frame[7], 1);

        let parsed = RealmListResponse::read(&frame, 3).unwrap();
        assert_eq!(parsed, response);
        assert!(parsed.realms[0].is_offline());
        assert_eq!(parsed.realms[0].name, "");
        assert_eq!(parsed.realms[0].host_and_port(), None);
    }

    #[test]
    fn realm_list_count_past_end() {
        let mut frame = two_realms();
        // Claim a third realm
        frame[7] = 3;

        assert!(RealmListResponse::read(&frame, 8).is_err());
    }
}

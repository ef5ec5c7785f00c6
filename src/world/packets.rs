//! Bodies of the world messages the session reads or writes itself.
//!
//! Everything else is handed to the consumer as a raw [`Packet`].

use crate::config::LAST_LEGACY_HEADER_BUILD;
use crate::digest::{sha1, SHA1_LENGTH};
use crate::error::SessionError;
use crate::key::SessionKey;
use crate::normalized_string::NormalizedString;
use crate::packet::Packet;
use crate::transport::MAXIMUM_RECEIVE_BUFFER_SIZE;
use crate::world::opcodes::{
    CMSG_AUTH_SESSION, CMSG_CHAR_ENUM, CMSG_PING, CMSG_PLAYER_LOGIN, SMSG_AUTH_CHALLENGE,
};
use crate::world::result::WorldAuthResult;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Equipment slots listed per character in `SMSG_CHAR_ENUM`.
pub const CHARACTER_EQUIPMENT_SLOTS: usize = 23;

/// Length of the optional seed block in the WotLK `SMSG_AUTH_CHALLENGE`.
pub const AUTH_CHALLENGE_SEEDS_LENGTH: usize = 32;

fn malformed(name: &str) -> SessionError {
    SessionError::protocol(format!("{} is shorter than its fields", name))
}

/// `SMSG_AUTH_CHALLENGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Leading field of the WotLK form, always 1 on known servers.
    pub unknown: Option<u32>,
    pub server_seed: u32,
    /// Encryption seeds sent by WotLK servers. Unused by the client.
    pub seeds: Option<[u8; AUTH_CHALLENGE_SEEDS_LENGTH]>,
}

impl AuthChallenge {
    /// Bodies shorter than 8 bytes are the TBC form with only the seed.
    ///
    /// # Errors
    ///
    /// Errors if the body is shorter than 4 bytes.
    pub fn read(packet: &Packet) -> Result<Self, SessionError> {
        let mut p = packet.clone();
        p.set_read_position(0);

        match p.len() {
            0..=3 => Err(malformed("SMSG_AUTH_CHALLENGE")),
            4..=7 => Ok(Self {
                unknown: None,
                server_seed: p.read_u32(),
                seeds: None,
            }),
            _ => {
                let unknown = Some(p.read_u32());
                let server_seed = p.read_u32();
                let seeds = if p.remaining() >= AUTH_CHALLENGE_SEEDS_LENGTH {
                    Some(p.read_array())
                } else {
                    None
                };

                Ok(Self {
                    unknown,
                    server_seed,
                    seeds,
                })
            }
        }
    }

    pub fn to_packet(&self) -> Packet {
        let mut p = Packet::new(SMSG_AUTH_CHALLENGE);
        if let Some(unknown) = self.unknown {
            p.write_u32(unknown);
        }
        p.write_u32(self.server_seed);
        if let Some(seeds) = &self.seeds {
            p.write_bytes(seeds);
        }
        p
    }
}

/// Proof of the session key sent in `CMSG_AUTH_SESSION`.
///
/// `SHA1(account | 0_u32 | client_seed | server_seed | K)` with the seeds little endian.
pub fn calculate_auth_digest(
    account: &NormalizedString,
    client_seed: u32,
    server_seed: u32,
    session_key: &SessionKey,
) -> [u8; SHA1_LENGTH] {
    sha1(&[
        account.as_bytes(),
        &0_u32.to_le_bytes(),
        &client_seed.to_le_bytes(),
        &server_seed.to_le_bytes(),
        session_key.as_le(),
    ])
}

/// Addon block of `CMSG_AUTH_SESSION` for a client without addons.
///
/// The uncompressed data is an addon count and a client time, both zero.
///
/// # Errors
///
/// Errors if compression fails.
pub fn empty_addon_info() -> std::io::Result<Vec<u8>> {
    const UNCOMPRESSED: [u8; 8] = [0; 8];

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&UNCOMPRESSED)?;
    let compressed = encoder.finish()?;

    let mut v = Vec::with_capacity(4 + compressed.len());
    v.extend_from_slice(&(UNCOMPRESSED.len() as u32).to_le_bytes());
    v.extend_from_slice(&compressed);
    Ok(v)
}

/// `CMSG_AUTH_SESSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub build: u32,
    pub realm_id: u32,
    pub account: NormalizedString,
    pub client_seed: u32,
    pub digest: [u8; SHA1_LENGTH],
    pub addon_info: Vec<u8>,
}

impl AuthSession {
    /// Clients up to 2.4.3 send the short form.
    pub fn to_packet(&self, client_build: u16) -> Packet {
        let mut p = Packet::new(CMSG_AUTH_SESSION);

        if client_build <= LAST_LEGACY_HEADER_BUILD {
            p.write_u32(self.build)
                .write_u32(self.realm_id)
                .write_bytes(self.account.as_bytes())
                .write_u8(0)
                .write_u32(self.client_seed)
                .write_bytes(&self.digest)
                .write_bytes(&self.addon_info);
        } else {
            p.write_u32(self.build)
                // Login server id
                .write_u32(0)
                .write_bytes(self.account.as_bytes())
                .write_u8(0)
                // Login server type
                .write_u32(0)
                .write_u32(self.client_seed)
                // Region and battlegroup
                .write_u32(0)
                .write_u32(0)
                .write_u32(self.realm_id)
                // DOS response
                .write_u64(0)
                .write_bytes(&self.digest)
                .write_bytes(&self.addon_info);
        }

        p
    }
}

/// First byte of `SMSG_AUTH_RESPONSE`, plus the queue position when queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResponse {
    pub result: WorldAuthResult,
    pub queue_position: Option<u32>,
}

impl AuthResponse {
    /// # Errors
    ///
    /// Errors if the body is empty.
    pub fn read(packet: &Packet) -> Result<Self, SessionError> {
        let mut p = packet.clone();
        p.set_read_position(0);

        let result = WorldAuthResult::from_u8(p.read_u8());
        if p.has_read_overflow() {
            return Err(malformed("SMSG_AUTH_RESPONSE"));
        }

        let queue_position = if result == WorldAuthResult::WaitQueue && p.remaining() >= 4 {
            Some(p.read_u32())
        } else {
            None
        };

        Ok(Self {
            result,
            queue_position,
        })
    }
}

/// Visible item in a character slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterEquipment {
    pub display_id: u32,
    pub inventory_type: u8,
    pub enchant: u32,
}

/// One entry of `SMSG_CHAR_ENUM`. Fields are surfaced as sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub guid: u64,
    pub name: String,
    pub race: u8,
    pub class: u8,
    pub gender: u8,
    /// Skin, face, hair style and hair color, one byte each.
    pub appearance: u32,
    pub facial_hair: u8,
    pub level: u8,
    pub zone: u32,
    pub map: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub guild: u32,
    pub flags: u32,
    pub customization_flags: u32,
    pub first_login: u8,
    pub pet_display_id: u32,
    pub pet_level: u32,
    pub pet_family: u32,
    pub equipment: [CharacterEquipment; CHARACTER_EQUIPMENT_SLOTS],
}

impl Character {
    fn read(p: &mut Packet) -> Self {
        let guid = p.read_u64();
        let name = p.read_cstring();
        let race = p.read_u8();
        let class = p.read_u8();
        let gender = p.read_u8();
        let appearance = p.read_u32();
        let facial_hair = p.read_u8();
        let level = p.read_u8();
        let zone = p.read_u32();
        let map = p.read_u32();
        let x = p.read_f32();
        let y = p.read_f32();
        let z = p.read_f32();
        let guild = p.read_u32();
        let flags = p.read_u32();
        let customization_flags = p.read_u32();
        let first_login = p.read_u8();
        let pet_display_id = p.read_u32();
        let pet_level = p.read_u32();
        let pet_family = p.read_u32();

        let mut equipment = [CharacterEquipment::default(); CHARACTER_EQUIPMENT_SLOTS];
        for item in equipment.iter_mut() {
            item.display_id = p.read_u32();
            item.inventory_type = p.read_u8();
            item.enchant = p.read_u32();
        }

        Self {
            guid,
            name,
            race,
            class,
            gender,
            appearance,
            facial_hair,
            level,
            zone,
            map,
            x,
            y,
            z,
            guild,
            flags,
            customization_flags,
            first_login,
            pet_display_id,
            pet_level,
            pet_family,
            equipment,
        }
    }

    pub fn write(&self, p: &mut Packet) {
        p.write_u64(self.guid)
            .write_cstring(&self.name)
            .write_u8(self.race)
            .write_u8(self.class)
            .write_u8(self.gender)
            .write_u32(self.appearance)
            .write_u8(self.facial_hair)
            .write_u8(self.level)
            .write_u32(self.zone)
            .write_u32(self.map)
            .write_f32(self.x)
            .write_f32(self.y)
            .write_f32(self.z)
            .write_u32(self.guild)
            .write_u32(self.flags)
            .write_u32(self.customization_flags)
            .write_u8(self.first_login)
            .write_u32(self.pet_display_id)
            .write_u32(self.pet_level)
            .write_u32(self.pet_family);

        for item in &self.equipment {
            p.write_u32(item.display_id)
                .write_u8(item.inventory_type)
                .write_u32(item.enchant);
        }
    }
}

/// Reads the character list of `SMSG_CHAR_ENUM`.
///
/// # Errors
///
/// Errors if the body ends before the last character.
pub fn read_character_list(packet: &Packet) -> Result<Vec<Character>, SessionError> {
    let mut p = packet.clone();
    p.set_read_position(0);

    let count = p.read_u8();
    let mut characters = Vec::with_capacity(count.into());
    for _ in 0..count {
        characters.push(Character::read(&mut p));
        if p.has_read_overflow() {
            return Err(malformed("SMSG_CHAR_ENUM"));
        }
    }

    if p.has_read_overflow() {
        return Err(malformed("SMSG_CHAR_ENUM"));
    }

    Ok(characters)
}

/// `CMSG_CHAR_ENUM`, empty body.
pub fn character_list_request() -> Packet {
    Packet::new(CMSG_CHAR_ENUM)
}

/// `CMSG_PLAYER_LOGIN`.
pub fn player_login(guid: u64) -> Packet {
    let mut p = Packet::new(CMSG_PLAYER_LOGIN);
    p.write_u64(guid);
    p
}

/// Spawn point from `SMSG_LOGIN_VERIFY_WORLD`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoginVerifyWorld {
    pub map: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

impl LoginVerifyWorld {
    /// # Errors
    ///
    /// Errors if the body is shorter than 20 bytes.
    pub fn read(packet: &Packet) -> Result<Self, SessionError> {
        let mut p = packet.clone();
        p.set_read_position(0);

        let v = Self {
            map: p.read_u32(),
            x: p.read_f32(),
            y: p.read_f32(),
            z: p.read_f32(),
            orientation: p.read_f32(),
        };

        if p.has_read_overflow() {
            return Err(malformed("SMSG_LOGIN_VERIFY_WORLD"));
        }

        Ok(v)
    }
}

/// `CMSG_PING`.
pub fn ping(sequence: u32, latency: u32) -> Packet {
    let mut p = Packet::new(CMSG_PING);
    p.write_u32(sequence).write_u32(latency);
    p
}

/// Sequence echoed in `SMSG_PONG`.
///
/// # Errors
///
/// Errors if the body is shorter than 4 bytes.
pub fn read_pong(packet: &Packet) -> Result<u32, SessionError> {
    let mut p = packet.clone();
    p.set_read_position(0);

    let sequence = p.read_u32();
    if p.has_read_overflow() {
        return Err(malformed("SMSG_PONG"));
    }

    Ok(sequence)
}

/// Expands the body of `SMSG_COMPRESSED_UPDATE_OBJECT` into an `SMSG_UPDATE_OBJECT` body.
///
/// # Errors
///
/// Errors if the body is not a length followed by zlib data of that length, or if the
/// length is above [`MAXIMUM_RECEIVE_BUFFER_SIZE`].
pub fn decompress_update(body: &[u8]) -> Result<Vec<u8>, SessionError> {
    if body.len() < 4 {
        return Err(malformed("SMSG_COMPRESSED_UPDATE_OBJECT"));
    }
    let expected = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;

    if expected > MAXIMUM_RECEIVE_BUFFER_SIZE {
        return Err(SessionError::protocol(format!(
            "compressed update declares {} bytes, more than the {} byte limit",
            expected, MAXIMUM_RECEIVE_BUFFER_SIZE
        )));
    }

    // One byte past the declared length is enough to detect a mismatch.
    let mut decompressed = Vec::with_capacity(expected);
    ZlibDecoder::new(&body[4..])
        .take(expected as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| SessionError::protocol(format!("invalid compressed update: {}", e)))?;

    if decompressed.len() > expected {
        return Err(SessionError::protocol(format!(
            "compressed update expands past the declared {} bytes",
            expected
        )));
    }
    if decompressed.len() != expected {
        return Err(SessionError::protocol(format!(
            "compressed update expanded to {} bytes instead of {}",
            decompressed.len(),
            expected
        )));
    }

    Ok(decompressed)
}

#[cfg(test)]
mod test {
    use crate::error::ErrorKind;
    use crate::key::SessionKey;
    use crate::normalized_string::NormalizedString;
    use crate::packet::Packet;
    use crate::transport::MAXIMUM_RECEIVE_BUFFER_SIZE;
    use crate::world::opcodes::SMSG_CHAR_ENUM;
    use crate::world::packets::{
        calculate_auth_digest, decompress_update, empty_addon_info, read_character_list,
        AuthChallenge, AuthResponse, AuthSession, Character, CharacterEquipment,
        LoginVerifyWorld, CHARACTER_EQUIPMENT_SLOTS,
    };
    use crate::world::result::WorldAuthResult;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn session_key() -> SessionKey {
        SessionKey::from_le_bytes([
            115, 0, 100, 222, 18, 15, 156, 194, 27, 1, 216, 229, 165, 207, 78, 233, 183, 241,
            248, 73, 190, 142, 14, 89, 44, 235, 153, 190, 103, 206, 34, 88, 45, 199, 104, 175, 79,
            108, 93, 48,
        ])
    }

    #[test]
    fn auth_digest_vector() {
        let digest = calculate_auth_digest(
            &NormalizedString::new("A").unwrap(),
            1266519981,
            0xDEADBEEF,
            &session_key(),
        );

        assert_eq!(
            digest,
            [
                202, 54, 102, 180, 90, 87, 9, 107, 217, 97, 235, 56, 221, 203, 108, 19, 109, 141,
                137, 7
            ]
        );
    }

    #[test]
    fn auth_challenge_forms() {
        let tbc = AuthChallenge::read(&Packet::with_data(0, vec![0xEF, 0xBE, 0xAD, 0xDE])).unwrap();
        assert_eq!(tbc.server_seed, 0xDEADBEEF);
        assert_eq!(tbc.unknown, None);

        let mut data = vec![1, 0, 0, 0, 0xEF, 0xBE, 0xAD, 0xDE];
        let wrath = AuthChallenge::read(&Packet::with_data(0, data.clone())).unwrap();
        assert_eq!(wrath.unknown, Some(1));
        assert_eq!(wrath.server_seed, 0xDEADBEEF);
        assert_eq!(wrath.seeds, None);

        data.extend_from_slice(&[0xAB; 32]);
        let seeded = AuthChallenge::read(&Packet::with_data(0, data.clone())).unwrap();
        assert_eq!(seeded.seeds, Some([0xAB; 32]));
        assert_eq!(seeded.to_packet().data(), data.as_slice());

        assert!(AuthChallenge::read(&Packet::with_data(0, vec![1, 2, 3])).is_err());
    }

    #[test]
    fn auth_session_layouts() {
        let addon_info = empty_addon_info().unwrap();
        assert_eq!(&addon_info[..4], &[8, 0, 0, 0]);

        let session = AuthSession {
            build: 12340,
            realm_id: 1,
            account: NormalizedString::new("a").unwrap(),
            client_seed: 0x1122_3344,
            digest: [0xDD; 20],
            addon_info: addon_info.clone(),
        };

        let wrath = session.to_packet(12340);
        let wrath = wrath.data();
        assert_eq!(&wrath[..4], &12340_u32.to_le_bytes());
        assert_eq!(&wrath[4..8], &[0; 4]);
        assert_eq!(&wrath[8..10], b"A\0");
        assert_eq!(&wrath[14..18], &0x1122_3344_u32.to_le_bytes());
        assert_eq!(&wrath[26..30], &1_u32.to_le_bytes());
        assert_eq!(&wrath[38..58], &[0xDD; 20]);
        assert_eq!(&wrath[58..], addon_info.as_slice());

        let tbc = session.to_packet(8606);
        let tbc = tbc.data();
        assert_eq!(&tbc[4..8], &1_u32.to_le_bytes());
        assert_eq!(&tbc[8..10], b"A\0");
        assert_eq!(&tbc[10..14], &0x1122_3344_u32.to_le_bytes());
        assert_eq!(&tbc[14..34], &[0xDD; 20]);
        assert_eq!(tbc.len(), 34 + addon_info.len());
    }

    #[test]
    fn addon_info_decompresses_to_zeroes() {
        let addon_info = empty_addon_info().unwrap();
        assert_eq!(decompress_update(&addon_info).unwrap(), vec![0; 8]);
    }

    #[test]
    fn auth_response() {
        let ok = AuthResponse::read(&Packet::with_data(0, vec![0x0C, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]))
            .unwrap();
        assert_eq!(ok.result, WorldAuthResult::Ok);
        assert_eq!(ok.queue_position, None);

        let queued = AuthResponse::read(&Packet::with_data(0, vec![0x1B, 7, 0, 0, 0])).unwrap();
        assert_eq!(queued.result, WorldAuthResult::WaitQueue);
        assert_eq!(queued.queue_position, Some(7));

        assert!(AuthResponse::read(&Packet::with_data(0, Vec::new())).is_err());
    }

    fn character(name: &str) -> Character {
        let mut equipment = [CharacterEquipment::default(); CHARACTER_EQUIPMENT_SLOTS];
        equipment[4] = CharacterEquipment {
            display_id: 9891,
            inventory_type: 5,
            enchant: 0,
        };

        Character {
            guid: 0x0000_0000_0000_0042,
            name: name.to_string(),
            race: 1,
            class: 1,
            gender: 0,
            appearance: 0x0102_0304,
            facial_hair: 2,
            level: 80,
            zone: 1519,
            map: 0,
            x: -8949.95,
            y: -132.493,
            z: 83.5312,
            guild: 0,
            flags: 0,
            customization_flags: 0,
            first_login: 0,
            pet_display_id: 0,
            pet_level: 0,
            pet_family: 0,
            equipment,
        }
    }

    #[test]
    fn character_list() {
        let mut p = Packet::new(SMSG_CHAR_ENUM);
        p.write_u8(2);
        character("Alpha").write(&mut p);
        character("").write(&mut p);

        let characters = read_character_list(&p).unwrap();
        assert_eq!(characters, vec![character("Alpha"), character("")]);
        assert_eq!(characters[0].equipment[4].display_id, 9891);

        let empty = read_character_list(&Packet::with_data(SMSG_CHAR_ENUM, vec![0])).unwrap();
        assert!(empty.is_empty());

        let truncated = Packet::with_data(SMSG_CHAR_ENUM, p.data()[..p.len() - 1].to_vec());
        assert!(read_character_list(&truncated).is_err());
    }

    #[test]
    fn login_verify_world() {
        let mut p = Packet::new(0);
        p.write_u32(571)
            .write_f32(5804.0)
            .write_f32(624.5)
            .write_f32(647.75)
            .write_f32(1.5);

        let v = LoginVerifyWorld::read(&p).unwrap();
        assert_eq!(v.map, 571);
        assert_eq!(v.x, 5804.0);
        assert_eq!(v.orientation, 1.5);

        let short = Packet::with_data(0, p.data()[..19].to_vec());
        assert!(LoginVerifyWorld::read(&short).is_err());
    }

    #[test]
    fn compressed_update() {
        let pattern = (0..16).collect::<Vec<u8>>();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&pattern).unwrap();

        let mut body = 16_u32.to_le_bytes().to_vec();
        body.extend_from_slice(&encoder.finish().unwrap());
        assert_eq!(decompress_update(&body).unwrap(), pattern);

        body[0] = 17;
        assert!(decompress_update(&body).is_err());
        assert!(decompress_update(&[16, 0, 0, 0, 1, 2, 3]).is_err());
        assert!(decompress_update(&[1, 2]).is_err());
    }

    #[test]
    fn compressed_update_declaring_too_much_is_refused() {
        let mut body = u32::MAX.to_le_bytes().to_vec();
        body.extend_from_slice(&[0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);

        let e = decompress_update(&body).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Protocol);
        assert!(e.reason().contains("4294967295"), "{}", e.reason());

        let over_limit = (MAXIMUM_RECEIVE_BUFFER_SIZE as u32 + 1).to_le_bytes();
        assert!(decompress_update(&over_limit).is_err());
    }

    #[test]
    fn compressed_update_expanding_past_declared_length_stops_early() {
        // 8 MiB of zeroes squeezes into about 8 KiB, one legal frame.
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        let zeroes = vec![0_u8; 1024 * 1024];
        for _ in 0..8 {
            encoder.write_all(&zeroes).unwrap();
        }
        let mut body = 16_u32.to_le_bytes().to_vec();
        body.extend_from_slice(&encoder.finish().unwrap());
        assert!(body.len() <= 16384);

        let e = decompress_update(&body).unwrap_err();
        assert_eq!(
            e.reason(),
            "compressed update expands past the declared 16 bytes"
        );
    }
}

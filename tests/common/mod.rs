//! Scripted peers for driving the sessions over a `MemoryTransport`.

#![allow(dead_code)]

use wow_session::header_crypto::{
    CipherGeneration, HeaderCipher, LegacyDecrypter, LegacyEncrypter, Rc4Cipher,
};
use wow_session::logon::packets::{
    LogonChallengeResponse, PinChallenge, SecurityFlags, ServerChallenge,
};
use wow_session::logon::LogonResult;
use wow_session::{SessionKey, GENERATOR, LARGE_SAFE_PRIME_LITTLE_ENDIAN};
use wow_session::MemoryTransport;

pub const SESSION_KEY: [u8; 40] = [
    115, 0, 100, 222, 18, 15, 156, 194, 27, 1, 216, 229, 165, 207, 78, 233, 183, 241, 248, 73,
    190, 142, 14, 89, 44, 235, 153, 190, 103, 206, 34, 88, 45, 199, 104, 175, 79, 108, 93, 48,
];

pub fn session_key() -> SessionKey {
    SessionKey::from_le_bytes(SESSION_KEY)
}

/// Successful challenge with the 3.3.5a prime and any valid `B`.
pub fn challenge(flags: u8) -> Vec<u8> {
    let flags = SecurityFlags::new(flags);

    LogonChallengeResponse {
        protocol_version: 0,
        result: LogonResult::Success,
        challenge: Some(ServerChallenge {
            server_public_key: [0x42; 32],
            generator: vec![GENERATOR],
            large_safe_prime: LARGE_SAFE_PRIME_LITTLE_ENDIAN.to_vec(),
            salt: [0x13; 32],
            integrity_salt: [0x24; 16],
            security_flags: flags,
            pin: flags.pin().then_some(PinChallenge {
                grid_seed: 0x0012_3456,
                server_salt: [0x35; 16],
            }),
            matrix_card: None,
            authenticator_required: flags.authenticator().then_some(1),
        }),
    }
    .write()
}

pub fn challenge_failure(result: LogonResult) -> Vec<u8> {
    LogonChallengeResponse {
        protocol_version: 0,
        result,
        challenge: None,
    }
    .write()
}

/// Server end of a world connection.
///
/// Mirrors the client's header ciphers once [`WorldServer::start_encryption`] is called.
pub struct WorldServer {
    pub peer: MemoryTransport,
    to_client: Option<Box<dyn HeaderCipher>>,
    from_client: Option<Box<dyn HeaderCipher>>,
}

impl WorldServer {
    pub fn new(peer: MemoryTransport) -> Self {
        Self {
            peer,
            to_client: None,
            from_client: None,
        }
    }

    pub fn start_encryption(&mut self, key: &SessionKey, build: u16) {
        let (to_client, from_client): (Box<dyn HeaderCipher>, Box<dyn HeaderCipher>) =
            match CipherGeneration::for_build(build) {
                CipherGeneration::Legacy => (
                    Box::new(LegacyEncrypter::new(key)),
                    Box::new(LegacyDecrypter::new(key)),
                ),
                // RC4 is symmetric, the same keystream both encrypts and decrypts.
                CipherGeneration::Rc4 => (
                    Box::new(Rc4Cipher::decrypter(key)),
                    Box::new(Rc4Cipher::encrypter(key)),
                ),
            };
        self.to_client = Some(to_client);
        self.from_client = Some(from_client);
    }

    /// Header and body as the server would put them on the wire.
    pub fn frame(&mut self, opcode: u16, body: &[u8]) -> Vec<u8> {
        let mut frame = ((body.len() + 2) as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(&opcode.to_le_bytes());
        if let Some(cipher) = self.to_client.as_mut() {
            cipher.process(&mut frame);
        }
        frame.extend_from_slice(body);
        frame
    }

    pub fn send(&mut self, opcode: u16, body: &[u8]) {
        let frame = self.frame(opcode, body);
        self.peer.push_inbound(&frame);
    }

    /// Everything the client wrote since the last call, headers decrypted.
    pub fn received(&mut self) -> Vec<(u32, Vec<u8>)> {
        let mut data = self.peer.take_outbound();
        let mut packets = Vec::new();

        while data.len() >= 6 {
            if let Some(cipher) = self.from_client.as_mut() {
                cipher.process(&mut data[..6]);
            }
            let size = u16::from_be_bytes([data[0], data[1]]) as usize;
            let opcode = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
            let end = 2 + size;
            packets.push((opcode, data[6..end].to_vec()));
            data.drain(..end);
        }

        assert!(data.is_empty(), "client wrote a partial frame");
        packets
    }
}

//! Functionality for encrypting/decrypting [World Packet] headers.
//!
//! Once the world session has sent `CMSG_AUTH_SESSION` every header in both directions is
//! encrypted with a cipher keyed by the session key. Packet bodies are never encrypted,
//! and [Login Packets] are not encrypted at all.
//!
//! There are two generations of cipher behind the same [`HeaderCipher`] trait:
//!
//! * [`legacy`] for clients up to and including 2.4.3 (build 8606).
//! * [`rc4`] for later clients.
//!
//! [`ClientHeaderCrypto`] picks the right one from the client build and holds both directions.
//!
//! Client headers are [6 bytes](CLIENT_HEADER_LENGTH) and server headers are
//! [4 bytes](SERVER_HEADER_LENGTH).
//!
//! [World Packet]: https://wowdev.wiki/World_Packet
//! [Login Packets]: https://wowdev.wiki/Login_Packet

pub use legacy::{LegacyDecrypter, LegacyEncrypter};
pub use rc4::Rc4Cipher;
pub use traits::HeaderCipher;
pub use traits::CLIENT_HEADER_LENGTH;
pub use traits::SERVER_HEADER_LENGTH;

use crate::config::LAST_LEGACY_HEADER_BUILD;
use crate::key::SessionKey;

pub mod legacy;
pub mod rc4;
pub(crate) mod traits;

/// Decrypted server header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHeader {
    /// Opcode plus body length.
    pub size: u16,
    pub opcode: u16,
}

impl ServerHeader {
    /// Size is big endian, opcode is little endian.
    pub const fn from_bytes(data: [u8; SERVER_HEADER_LENGTH as usize]) -> Self {
        Self {
            size: u16::from_be_bytes([data[0], data[1]]),
            opcode: u16::from_le_bytes([data[2], data[3]]),
        }
    }
}

/// Which [`HeaderCipher`] a [`ClientHeaderCrypto`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherGeneration {
    Legacy,
    Rc4,
}

impl CipherGeneration {
    pub const fn for_build(build: u16) -> Self {
        if build <= LAST_LEGACY_HEADER_BUILD {
            Self::Legacy
        } else {
            Self::Rc4
        }
    }
}

/// Both directions of header encryption for a client.
pub struct ClientHeaderCrypto {
    generation: CipherGeneration,
    encrypter: Box<dyn HeaderCipher + Send>,
    decrypter: Box<dyn HeaderCipher + Send>,
}

impl ClientHeaderCrypto {
    /// Selects the cipher from the client build.
    pub fn new(session_key: &SessionKey, build: u16) -> Self {
        Self::with_generation(session_key, CipherGeneration::for_build(build))
    }

    pub fn with_generation(session_key: &SessionKey, generation: CipherGeneration) -> Self {
        let (encrypter, decrypter): (Box<dyn HeaderCipher + Send>, Box<dyn HeaderCipher + Send>) =
            match generation {
                CipherGeneration::Legacy => (
                    Box::new(LegacyEncrypter::new(session_key)),
                    Box::new(LegacyDecrypter::new(session_key)),
                ),
                CipherGeneration::Rc4 => (
                    Box::new(Rc4Cipher::encrypter(session_key)),
                    Box::new(Rc4Cipher::decrypter(session_key)),
                ),
            };

        Self {
            generation,
            encrypter,
            decrypter,
        }
    }

    pub const fn generation(&self) -> CipherGeneration {
        self.generation
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.encrypter.process(data);
    }

    /// Convenience function for encrypting client headers.
    ///
    /// Prefer this over directly using [`ClientHeaderCrypto::encrypt`].
    pub fn encrypt_client_header(
        &mut self,
        size: u16,
        opcode: u32,
    ) -> [u8; CLIENT_HEADER_LENGTH as usize] {
        let mut header = traits::client_header_bytes(size, opcode);
        self.encrypt(&mut header);

        header
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.decrypter.process(data);
    }

    /// Convenience function for decrypting server headers.
    ///
    /// Prefer this over directly using [`ClientHeaderCrypto::decrypt`].
    pub fn decrypt_server_header(
        &mut self,
        mut data: [u8; SERVER_HEADER_LENGTH as usize],
    ) -> ServerHeader {
        self.decrypt(&mut data);

        ServerHeader::from_bytes(data)
    }
}

impl std::fmt::Debug for ClientHeaderCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHeaderCrypto")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

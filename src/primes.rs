use crate::bigint;
use crate::config::{HashEndianness, KMode};
use crate::digest::sha1;

/// The size in bytes of the [large safe prime](LARGE_SAFE_PRIME_LITTLE_ENDIAN) used by
/// practically every server.
///
/// The [public key](crate::PUBLIC_KEY_LENGTH) fields in the logon packets are statically 32 bytes
/// wide and since the public key is generated modulo the large safe prime, large safe prime lengths
/// of greater than 32 could lead to public keys that were unable to be sent over the network.
#[doc(alias = "N")]
pub const LARGE_SAFE_PRIME_LENGTH: u8 = 32;

/// Largest `N` and `g` the challenge packet can describe, since their lengths are a single byte.
pub const MAXIMUM_CHALLENGE_VALUE_LENGTH: usize = 256;

/// Static large safe prime (`N`) value.
/// The big endian version of [LARGE_SAFE_PRIME_LITTLE_ENDIAN].
#[doc(alias = "N")]
pub const LARGE_SAFE_PRIME_BIG_ENDIAN: [u8; LARGE_SAFE_PRIME_LENGTH as usize] = [
    0x89, 0x4b, 0x64, 0x5e, 0x89, 0xe1, 0x53, 0x5b, 0xbd, 0xad, 0x5b, 0x8b, 0x29, 0x6, 0x50, 0x53,
    0x8, 0x1, 0xb1, 0x8e, 0xbf, 0xbf, 0x5e, 0x8f, 0xab, 0x3c, 0x82, 0x87, 0x2a, 0x3e, 0x9b, 0xb7,
];

/// Static large safe prime (`N`) value as sent over the network in the
/// [CMD_AUTH_LOGON_CHALLENGE_Server](https://wowdev.wiki/CMD_AUTH_LOGON_CHALLENGE_Server)
/// packet by servers for the 1.12, 2.4.3 and 3.3.5 clients.
#[doc(alias = "N")]
pub const LARGE_SAFE_PRIME_LITTLE_ENDIAN: [u8; LARGE_SAFE_PRIME_LENGTH as usize] = [
    0xb7, 0x9b, 0x3e, 0x2a, 0x87, 0x82, 0x3c, 0xab, 0x8f, 0x5e, 0xbf, 0xbf, 0x8e, 0xb1, 0x1, 0x8,
    0x53, 0x50, 0x6, 0x29, 0x8b, 0x5b, 0xad, 0xbd, 0x5b, 0x53, 0xe1, 0x89, 0x5e, 0x64, 0x4b, 0x89,
];

/// `N` as received from the server, little endian, 1 to 256 bytes.
#[derive(Debug, Clone)]
pub(crate) struct LargeSafePrime {
    prime: Vec<u8>,
}

impl Default for LargeSafePrime {
    fn default() -> Self {
        Self {
            prime: LARGE_SAFE_PRIME_LITTLE_ENDIAN.to_vec(),
        }
    }
}

impl LargeSafePrime {
    /// `None` if the value is empty, too long or zero.
    pub fn from_le_bytes(prime: &[u8]) -> Option<Self> {
        if !valid_challenge_value(prime) {
            return None;
        }

        Some(Self {
            prime: prime.to_vec(),
        })
    }

    pub fn to_bigint(&self) -> bigint::Integer {
        bigint::Integer::from_bytes_le(&self.prime)
    }

    /// Bytes at the natural width of the integer.
    pub fn natural_le(&self) -> Vec<u8> {
        self.to_bigint().to_bytes_le()
    }

    /// Bytes exactly as received, including any zero padding.
    pub fn as_le(&self) -> &[u8] {
        &self.prime
    }
}

/// Called `g` in [RFC2945](https://tools.ietf.org/html/rfc2945).
/// Statically set to 7 by the known servers, but received in the challenge.
#[doc(alias = "g")]
pub const GENERATOR: u8 = 7;

/// The length in bytes for [GENERATOR].
#[doc(alias = "g")]
pub const GENERATOR_LENGTH: u8 = 1;

/// `g` as received from the server, little endian, 1 to 256 bytes.
#[derive(Debug, Clone)]
pub(crate) struct Generator {
    generator: Vec<u8>,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            generator: vec![GENERATOR],
        }
    }
}

impl Generator {
    /// `None` if the value is empty, too long or zero.
    pub fn from_le_bytes(generator: &[u8]) -> Option<Self> {
        if !valid_challenge_value(generator) {
            return None;
        }

        Some(Self {
            generator: generator.to_vec(),
        })
    }

    pub fn to_bigint(&self) -> bigint::Integer {
        bigint::Integer::from_bytes_le(&self.generator)
    }

    pub fn natural_le(&self) -> Vec<u8> {
        self.to_bigint().to_bytes_le()
    }

    pub fn as_le(&self) -> &[u8] {
        &self.generator
    }
}

fn valid_challenge_value(v: &[u8]) -> bool {
    !v.is_empty() && v.len() <= MAXIMUM_CHALLENGE_VALUE_LENGTH && v.iter().any(|b| *b != 0)
}

/// The multiplier `k` used by the game client.
pub const K_VALUE: u8 = 3;

pub(crate) struct KValue {}
impl KValue {
    pub fn bigint(
        mode: KMode,
        large_safe_prime: &LargeSafePrime,
        generator: &Generator,
        endianness: HashEndianness,
    ) -> bigint::Integer {
        match mode {
            KMode::Three => bigint::Integer::from(K_VALUE),
            KMode::Hashed => {
                // k = H(N | g) over the fields as sent, padding included
                let k = sha1(&[large_safe_prime.as_le(), generator.as_le()]);
                endianness.hash_to_bigint(&k)
            }
        }
    }
}

use crate::bigint;

use rand::{thread_rng, RngCore};
use zeroize::Zeroize;

use crate::error::InvalidPublicKeyError;
use crate::primes::{LargeSafePrime, LARGE_SAFE_PRIME_LENGTH};

macro_rules! key_bigint {
    ($name: ident) => {
        impl $name {
            pub(crate) fn to_bigint(&self) -> bigint::Integer {
                bigint::Integer::from_bytes_le(&self.key)
            }
        }
    };
}

macro_rules! key_new {
    ($name: ident; $size: expr) => {
        impl Default for $name {
            fn default() -> Self {
                let mut key = [0_u8; $size];
                thread_rng().fill_bytes(&mut key);
                Self::from_le_bytes(key)
            }
        }

        impl $name {
            #[allow(dead_code)]
            pub(crate) fn randomized() -> Self {
                Self::default()
            }
        }
    };
}

macro_rules! key_no_checks_initialization {
    ($name: ident; $size: expr) => {
        impl $name {
            /// Creates the struct from little endian bytes.
            ///
            /// Values are stored internally as little endian so no reversal occurs.
            #[allow(dead_code)]
            pub const fn from_le_bytes(key: [u8; $size]) -> Self {
                Self { key }
            }

            #[cfg(test)]
            #[allow(dead_code)]
            pub(crate) fn from_le_hex_str(s: &str) -> Self {
                let key = hex::decode(s).unwrap();

                let key = <[u8; $size]>::try_from(key).unwrap();

                Self { key }
            }
        }
    };
}

macro_rules! key_wrapper {
    ($(#[$meta: meta])* $name: ident; $size: expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            key: [u8; $size],
        }

        key_eq!($name);

        impl $name {
            /// Returns the value as little endian bytes.
            ///
            /// The bytes are stored internally as little endian, so this causes no reversal.
            pub const fn as_le(&self) -> &[u8; $size] {
                &self.key
            }
        }
    };
}

macro_rules! key_eq {
    ($name: ident) => {
        impl Eq for $name {}
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                let other = other.as_le();

                for (i, value) in self.key.iter().enumerate() {
                    if *value != other[i] {
                        return false;
                    }
                }

                true
            }
        }
    };
}

/// The salt is always 32 bytes since the client expects
/// a 32 byte salt field in the
/// [CMD_AUTH_LOGON_CHALLENGE_Server](https://wowdev.wiki/CMD_AUTH_LOGON_CHALLENGE_Server)
/// packet and will use leading zeros in the calculation.
#[doc(alias = "salt")]
pub const SALT_LENGTH: u8 = 32;
key_wrapper!(
    /// Salt `s` sent by the server.
    Salt; SALT_LENGTH as usize
);
key_new!(Salt; SALT_LENGTH as usize);
key_no_checks_initialization!(Salt; SALT_LENGTH as usize);

/// Length in bytes of the client private key `a`.
///
/// The client draws 19 random bytes, which is what the game client does as well.
#[doc(alias = "a")]
pub const PRIVATE_KEY_LENGTH: u8 = 19;

/// Length in bytes for both client and server public key.
///
/// Public keys are always 32 bytes because of the fixed width in the
/// [CMD_AUTH_LOGON_PROOF](https://wowdev.wiki/CMD_AUTH_LOGON_PROOF_Client)
/// and
/// [CMD_AUTH_LOGON_CHALLENGE_Server](https://wowdev.wiki/CMD_AUTH_LOGON_CHALLENGE_Server)
/// packets.
#[doc(alias = "A")]
#[doc(alias = "B")]
pub const PUBLIC_KEY_LENGTH: u8 = LARGE_SAFE_PRIME_LENGTH;
key_wrapper!(
    /// Represents a public key for both the client and server.
    ///
    /// Will return an error if all elements are 0, or the bytes represented as an integer
    /// modulus the large safe prime `N` sent by the server is equal to 0.
    PublicKey; PUBLIC_KEY_LENGTH as usize
);
key_bigint!(PublicKey);

impl PublicKey {
    /// Creates the struct from little endian bytes.
    ///
    /// # Errors
    ///
    /// Will error if the key is zero.
    /// The check against the large safe prime happens once it is known.
    pub fn from_le_bytes(key: [u8; PUBLIC_KEY_LENGTH as usize]) -> Result<Self, InvalidPublicKeyError> {
        if key.iter().all(|b| *b == 0) {
            return Err(InvalidPublicKeyError::PublicKeyIsZero);
        }

        Ok(Self { key })
    }

    // The large safe prime is sent by the server so can't be known ahead of time,
    // meaning every key needs the full modulo check.
    pub(crate) fn check_against(
        &self,
        large_safe_prime: &LargeSafePrime,
    ) -> Result<(), InvalidPublicKeyError> {
        if self.to_bigint().mod_is_zero(&large_safe_prime.to_bigint()) {
            return Err(InvalidPublicKeyError::PublicKeyModLargeSafePrimeIsZero);
        }
        Ok(())
    }

    pub(crate) fn client_try_from_bigint(
        b: bigint::Integer,
        large_safe_prime: &LargeSafePrime,
    ) -> Result<Self, InvalidPublicKeyError> {
        if b.is_zero() {
            return Err(InvalidPublicKeyError::PublicKeyIsZero);
        }
        if b.mod_is_zero(&large_safe_prime.to_bigint()) {
            return Err(InvalidPublicKeyError::PublicKeyModLargeSafePrimeIsZero);
        }

        Ok(Self {
            key: b.to_padded_32_byte_array_le(),
        })
    }

    /// Bytes at the natural width of the integer, as used inside the hashes.
    pub(crate) fn natural_le(&self) -> Vec<u8> {
        self.to_bigint().to_bytes_le()
    }

    #[cfg(test)]
    pub(crate) fn from_le_hex_str(s: &str) -> Self {
        let key = hex::decode(s).unwrap();
        Self {
            key: <[u8; PUBLIC_KEY_LENGTH as usize]>::try_from(key).unwrap(),
        }
    }
}

/// A SHA1 hash is always 20 bytes (160 bits) as specified in [RFC3174](https://tools.ietf.org/html/rfc3174).
pub const SHA1_HASH_LENGTH: u8 = 20;
key_wrapper!(
    /// SHA-1 output that is later interpreted as an integer.
    Sha1Hash; SHA1_HASH_LENGTH as usize
);
key_no_checks_initialization!(Sha1Hash; SHA1_HASH_LENGTH as usize);

/// Length of a proof in bytes.
///
/// Is always 20 bytes because proofs are [SHA-1 hashes](https://en.wikipedia.org/wiki/SHA-1)
/// which have a fixed output size.
#[doc(alias = "M1")]
#[doc(alias = "M2")]
#[doc(alias = "M")]
pub const PROOF_LENGTH: u8 = 20;
key_wrapper!(
    /// Client (`M1`) or server (`M2`) proof.
    Proof; PROOF_LENGTH as usize
);
key_no_checks_initialization!(Proof; PROOF_LENGTH as usize);

pub(crate) const S_LENGTH: u8 = LARGE_SAFE_PRIME_LENGTH;
key_wrapper!(
    /// Intermediate value `S`, padded to 32 bytes.
    SKey; S_LENGTH as usize
);
key_no_checks_initialization!(SKey; S_LENGTH as usize);

/// Size of the session key in bytes.
///
/// Always 40 bytes since it is the result of 2 SHA-1 [proofs](PROOF_LENGTH) concatenated.
#[doc(alias = "K")]
pub const SESSION_KEY_LENGTH: u8 = PROOF_LENGTH * 2;

/// Session key `K` derived by SRP6.
///
/// Seeds the world header ciphers and the world authentication digest.
/// The bytes are wiped when the value is dropped or [`SessionKey::clear`] is called,
/// and [`Debug`](std::fmt::Debug) never prints them.
#[doc(alias = "K")]
pub struct SessionKey {
    key: [u8; SESSION_KEY_LENGTH as usize],
}

key_eq!(SessionKey);
key_no_checks_initialization!(SessionKey; SESSION_KEY_LENGTH as usize);

impl SessionKey {
    /// Returns the value as little endian bytes.
    pub const fn as_le(&self) -> &[u8; SESSION_KEY_LENGTH as usize] {
        &self.key
    }

    /// Overwrites the key with zeroes in place.
    pub fn clear(&mut self) {
        self.key.zeroize();
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey([redacted])")
    }
}

//! Digest helpers shared by the SRP6 engine, the world session and the header ciphers.
//!
//! Every function takes the input as a list of byte slices that are hashed in order,
//! which mirrors how the protocol describes its hashes as concatenations.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::{Digest, Sha1};

/// Length of a SHA-1 digest.
pub const SHA1_LENGTH: usize = 20;
/// Length of an MD5 digest.
pub const MD5_LENGTH: usize = 16;

/// `SHA1(parts[0] | parts[1] | …)`.
pub fn sha1(parts: &[&[u8]]) -> [u8; SHA1_LENGTH] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `MD5(parts[0] | parts[1] | …)`.
pub fn md5(parts: &[&[u8]]) -> [u8; MD5_LENGTH] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `HMAC-SHA1(key, parts[0] | parts[1] | …)`.
#[allow(clippy::missing_panics_doc)] // Can't actually panic, HMAC takes keys of any length
pub fn hmac_sha1(key: &[u8], parts: &[&[u8]]) -> [u8; SHA1_LENGTH] {
    let mut hmac: Hmac<Sha1> = Hmac::<Sha1>::new_from_slice(key).unwrap();
    for part in parts {
        hmac.update(part);
    }
    hmac.finalize().into_bytes().into()
}

//! The SRP6 formulas as used by the game client.
//!
//! Every function here is a pure computation over already validated values.
//! The [`client`](crate::client) module strings them together and owns validation.
//!
//! Values that are hashed are serialized at their natural little endian width,
//! except for the salt which is hashed as the 32 bytes received.
//! Hashes that are used as integers go through [`HashEndianness`].

use crate::bigint::Integer;
use crate::config::HashEndianness;
use crate::digest::sha1;
use crate::error::InvalidPublicKeyError;
use crate::key::{
    Proof, PublicKey, SKey, Salt, SessionKey, Sha1Hash, SESSION_KEY_LENGTH, S_LENGTH,
};
use crate::normalized_string::NormalizedString;
use crate::primes::{Generator, LargeSafePrime};

/// `H( upper(account) | : | upper(password) )`.
///
/// This is the value clients persist instead of the password.
pub(crate) fn calculate_credentials_hash(
    account: &NormalizedString,
    password: &NormalizedString,
) -> Sha1Hash {
    Sha1Hash::from_le_bytes(sha1(&[account.as_bytes(), b":", password.as_bytes()]))
}

/// `x = H( salt | credentials_hash )`.
pub(crate) fn calculate_x(
    credentials_hash: &Sha1Hash,
    salt: &Salt,
    endianness: HashEndianness,
) -> Integer {
    let x = sha1(&[salt.as_le(), credentials_hash.as_le()]);
    endianness.hash_to_bigint(&x)
}

/// `A = g^a % N`.
pub(crate) fn calculate_client_public_key(
    client_private_key: &Integer,
    generator: &Generator,
    large_safe_prime: &LargeSafePrime,
) -> Result<PublicKey, InvalidPublicKeyError> {
    let client_public_key = generator
        .to_bigint()
        .modpow(client_private_key, &large_safe_prime.to_bigint());

    PublicKey::client_try_from_bigint(client_public_key, large_safe_prime)
}

/// `u = H( A | B )`.
pub(crate) fn calculate_u(
    client_public_key: &PublicKey,
    server_public_key: &PublicKey,
    endianness: HashEndianness,
) -> Integer {
    let u = sha1(&[
        &client_public_key.natural_le(),
        &server_public_key.natural_le(),
    ]);
    endianness.hash_to_bigint(&u)
}

/// `S = (B + k * N - k * (g^x % N))^(a + u * x) % N`.
///
/// `k * N` keeps the base from going negative.
/// The natural width of `N` must be at most 32 bytes.
#[allow(non_snake_case)] // There is no better descriptor than 'S'
pub(crate) fn calculate_client_S(
    server_public_key: &PublicKey,
    k: &Integer,
    x: &Integer,
    client_private_key: &Integer,
    u: &Integer,
    generator: &Generator,
    large_safe_prime: &LargeSafePrime,
) -> SKey {
    let n = large_safe_prime.to_bigint();
    let v = generator.to_bigint().modpow(x, &n);

    let base = server_public_key.to_bigint() + k.clone() * n.clone() - k.clone() * v;
    let exponent = client_private_key.clone() + u.clone() * x.clone();

    let S = base.modpow(&exponent, &n);

    SKey::from_le_bytes(S.to_padded_32_byte_array_le())
}

/// `K` is `SHA1` over the even bytes of `S` interleaved with `SHA1` over the odd bytes.
#[allow(non_snake_case)]
pub(crate) fn calculate_interleaved(S: &SKey) -> SessionKey {
    let S = S.as_le();

    let mut E = Vec::with_capacity(S_LENGTH as usize / 2);
    let mut F = Vec::with_capacity(S_LENGTH as usize / 2);
    for pair in S.chunks_exact(2) {
        E.push(pair[0]);
        F.push(pair[1]);
    }

    let G = sha1(&[&E]);
    let H = sha1(&[&F]);

    let mut result = [0_u8; SESSION_KEY_LENGTH as usize];
    for (i, (g, h)) in G.iter().zip(H.iter()).enumerate() {
        result[i * 2] = *g;
        result[i * 2 + 1] = *h;
    }

    SessionKey::from_le_bytes(result)
}

/// `H(N) ^ H(g)`.
pub(crate) fn calculate_xor_hash(
    large_safe_prime: &LargeSafePrime,
    generator: &Generator,
) -> Sha1Hash {
    let large_safe_prime_hash = sha1(&[&large_safe_prime.natural_le()]);
    let g_hash = sha1(&[&generator.natural_le()]);

    let mut xor_hash = [0_u8; 20];
    for (i, n) in large_safe_prime_hash.iter().enumerate() {
        xor_hash[i] = n ^ g_hash[i];
    }

    Sha1Hash::from_le_bytes(xor_hash)
}

/// `M1 = H( H(N) ^ H(g) | H(upper(account)) | salt | A | B | K )`.
pub(crate) fn calculate_client_proof(
    account: &NormalizedString,
    session_key: &SessionKey,
    client_public_key: &PublicKey,
    server_public_key: &PublicKey,
    salt: &Salt,
    large_safe_prime: &LargeSafePrime,
    generator: &Generator,
) -> Proof {
    let xor_hash = calculate_xor_hash(large_safe_prime, generator);
    let account_hash = sha1(&[account.as_bytes()]);

    Proof::from_le_bytes(sha1(&[
        xor_hash.as_le(),
        &account_hash,
        salt.as_le(),
        &client_public_key.natural_le(),
        &server_public_key.natural_le(),
        session_key.as_le(),
    ]))
}

/// `M2 = H( A | M1 | K )`.
pub(crate) fn calculate_server_proof(
    client_public_key: &PublicKey,
    client_proof: &Proof,
    session_key: &SessionKey,
) -> Proof {
    Proof::from_le_bytes(sha1(&[
        &client_public_key.natural_le(),
        client_proof.as_le(),
        session_key.as_le(),
    ]))
}

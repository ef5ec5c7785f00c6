//! The client half of the SRP6 exchange with the logon server.
//!
//! All arrays are **little endian**.
//!
//! # Usage
//!
//! The [Typestate](https://yoric.github.io/post/rust-typestate/) pattern is used
//! in order to prevent incorrect use.
//! Every step consumes the previous object and returns the next one, so values can not be
//! requested before they have been calculated.
//!
//! ```text
//! SrpClientUser -> SrpClientChallenge -> SrpClient
//! ```
//!
//! 1. [`SrpClientUser`] is created from the account name and [`Credentials`].
//! 2. The values from the logon challenge response are passed to
//! [`SrpClientUser::into_challenge`], which calculates the client public key, the session key
//! and the client proof.
//! 3. The client public key and proof are sent in the logon proof.
//! 4. The server proof from the logon proof response is passed to
//! [`SrpClientChallenge::verify_server_proof`]. Only if it matches is the server trusted.
//!
//! The [`LogonSession`](crate::logon::session::LogonSession) drives these steps over the network.
//!
//! # Example
//!
//! ```
//! use wow_session::client::{Credentials, SrpClientUser};
//! use wow_session::normalized_string::NormalizedString;
//! use wow_session::SrpOptions;
//! use wow_session::{GENERATOR, LARGE_SAFE_PRIME_LITTLE_ENDIAN};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let account = NormalizedString::new("alice")?;
//! let credentials = Credentials::password("password123")?;
//!
//! let client = SrpClientUser::new(account, credentials, SrpOptions::default());
//!
//! // Normally received in the logon challenge response
//! let server_public_key = [0x42_u8; 32];
//! let salt = [0x13_u8; 32];
//!
//! let challenge = client.into_challenge(
//!     &[GENERATOR],
//!     &LARGE_SAFE_PRIME_LITTLE_ENDIAN,
//!     server_public_key,
//!     salt,
//! )?;
//!
//! let _a = challenge.client_public_key();
//! let _m1 = challenge.client_proof();
//! # Ok(())
//! # }
//! ```

use crate::bigint::Integer;
use crate::config::SrpOptions;
use crate::error::{MatchProofsError, NormalizedStringError, SrpError};
use crate::key::{
    Proof, PublicKey, Salt, SessionKey, Sha1Hash, PRIVATE_KEY_LENGTH, PROOF_LENGTH,
    PUBLIC_KEY_LENGTH, SALT_LENGTH, SHA1_HASH_LENGTH,
};
use crate::normalized_string::NormalizedString;
use crate::primes::{Generator, KValue, LargeSafePrime, LARGE_SAFE_PRIME_LENGTH};
use crate::srp_internal::{
    calculate_client_S, calculate_client_proof, calculate_client_public_key,
    calculate_credentials_hash, calculate_interleaved, calculate_server_proof, calculate_u,
    calculate_x,
};
use std::fmt::{Debug, Formatter};
use tracing::{debug, warn};

/// Private keys are drawn at most this many times before giving up on finding one
/// whose public key is nonzero modulo `N`.
pub const MAXIMUM_EPHEMERAL_ATTEMPTS: u32 = 100;

/// What the client proves knowledge of.
pub enum Credentials {
    /// Cleartext password, uppercased.
    Password(NormalizedString),
    /// Precomputed `SHA1( upper(account) | : | upper(password) )`.
    ///
    /// Lets hosts persist credentials without keeping the password around.
    Hash([u8; SHA1_HASH_LENGTH as usize]),
}

impl Credentials {
    /// # Errors
    ///
    /// Errors if the password is not a valid [`NormalizedString`].
    pub fn password(password: impl Into<String>) -> Result<Self, NormalizedStringError> {
        Ok(Self::Password(NormalizedString::new(password)?))
    }

    pub const fn hash(hash: [u8; SHA1_HASH_LENGTH as usize]) -> Self {
        Self::Hash(hash)
    }

    fn to_credentials_hash(&self, account: &NormalizedString) -> Sha1Hash {
        match self {
            Credentials::Password(password) => calculate_credentials_hash(account, password),
            Credentials::Hash(hash) => Sha1Hash::from_le_bytes(*hash),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Credentials::Password([redacted])"),
            Credentials::Hash(_) => f.write_str("Credentials::Hash([redacted])"),
        }
    }
}

/// Final step of the exchange. Previous is [`SrpClientChallenge`].
///
/// Once this exists the server has proven that it knows the password verifier,
/// and both sides hold the same session key.
#[derive(Debug)]
pub struct SrpClient {
    account: NormalizedString,
    session_key: SessionKey,
}

impl SrpClient {
    pub const fn account(&self) -> &NormalizedString {
        &self.account
    }

    /// Called `K` in [RFC2945](https://tools.ietf.org/html/rfc2945).
    #[doc(alias = "K")]
    pub const fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Moves the session key out, for handing it to the world session.
    pub fn into_session_key(self) -> SessionKey {
        self.session_key
    }
}

/// Second step of the exchange. First is [`SrpClientUser`]. Next is [`SrpClient`].
///
/// The client public key and proof are sent to the server in the logon proof
/// before the server proof is available.
pub struct SrpClientChallenge {
    account: NormalizedString,
    client_proof: Proof,
    client_public_key: PublicKey,
    expected_server_proof: Proof,
    session_key: SessionKey,
}

impl SrpClientChallenge {
    /// Called `M1` in most literature.
    #[doc(alias = "M")]
    #[doc(alias = "M1")]
    pub const fn client_proof(&self) -> &[u8; PROOF_LENGTH as usize] {
        self.client_proof.as_le()
    }

    /// Called `A` in [RFC2945](https://tools.ietf.org/html/rfc2945), zero padded to 32 bytes.
    #[doc(alias = "A")]
    pub const fn client_public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH as usize] {
        self.client_public_key.as_le()
    }

    /// Whether `M2` from the server is the expected one, without consuming the challenge.
    #[doc(alias = "M2")]
    pub fn server_proof_matches(&self, server_proof: &[u8; PROOF_LENGTH as usize]) -> bool {
        self.expected_server_proof == Proof::from_le_bytes(*server_proof)
    }

    /// Verifies that the server knows the password verifier.
    ///
    /// # Errors
    ///
    /// Errors if the server proof is not the expected one, in which case the identity of the
    /// server can not be trusted and the session key must be discarded.
    pub fn verify_server_proof(
        self,
        server_proof: [u8; PROOF_LENGTH as usize],
    ) -> Result<SrpClient, MatchProofsError> {
        if !self.server_proof_matches(&server_proof) {
            warn!("server proof does not match");
            return Err(MatchProofsError {
                expected_proof: *self.expected_server_proof.as_le(),
                server_proof,
            });
        }

        Ok(SrpClient {
            account: self.account,
            session_key: self.session_key,
        })
    }
}

/// Starting point of the exchange. Next step is [`SrpClientChallenge`].
pub struct SrpClientUser {
    account: NormalizedString,
    credentials_hash: Sha1Hash,
    options: SrpOptions,
    #[cfg(test)]
    client_private_key: Option<[u8; PRIVATE_KEY_LENGTH as usize]>,
}

impl SrpClientUser {
    pub fn new(account: NormalizedString, credentials: Credentials, options: SrpOptions) -> Self {
        let credentials_hash = credentials.to_credentials_hash(&account);

        Self {
            account,
            credentials_hash,
            options,
            #[cfg(test)]
            client_private_key: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_specific_private_key(
        mut self,
        client_private_key: [u8; PRIVATE_KEY_LENGTH as usize],
    ) -> Self {
        self.client_private_key = Some(client_private_key);
        self
    }

    pub const fn account(&self) -> &NormalizedString {
        &self.account
    }

    /// Takes the values from the logon challenge response and computes the next step.
    ///
    /// `generator` and `large_safe_prime` are the little endian byte strings from the packet.
    ///
    /// # Errors
    ///
    /// * [`SrpError::InvalidChallenge`] if `g` or `N` is empty, zero or longer than 256 bytes,
    /// if `N` is wider than the 32 byte public key field, or if `B` is zero modulo `N`.
    /// * [`SrpError::EphemeralExhausted`] if no usable private key was found.
    pub fn into_challenge(
        self,
        generator: &[u8],
        large_safe_prime: &[u8],
        server_public_key: [u8; PUBLIC_KEY_LENGTH as usize],
        salt: [u8; SALT_LENGTH as usize],
    ) -> Result<SrpClientChallenge, SrpError> {
        let generator = Generator::from_le_bytes(generator).ok_or(SrpError::InvalidChallenge(
            "g is empty, zero or longer than 256 bytes",
        ))?;
        let large_safe_prime = LargeSafePrime::from_le_bytes(large_safe_prime).ok_or(
            SrpError::InvalidChallenge("N is empty, zero or longer than 256 bytes"),
        )?;
        if large_safe_prime.natural_le().len() > LARGE_SAFE_PRIME_LENGTH as usize {
            return Err(SrpError::InvalidChallenge(
                "N is wider than the 32 byte public key field",
            ));
        }

        let server_public_key = PublicKey::from_le_bytes(server_public_key)
            .map_err(|_| SrpError::InvalidChallenge("B is zero"))?;
        server_public_key
            .check_against(&large_safe_prime)
            .map_err(|_| SrpError::InvalidChallenge("B modulo N is zero"))?;

        let (client_private_key, client_public_key) =
            self.generate_ephemeral(&generator, &large_safe_prime)?;

        let salt = Salt::from_le_bytes(salt);
        let endianness = self.options.hash_endianness;

        let x = calculate_x(&self.credentials_hash, &salt, endianness);
        let u = calculate_u(&client_public_key, &server_public_key, endianness);
        let k = KValue::bigint(
            self.options.k_mode,
            &large_safe_prime,
            &generator,
            endianness,
        );

        #[allow(non_snake_case)] // No better descriptor
        let S = calculate_client_S(
            &server_public_key,
            &k,
            &x,
            &client_private_key,
            &u,
            &generator,
            &large_safe_prime,
        );
        let session_key = calculate_interleaved(&S);

        let client_proof = calculate_client_proof(
            &self.account,
            &session_key,
            &client_public_key,
            &server_public_key,
            &salt,
            &large_safe_prime,
            &generator,
        );
        let expected_server_proof =
            calculate_server_proof(&client_public_key, &client_proof, &session_key);

        Ok(SrpClientChallenge {
            account: self.account,
            client_proof,
            client_public_key,
            expected_server_proof,
            session_key,
        })
    }

    fn generate_ephemeral(
        &self,
        generator: &Generator,
        large_safe_prime: &LargeSafePrime,
    ) -> Result<(Integer, PublicKey), SrpError> {
        for attempt in 1..=MAXIMUM_EPHEMERAL_ATTEMPTS {
            let client_private_key = self.draw_private_key();

            match calculate_client_public_key(&client_private_key, generator, large_safe_prime) {
                Ok(client_public_key) => {
                    debug!(attempt, "generated client ephemeral");
                    return Ok((client_private_key, client_public_key));
                }
                Err(e) => {
                    debug!(attempt, "discarding client ephemeral: {}", e);
                }
            }
        }

        warn!(
            attempts = MAXIMUM_EPHEMERAL_ATTEMPTS,
            "no valid client ephemeral found"
        );
        Err(SrpError::EphemeralExhausted)
    }

    #[cfg(not(test))]
    #[allow(clippy::unused_self)]
    fn draw_private_key(&self) -> Integer {
        Integer::random(PRIVATE_KEY_LENGTH as usize)
    }

    #[cfg(test)]
    fn draw_private_key(&self) -> Integer {
        self.client_private_key.map_or_else(
            || Integer::random(PRIVATE_KEY_LENGTH as usize),
            |key| Integer::from_bytes_le(&key),
        )
    }
}

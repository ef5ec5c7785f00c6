//! The various errors that can happen during authentication and while running a session.
//!
//! [`SrpError`] is an enum that can represent all the SRP6 error types.
//!
//! The exact conditions for [`NormalizedStringError`] are described in the
//! [`normalized_string`](`crate::normalized_string`) module.
//!
//! [`InvalidPublicKeyError`] is returned when the server sends an invalid public key.
//!
//! [`MatchProofsError`] is returned when server and client proofs do not match.
//!
//! [`SessionError`] is what the logon and world sessions return and hand to their failure
//! callbacks. Its [`ErrorKind`] decides whether the connection is closed.

use crate::error::NormalizedStringError::StringTooLong;
use crate::key::PROOF_LENGTH;
use std::error::Error;
use std::fmt::{Display, Formatter, Result};

/// Enum that covers all SRP error types.
#[derive(Debug)]
pub enum SrpError {
    /// Server proof does not match the expected one.
    ProofsDoNotMatch(MatchProofsError),
    /// Public key is either 0 or the public key modulus the large safe prime is 0.
    InvalidPublicKey(InvalidPublicKeyError),
    /// The string either contains an invalid character or is too long.
    NormalizedStringError(NormalizedStringError),
    /// `N` or `g` from the server is empty, zero or longer than 256 bytes.
    InvalidChallenge(&'static str),
    /// No private key with a usable public key was found within the retry limit.
    EphemeralExhausted,
}

impl Error for SrpError {}

impl Display for SrpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            SrpError::ProofsDoNotMatch(proofs) => {
                write!(f, "{}", proofs)
            }
            SrpError::InvalidPublicKey(error) => {
                write!(f, "{}", error)
            }
            SrpError::NormalizedStringError(error) => {
                write!(f, "{}", error)
            }
            SrpError::InvalidChallenge(reason) => {
                write!(f, "Invalid logon challenge: {}", reason)
            }
            SrpError::EphemeralExhausted => {
                write!(f, "Unable to generate a valid client public key.")
            }
        }
    }
}

impl From<InvalidPublicKeyError> for SrpError {
    fn from(i: InvalidPublicKeyError) -> Self {
        Self::InvalidPublicKey(i)
    }
}

impl From<MatchProofsError> for SrpError {
    fn from(m: MatchProofsError) -> Self {
        Self::ProofsDoNotMatch(m)
    }
}

impl From<NormalizedStringError> for SrpError {
    fn from(n: NormalizedStringError) -> Self {
        Self::NormalizedStringError(n)
    }
}

/// Error for when server and client proofs do not match.
///
/// This means that the server does not know the password verifier,
/// and that its identity can not be trusted.
#[derive(Debug)]
pub struct MatchProofsError {
    /// Proof the client calculated.
    pub expected_proof: [u8; PROOF_LENGTH as usize],
    /// Proof the server sent.
    pub server_proof: [u8; PROOF_LENGTH as usize],
}

impl Error for MatchProofsError {}

impl Display for MatchProofsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "Server proof does not match the expected proof.")
    }
}

/// A public key is invalid either if it equal to 0, or the public key modulus the
/// large safe prime is zero.
#[derive(Debug)]
pub enum InvalidPublicKeyError {
    /// The public key is zero.
    PublicKeyIsZero,
    /// The public key modulus the large safe prime is zero.
    PublicKeyModLargeSafePrimeIsZero,
}

impl Error for InvalidPublicKeyError {}

impl Display for InvalidPublicKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            InvalidPublicKeyError::PublicKeyIsZero => {
                write!(f, "Public key is zero.")
            }
            InvalidPublicKeyError::PublicKeyModLargeSafePrimeIsZero => {
                write!(f, "Public key modulus the large safe prime is zero.")
            }
        }
    }
}

/// Error for the [`normalized_string`](`crate::normalized_string`) module.
#[derive(Debug)]
pub enum NormalizedStringError {
    /// The specific character is not allowed.
    CharacterNotAllowed(char),
    /// The string is too long.
    StringTooLong,
}

impl Error for NormalizedStringError {}

impl Display for NormalizedStringError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            NormalizedStringError::CharacterNotAllowed(c) => {
                write!(f, "Character is not allowed: '{}'", c)
            }
            StringTooLong => {
                write!(f, "String is longer than allowed length.",)
            }
        }
    }
}

/// Category of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect refused, host unresolved, stream closed or a socket error.
    Transport,
    /// Undersized or oversized frames and receive buffer overflow.
    Framing,
    /// Malformed packet of a known opcode, or an operation not allowed in the current state.
    Protocol,
    /// The server rejected the credentials or the session.
    Auth,
    /// Server proof mismatch or unusable SRP6 parameters.
    Crypto,
    /// The logon server did not finish authentication in time.
    Timeout,
}

impl ErrorKind {
    /// Errors of this kind close the connection immediately.
    pub const fn closes_connection(self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::Framing | ErrorKind::Crypto
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let s = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Framing => "framing",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Auth => "auth",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Error returned by the logon and world sessions.
///
/// Carries a human readable reason that can be shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    kind: ErrorKind,
    reason: String,
    code: Option<u8>,
}

impl SessionError {
    pub(crate) fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            code: None,
        }
    }

    pub(crate) fn transport(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, reason)
    }

    pub(crate) fn framing(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Framing, reason)
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, reason)
    }

    pub(crate) fn crypto(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Crypto, reason)
    }

    pub(crate) fn auth(code: u8, reason: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Auth,
            reason: reason.into(),
            code: Some(code),
        }
    }

    /// Category of the error.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Status code sent by the server for [`ErrorKind::Auth`] errors.
    pub const fn code(&self) -> Option<u8> {
        self.code
    }
}

impl Error for SessionError {}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} error: {}", self.kind, self.reason)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::transport(e.to_string())
    }
}

impl From<SrpError> for SessionError {
    fn from(e: SrpError) -> Self {
        Self::crypto(e.to_string())
    }
}

impl From<MatchProofsError> for SessionError {
    fn from(e: MatchProofsError) -> Self {
        Self::crypto(e.to_string())
    }
}

//! Account names and passwords in the form the game client sends and hashes them.
//!
//! The client uppercases both the account name and the password before hashing, and sends
//! the uppercased account name in the logon challenge and in `CMSG_AUTH_SESSION`.
//! Logging in as `alice` and `ALICE` is therefore the same thing.
//!
//! Uppercasing is only well defined for ASCII. Non-ASCII letters are rendered and transmitted
//! by the client in ways that differ between letters, versions and localizations, so the only
//! way to agree with the server byte for byte is to reject them outright.
//!
//! The client allows up to 16 characters in both fields, which with the ASCII restriction
//! is also 16 bytes.

use crate::error::NormalizedStringError;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Account name or password containing only allowed characters, uppercased.
///
/// See [`normalized_string`](`crate::normalized_string`) for more information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedString {
    s: String,
}

/// The highest amount of letters that the client will allow in both the account name
/// and password fields.
pub const MAXIMUM_STRING_LENGTH_IN_BYTES: usize = 16;

impl NormalizedString {
    /// Rejects non-ASCII characters, ASCII control characters and strings longer than
    /// [`MAXIMUM_STRING_LENGTH_IN_BYTES`], and uppercases the rest.
    pub fn new(s: impl Into<String>) -> Result<Self, NormalizedStringError> {
        let s = s.into();

        if s.len() > MAXIMUM_STRING_LENGTH_IN_BYTES {
            return Err(NormalizedStringError::StringTooLong);
        }

        if let Some(c) = s.chars().find(|c| !c.is_ascii() || c.is_ascii_control()) {
            return Err(NormalizedStringError::CharacterNotAllowed(c));
        }

        Ok(Self {
            s: s.to_ascii_uppercase(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.s.as_bytes()
    }

    /// Always fits in the single length byte of the logon challenge.
    pub fn len(&self) -> u8 {
        self.s.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }
}

impl Display for NormalizedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.s)
    }
}

impl AsRef<str> for NormalizedString {
    fn as_ref(&self) -> &str {
        &self.s
    }
}

#[cfg(test)]
mod test {
    use crate::error::NormalizedStringError;
    use crate::normalized_string::NormalizedString;

    #[test]
    fn uppercases_printable_ascii() {
        let s = NormalizedString::new("alice_01!").unwrap();
        assert_eq!(s.as_ref(), "ALICE_01!");
        assert_eq!(s.as_bytes(), b"ALICE_01!");
        assert_eq!(s.len(), 9);
    }

    #[test]
    fn rejects_control_and_non_ascii() {
        for c in "\x00\x09\x1f\x7f¢ÐЖΩ".chars() {
            assert!(
                NormalizedString::new(c).is_err(),
                "Char should not be allowed: '{}'",
                c
            );
        }
    }

    #[test]
    fn length_limit() {
        assert!(NormalizedString::new("16bytelongstring").is_ok());

        match NormalizedString::new("17bytelongstringA") {
            Err(NormalizedStringError::StringTooLong) => {}
            other => panic!("expected StringTooLong, got {:?}", other),
        }
    }

    #[test]
    fn empty_is_allowed() {
        let s = NormalizedString::new("").unwrap();
        assert!(s.is_empty());
    }
}

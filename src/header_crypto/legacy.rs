use crate::header_crypto::traits::HeaderCipher;
use crate::key::{SessionKey, SESSION_KEY_LENGTH};
use zeroize::Zeroize;

/// Outgoing half of the header cipher used by clients up to 2.4.3.
///
/// `encrypted = (plain ^ K[index]) + previous_encrypted`.
pub struct LegacyEncrypter {
    session_key: [u8; SESSION_KEY_LENGTH as usize],
    index: u8,
    previous_value: u8,
}

impl LegacyEncrypter {
    pub fn new(session_key: &SessionKey) -> Self {
        Self {
            session_key: *session_key.as_le(),
            index: 0,
            previous_value: 0,
        }
    }
}

impl HeaderCipher for LegacyEncrypter {
    fn process(&mut self, data: &mut [u8]) {
        for unencrypted in data {
            // x = (d ^ session_key[index]) + previous_value
            let encrypted = (*unencrypted ^ self.session_key[self.index as usize])
                .wrapping_add(self.previous_value);

            // Use the session key as a circular buffer
            self.index = (self.index + 1) % SESSION_KEY_LENGTH;

            *unencrypted = encrypted;
            self.previous_value = encrypted;
        }
    }

    /// Only moves the key index, the feedback byte depends on real data.
    fn discard(&mut self, n: usize) {
        self.index = ((self.index as usize + n) % SESSION_KEY_LENGTH as usize) as u8;
    }
}

impl Drop for LegacyEncrypter {
    fn drop(&mut self) {
        self.session_key.zeroize();
    }
}

/// Incoming half of the header cipher used by clients up to 2.4.3.
///
/// Keeps its own index and feedback byte, so it is independent of the [`LegacyEncrypter`]
/// made from the same key.
pub struct LegacyDecrypter {
    session_key: [u8; SESSION_KEY_LENGTH as usize],
    index: u8,
    previous_value: u8,
}

impl LegacyDecrypter {
    pub fn new(session_key: &SessionKey) -> Self {
        Self {
            session_key: *session_key.as_le(),
            index: 0,
            previous_value: 0,
        }
    }
}

impl HeaderCipher for LegacyDecrypter {
    fn process(&mut self, data: &mut [u8]) {
        for encrypted in data {
            // unencrypted = (encrypted - previous_value) ^ session_key[index]
            let unencrypted = encrypted.wrapping_sub(self.previous_value)
                ^ self.session_key[self.index as usize];

            self.index = (self.index + 1) % SESSION_KEY_LENGTH;

            self.previous_value = *encrypted;
            *encrypted = unencrypted;
        }
    }

    fn discard(&mut self, n: usize) {
        self.index = ((self.index as usize + n) % SESSION_KEY_LENGTH as usize) as u8;
    }
}

impl Drop for LegacyDecrypter {
    fn drop(&mut self) {
        self.session_key.zeroize();
    }
}

#[cfg(test)]
mod test {
    use crate::header_crypto::legacy::{LegacyDecrypter, LegacyEncrypter};
    use crate::header_crypto::traits::HeaderCipher;
    use crate::key::SessionKey;
    use std::convert::TryInto;

    #[test]
    fn verify_mixed_use() {
        // Encrypting and decrypting with the same key must not interfere with each other
        let session_key = hex::decode(
            "2EFEE7B0C177EBBDFF6676C56EFC2339BE9CAD14BF8B54BB5A86FBF81F6D424AA23CC9A3149FB175",
        )
        .unwrap();
        let session_key = SessionKey::from_le_bytes(session_key.try_into().unwrap());

        let original_data = hex::decode("3d9ae196ef4f5be4df9ea8b9f4dd95fe68fe58b653cf1c2dbeaa0be167db9b27df32fd230f2eab9bd7e9b2f3fbf335d381ca").unwrap();
        let mut encrypt_data = original_data.clone();
        let mut decrypt_data = original_data.clone();

        let mut encrypter = LegacyEncrypter::new(&session_key);
        let mut decrypter = LegacyDecrypter::new(&session_key);
        const STEP: usize = 10;
        for i in (0..original_data.len()).step_by(STEP) {
            encrypter.process(&mut encrypt_data[i..i + STEP]);
            decrypter.process(&mut decrypt_data[i..i + STEP]);
        }

        let expected_decrypt = hex::decode("13a3a0059817e73404d97cd455159b50d40af74a22f719aacb6a9a2e991982c61a6f0285f880cc8512ec2ef1c98fa923512f").unwrap();
        let expected_encrypt = hex::decode("13777da3d109b912322a08841e3ff5bc92f4e98b77bb03997da999b22ae0b926a3b1e56580314b3932499ee11b9f7deb6915").unwrap();
        assert_eq!(expected_decrypt, decrypt_data);
        assert_eq!(expected_encrypt, encrypt_data);
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        let session_key = SessionKey::from_le_bytes([0x5A; 40]);
        let original = (0..=255_u8).collect::<Vec<_>>();
        let mut data = original.clone();

        LegacyEncrypter::new(&session_key).process(&mut data);
        assert_ne!(data, original);

        LegacyDecrypter::new(&session_key).process(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn discard_moves_the_key_index() {
        let mut session_key = [0_u8; 40];
        session_key[3] = 0xFF;
        let session_key = SessionKey::from_le_bytes(session_key);

        let mut encrypter = LegacyEncrypter::new(&session_key);
        encrypter.discard(43);

        let mut data = [0_u8];
        encrypter.process(&mut data);
        assert_eq!(data, [0xFF]);
    }
}

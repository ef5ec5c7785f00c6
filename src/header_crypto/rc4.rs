use crate::digest::hmac_sha1;
use crate::header_crypto::traits::HeaderCipher;
use crate::key::SessionKey;

/// Length of the fixed HMAC seeds.
pub const SEED_LENGTH: u8 = 16;

/// Keystream bytes thrown away right after keying.
pub const DROPPED_KEYSTREAM_LENGTH: usize = 1024;

/// Seed for client to server headers.
pub const ENCRYPT_SEED: [u8; SEED_LENGTH as usize] = [
    0xC2, 0xB3, 0x72, 0x3C, 0xC6, 0xAE, 0xD9, 0xB5, 0x34, 0x3C, 0x53, 0xEE, 0x2F, 0x43, 0x67, 0xCE,
];

/// Seed for server to client headers.
pub const DECRYPT_SEED: [u8; SEED_LENGTH as usize] = [
    0xCC, 0x98, 0xAE, 0x04, 0xE8, 0x97, 0xEA, 0xCA, 0x12, 0xDD, 0xC0, 0x93, 0x42, 0x91, 0x53, 0x57,
];

/// Header cipher used by clients after 2.4.3.
///
/// RC4 keyed with `HMAC-SHA1(seed, K)` that has already discarded the first
/// [`DROPPED_KEYSTREAM_LENGTH`] bytes of keystream.
pub struct Rc4Cipher {
    inner: Rc4,
}

impl Rc4Cipher {
    pub fn new(seed: &[u8; SEED_LENGTH as usize], session_key: &SessionKey) -> Self {
        let key = hmac_sha1(seed, &[session_key.as_le()]);

        let mut cipher = Self {
            inner: Rc4::new(&key),
        };
        cipher.discard(DROPPED_KEYSTREAM_LENGTH);

        cipher
    }

    /// Client to server direction.
    pub fn encrypter(session_key: &SessionKey) -> Self {
        Self::new(&ENCRYPT_SEED, session_key)
    }

    /// Server to client direction.
    pub fn decrypter(session_key: &SessionKey) -> Self {
        Self::new(&DECRYPT_SEED, session_key)
    }
}

impl HeaderCipher for Rc4Cipher {
    fn process(&mut self, data: &mut [u8]) {
        self.inner.apply_keystream(data);
    }

    fn discard(&mut self, n: usize) {
        for _ in 0..n {
            self.inner.pseudo_random_generation();
        }
    }
}

// Bespoke RC4 since the algorithm is short and it keeps the state wipeable.
struct Rc4 {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    fn new(key: &[u8]) -> Self {
        let mut state = Self {
            state: [0; 256],
            i: 0,
            j: 0,
        };

        state.key_scheduling_algorithm(key);

        state
    }

    fn apply_keystream(&mut self, stream: &mut [u8]) {
        for s in stream {
            *s ^= self.pseudo_random_generation();
        }
    }

    // https://en.wikipedia.org/wiki/RC4#Key-scheduling_algorithm_(KSA)
    fn key_scheduling_algorithm(&mut self, key: &[u8]) {
        self.state.iter_mut().enumerate().for_each(|(i, x)| {
            *x = i as u8;
        });

        let mut j = 0_u8;

        (0..256_usize).zip(key.iter().cycle()).for_each(|(i, k)| {
            j = j.wrapping_add(self.state[i]).wrapping_add(*k);

            self.state.swap(i, j.into());
        });
    }

    // https://en.wikipedia.org/wiki/RC4#Pseudo-random_generation_algorithm_(PRGA)
    fn pseudo_random_generation(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);

        self.state.swap(self.i.into(), self.j.into());

        let index = self.state[self.i as usize].wrapping_add(self.state[self.j as usize]);

        self.state[index as usize]
    }
}

impl Drop for Rc4 {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.state);
    }
}

#[cfg(test)]
mod test {
    use crate::header_crypto::rc4::{Rc4, Rc4Cipher};
    use crate::header_crypto::traits::HeaderCipher;
    use crate::key::SessionKey;

    #[test]
    fn rfc6229() {
        // https://datatracker.ietf.org/doc/html/rfc6229
        let key = [1_u8, 2, 3, 4, 5];
        let mut data = [0_u8; 32];
        let expected = [
            0xb2_u8, 0x39, 0x63, 0x05, 0xf0, 0x3d, 0xc0, 0x27, 0xcc, 0xc3, 0x52, 0x4a, 0x0a, 0x11,
            0x18, 0xa8, 0x69, 0x82, 0x94, 0x4f, 0x18, 0xfc, 0x82, 0xd5, 0x89, 0xc4, 0x03, 0xa4,
            0x7a, 0x0d, 0x09, 0x19,
        ];

        let mut rc = Rc4::new(&key);
        rc.apply_keystream(&mut data);
        assert_eq!(data, expected);
    }

    #[test]
    fn rfc6229_after_1024_bytes() {
        // Offset 1024 of the 40 bit key stream in RFC 6229
        let key = [1_u8, 2, 3, 4, 5];
        let expected = [
            0x30_u8, 0xab, 0xbc, 0xc7, 0xc2, 0x0b, 0x01, 0x60, 0x9f, 0x23, 0xee, 0x2d, 0x5f, 0x6b,
            0xb7, 0xdf,
        ];

        let mut cipher = Rc4Cipher {
            inner: Rc4::new(&key),
        };
        cipher.discard(1024);

        let mut data = [0_u8; 16];
        cipher.process(&mut data);
        assert_eq!(data, expected);
    }

    #[test]
    fn directions_are_independent() {
        let session_key = SessionKey::from_le_bytes([0x11; 40]);
        let mut encrypter = Rc4Cipher::encrypter(&session_key);
        let mut decrypter = Rc4Cipher::decrypter(&session_key);

        let mut a = [0_u8; 8];
        let mut b = [0_u8; 8];
        encrypter.process(&mut a);
        decrypter.process(&mut b);
        assert_ne!(a, b);
    }
}

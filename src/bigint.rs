#[cfg(all(feature = "srp-default-math", not(feature = "srp-fast-math")))]
use num_bigint::{BigInt, Sign};
use rand::{thread_rng, RngCore};
#[cfg(feature = "srp-fast-math")]
use rug::integer::Order;
#[cfg(feature = "srp-fast-math")]
use rug::Integer as RugInt;
use std::ops;

#[cfg(not(any(feature = "srp-fast-math", feature = "srp-default-math")))]
compile_error!("Either the 'srp-fast-math' feature or the 'srp-default-math' feature must be enabled.\n\n The features exclusively select an arbitrary integer library.\n Use 'srp-default-math' if you want no-dependency compilation, but slow execution speed. Use 'srp-fast-math' if you want exceptional execution speed but external dependencies.");

/// Non-negative arbitrary precision integer.
///
/// Every conversion to and from bytes names its endianness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Integer {
    #[cfg(all(feature = "srp-default-math", not(feature = "srp-fast-math")))]
    value: BigInt,
    #[cfg(feature = "srp-fast-math")]
    value: RugInt,
}

impl Integer {
    /// Cryptographically random integer of `length` bytes.
    pub fn random(length: usize) -> Self {
        let mut bytes = vec![0_u8; length];
        thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes_le(&bytes)
    }

    pub fn from_bytes_be(v: &[u8]) -> Self {
        let mut le = v.to_vec();
        le.reverse();
        Self::from_bytes_le(&le)
    }

    /// Little endian bytes at the natural width of the value.
    ///
    /// Zero is a single `0` byte.
    pub fn to_bytes_le(&self) -> Vec<u8> {
        let mut bytes = self.raw_bytes_le();
        while bytes.len() > 1 && bytes[bytes.len() - 1] == 0 {
            bytes.pop();
        }
        if bytes.is_empty() {
            bytes.push(0);
        }
        bytes
    }

    /// Little endian bytes zero padded on the high end to `length`.
    ///
    /// # Panics
    ///
    /// Panics if the natural width of the value is larger than `length`.
    pub fn to_padded_bytes_le(&self, length: usize) -> Vec<u8> {
        let value = self.to_bytes_le();
        assert!(
            value.len() <= length,
            "integer of {} bytes does not fit in {} bytes",
            value.len(),
            length
        );

        let mut out = vec![0_u8; length];
        out[0..value.len()].clone_from_slice(&value);
        out
    }

    pub fn to_padded_32_byte_array_le(&self) -> [u8; 32] {
        let value = self.to_padded_bytes_le(32);

        let mut array = [0_u8; 32];
        array.clone_from_slice(&value);

        array
    }

    pub fn is_zero(&self) -> bool {
        self.value == Integer::from(0).value
    }

    pub fn mod_is_zero(&self, modulus: &Integer) -> bool {
        (self.clone() % modulus.clone()).is_zero()
    }

    #[cfg(feature = "srp-fast-math")]
    fn raw_bytes_le(&self) -> Vec<u8> {
        self.value.to_digits(Order::LsfLe)
    }
    #[cfg(all(feature = "srp-default-math", not(feature = "srp-fast-math")))]
    fn raw_bytes_le(&self) -> Vec<u8> {
        self.value.to_bytes_le().1
    }

    #[cfg(feature = "srp-fast-math")]
    pub fn modpow(&self, exponent: &Self, modulus: &Self) -> Self {
        Self::from_bigint(
            self.value
                .clone()
                .secure_pow_mod(&exponent.value, &modulus.value),
        )
    }
    #[cfg(all(feature = "srp-default-math", not(feature = "srp-fast-math")))]
    pub fn modpow(&self, exponent: &Self, modulus: &Self) -> Self {
        Self::from_bigint(self.value.modpow(&exponent.value, &modulus.value))
    }

    #[cfg(feature = "srp-fast-math")]
    pub fn from_bytes_le(v: &[u8]) -> Self {
        Self::from_bigint(RugInt::from_digits(v, Order::LsfLe))
    }
    #[cfg(all(feature = "srp-default-math", not(feature = "srp-fast-math")))]
    pub fn from_bytes_le(v: &[u8]) -> Self {
        Self::from_bigint(BigInt::from_bytes_le(Sign::Plus, v))
    }

    #[cfg(feature = "srp-fast-math")]
    const fn from_bigint(bigint: RugInt) -> Self {
        Self { value: bigint }
    }
    #[cfg(all(feature = "srp-default-math", not(feature = "srp-fast-math")))]
    const fn from_bigint(bigint: BigInt) -> Self {
        Self { value: bigint }
    }
}

impl From<u8> for Integer {
    #[cfg(feature = "srp-fast-math")]
    fn from(v: u8) -> Self {
        Self::from_bigint(RugInt::from(v))
    }

    #[cfg(all(not(feature = "srp-fast-math"), feature = "srp-default-math"))]
    fn from(v: u8) -> Self {
        Self::from_bigint(BigInt::from(v))
    }
}

impl ops::Mul<Integer> for Integer {
    type Output = Self;

    fn mul(self, rhs: Integer) -> Self::Output {
        Self::from_bigint(self.value * rhs.value)
    }
}

impl ops::Add<Integer> for Integer {
    type Output = Self;

    fn add(self, rhs: Integer) -> Self::Output {
        Self::from_bigint(self.value + rhs.value)
    }
}

impl ops::Sub<Integer> for Integer {
    type Output = Self;

    fn sub(self, rhs: Integer) -> Self::Output {
        Self::from_bigint(self.value - rhs.value)
    }
}

impl ops::Rem<Integer> for Integer {
    type Output = Self;

    fn rem(self, rhs: Integer) -> Self::Output {
        Self::from_bigint(self.value % rhs.value)
    }
}

#[cfg(test)]
mod test {
    use crate::bigint::Integer;

    #[test]
    fn natural_width_strips_high_zeroes() {
        let i = Integer::from_bytes_le(&[7, 0, 0, 0]);
        assert_eq!(i.to_bytes_le(), vec![7]);

        let zero = Integer::from_bytes_le(&[0, 0]);
        assert_eq!(zero.to_bytes_le(), vec![0]);
        assert!(zero.is_zero());
    }

    #[test]
    fn padded_export_and_big_endian_import() {
        let i = Integer::from_bytes_le(&[2, 1]);
        assert_eq!(i.to_padded_bytes_le(4), vec![2, 1, 0, 0]);
        assert_eq!(Integer::from_bytes_be(&[1, 2]), i);
    }

    #[test]
    #[should_panic]
    fn padded_export_refuses_truncation() {
        let i = Integer::from_bytes_le(&[0, 0, 1]);
        let _ = i.to_padded_bytes_le(2);
    }

    #[test]
    fn arithmetic() {
        let n = Integer::from(23);
        let a = Integer::from(5).modpow(&Integer::from(3), &n);
        // 125 % 23
        assert_eq!(a, Integer::from(10));
        assert!((Integer::from(46)).mod_is_zero(&n));
        assert_eq!(
            (Integer::from(3) * Integer::from(4) + Integer::from(1) - Integer::from(2))
                % Integer::from(7),
            Integer::from(4)
        );
    }

    #[test]
    fn random_has_requested_width_at_most() {
        let r = Integer::random(19);
        assert!(r.to_bytes_le().len() <= 19);
    }
}

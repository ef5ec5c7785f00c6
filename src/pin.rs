//! PIN hash sent in the logon proof when the server sets the PIN security flag.
//!
//! The server sends a grid seed and a 16 byte salt in the logon challenge response.
//! The seed scrambles the on screen keypad, so what the client hashes is the position of
//! each pressed digit on the scrambled keypad rather than the digit itself.
//! [`calculate_proof`] draws a fresh client salt and returns it along with the hash.
use crate::digest::sha1;
use rand::{thread_rng, RngCore};

/// Length of both the server and client PIN salts.
pub const PIN_SALT_LENGTH: u8 = 16;
/// Length of the PIN hash.
pub const PIN_HASH_LENGTH: u8 = 20;

const MIN_PIN_LENGTH: usize = 4;
const MAX_PIN_LENGTH: usize = 10;
const PIN_GRID_SIZE: usize = 10;

/// Client half of the PIN exchange, written after the security flags in the logon proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinProof {
    pub client_salt: [u8; PIN_SALT_LENGTH as usize],
    pub hash: [u8; PIN_HASH_LENGTH as usize],
}

/// Random client salt.
pub fn random_client_salt() -> [u8; PIN_SALT_LENGTH as usize] {
    let mut buf = [0_u8; PIN_SALT_LENGTH as usize];
    thread_rng().fill_bytes(&mut buf);
    buf
}

/// Calculates the PIN hash with a fresh client salt.
///
/// Returns [`None`] if `pin` is not 4 to 10 ASCII digits.
pub fn calculate_proof(
    pin: &str,
    pin_grid_seed: u32,
    server_salt: &[u8; PIN_SALT_LENGTH as usize],
) -> Option<PinProof> {
    let client_salt = random_client_salt();
    let hash = calculate_hash(pin, pin_grid_seed, server_salt, &client_salt)?;

    Some(PinProof { client_salt, hash })
}

/// Calculate the hash of a PIN.
///
/// `pin` is the digits in the order they were pressed, so `"1234"` is the button presses
/// `1, 2, 3, 4` in the client.
///
/// Returns [`None`] if `pin` is not 4 to 10 ASCII digits.
pub fn calculate_hash(
    pin: &str,
    pin_grid_seed: u32,
    server_salt: &[u8; PIN_SALT_LENGTH as usize],
    client_salt: &[u8; PIN_SALT_LENGTH as usize],
) -> Option<[u8; PIN_HASH_LENGTH as usize]> {
    if pin.len() < MIN_PIN_LENGTH || pin.len() > MAX_PIN_LENGTH {
        return None;
    }

    let remapped_pin_grid = remap_pin_grid(pin_grid_seed);

    let mut bytes = Vec::with_capacity(pin.len());
    for c in pin.chars() {
        let digit = c.to_digit(10)? as u8;
        let index = remapped_pin_grid.iter().position(|a| *a == digit)?;
        bytes.push(b'0' + index as u8);
    }

    let server_hash = sha1(&[server_salt, &bytes]);

    Some(sha1(&[client_salt, &server_hash]))
}

/// Keypad order for a grid seed.
///
/// Every step takes the seed modulo the remaining digit count to pick the next digit
/// out of those remaining, then divides the seed by that count.
pub fn remap_pin_grid(mut pin_grid_seed: u32) -> [u8; PIN_GRID_SIZE] {
    let mut grid = [0_u8, 1, 2, 3, 4, 5, 6, 7, 8, 9];
    let mut remapped_grid = grid;

    for (remapped_index, i) in (1..=PIN_GRID_SIZE as u32).rev().enumerate() {
        let remainder = pin_grid_seed % i;
        pin_grid_seed /= i;
        remapped_grid[remapped_index] = grid[remainder as usize];

        let copy_size = i - remainder - 1;

        for i in 0..copy_size as usize {
            grid[remainder as usize + i] = grid[remainder as usize + i + 1];
        }
    }

    remapped_grid
}

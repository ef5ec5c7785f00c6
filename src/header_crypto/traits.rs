/// Length of headers sent by the client: `u16` size and `u32` opcode.
pub const CLIENT_HEADER_LENGTH: u8 =
    (std::mem::size_of::<u16>() + std::mem::size_of::<u32>()) as u8;
/// Length of headers sent by the server: `u16` size and `u16` opcode.
pub const SERVER_HEADER_LENGTH: u8 =
    (std::mem::size_of::<u16>() + std::mem::size_of::<u16>()) as u8;

/// One direction of header encryption.
///
/// Only header bytes go through the cipher, packet bodies are always plaintext.
pub trait HeaderCipher {
    /// Encrypts or decrypts `data` in place, depending on the direction of the cipher.
    fn process(&mut self, data: &mut [u8]);

    /// Advances the cipher by `n` bytes without touching any buffer.
    fn discard(&mut self, n: usize);
}

/// Size is big endian and counts the opcode, opcode is little endian.
pub(crate) fn client_header_bytes(size: u16, opcode: u32) -> [u8; CLIENT_HEADER_LENGTH as usize] {
    let size = size.to_be_bytes();
    let opcode = opcode.to_le_bytes();

    [size[0], size[1], opcode[0], opcode[1], opcode[2], opcode[3]]
}

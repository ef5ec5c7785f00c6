//! Cuts world packets out of the receive stream and frames outgoing ones.
//!
//! Client headers are 6 bytes: a big endian `u16` size that counts the 4 opcode bytes,
//! then a little endian `u32` opcode. Server headers are 4 bytes: a big endian `u16`
//! size that counts the 2 opcode bytes, then a little endian `u16` opcode.
//!
//! Once [`WorldFramer::enable_encryption`] has been called every header in both
//! directions goes through [`ClientHeaderCrypto`]. A server header can arrive split over
//! several reads, so the framer remembers how many of its bytes are already decrypted in
//! place and never runs a byte through the cipher twice.

use crate::error::SessionError;
use crate::header_crypto::traits::client_header_bytes;
use crate::header_crypto::{
    ClientHeaderCrypto, ServerHeader, CLIENT_HEADER_LENGTH, SERVER_HEADER_LENGTH,
};
use crate::key::SessionKey;
use crate::packet::Packet;
use crate::transport::MAXIMUM_RECEIVE_BUFFER_SIZE;

/// Smallest valid server size field, an empty body.
pub const MINIMUM_SERVER_FRAME_SIZE: u16 = 2;
/// Largest server size field accepted before the stream is considered corrupt.
pub const MAXIMUM_SERVER_FRAME_SIZE: u16 = 16384;

const SERVER_HEADER: usize = SERVER_HEADER_LENGTH as usize;

/// Framing state for one world connection.
#[derive(Debug, Default)]
pub struct WorldFramer {
    crypto: Option<ClientHeaderCrypto>,
    buffer: Vec<u8>,
    decrypted_header_bytes: usize,
}

impl WorldFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every header after this call is encrypted or decrypted.
    ///
    /// Must be called right after the plaintext `CMSG_AUTH_SESSION` has been written and
    /// before any byte of the server's reply is framed.
    pub fn enable_encryption(&mut self, session_key: &SessionKey, build: u16) {
        self.crypto = Some(ClientHeaderCrypto::new(session_key, build));
        self.decrypted_header_bytes = 0;
    }

    pub const fn is_encrypted(&self) -> bool {
        self.crypto.is_some()
    }

    /// Header and body of `packet` ready for the wire.
    ///
    /// # Errors
    ///
    /// Errors if the body is too large for the size field.
    pub fn encode(&mut self, packet: &Packet) -> Result<Vec<u8>, SessionError> {
        let size = packet.len() + 4;
        let size = u16::try_from(size).map_err(|_| {
            SessionError::framing(format!(
                "packet 0x{:03X} with {} body bytes does not fit a header",
                packet.opcode(),
                packet.len()
            ))
        })?;
        let opcode = u32::from(packet.opcode());

        let header = match self.crypto.as_mut() {
            Some(crypto) => crypto.encrypt_client_header(size, opcode),
            None => client_header_bytes(size, opcode),
        };

        let mut frame = Vec::with_capacity(CLIENT_HEADER_LENGTH as usize + packet.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(packet.data());
        Ok(frame)
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// Appends received bytes.
    ///
    /// # Errors
    ///
    /// Errors if the buffer would grow past [`MAXIMUM_RECEIVE_BUFFER_SIZE`].
    pub fn push(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.buffer.len() + data.len() > MAXIMUM_RECEIVE_BUFFER_SIZE {
            return Err(SessionError::framing(format!(
                "receive buffer exceeded {} bytes",
                MAXIMUM_RECEIVE_BUFFER_SIZE
            )));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Bytes received but not yet part of a returned packet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops buffered bytes and the cipher.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.crypto = None;
        self.decrypted_header_bytes = 0;
    }

    /// Next complete packet, or [`None`] if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Errors if the size field is outside of
    /// [`MINIMUM_SERVER_FRAME_SIZE`]..=[`MAXIMUM_SERVER_FRAME_SIZE`]. The stream can not be
    /// recovered after that.
    pub fn next_frame(&mut self) -> Result<Option<Packet>, SessionError> {
        let available = self.buffer.len().min(SERVER_HEADER);
        if let Some(crypto) = self.crypto.as_mut() {
            if available > self.decrypted_header_bytes {
                crypto.decrypt(&mut self.buffer[self.decrypted_header_bytes..available]);
            }
        }
        self.decrypted_header_bytes = available;

        if available < SERVER_HEADER {
            return Ok(None);
        }

        let header = ServerHeader::from_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);

        if !(MINIMUM_SERVER_FRAME_SIZE..=MAXIMUM_SERVER_FRAME_SIZE).contains(&header.size) {
            return Err(SessionError::framing(format!(
                "invalid world packet size {} for opcode 0x{:03X}",
                header.size, header.opcode
            )));
        }

        let frame_length = 2 + usize::from(header.size);
        if self.buffer.len() < frame_length {
            return Ok(None);
        }

        let body = self.buffer[SERVER_HEADER..frame_length].to_vec();
        self.buffer.drain(..frame_length);
        self.decrypted_header_bytes = 0;

        Ok(Some(Packet::with_data(header.opcode, body)))
    }
}

#[cfg(test)]
mod test {
    use crate::error::ErrorKind;
    use crate::header_crypto::ClientHeaderCrypto;
    use crate::key::SessionKey;
    use crate::packet::Packet;
    use crate::world::framing::WorldFramer;

    fn server_frame(opcode: u16, body: &[u8]) -> Vec<u8> {
        let mut v = ((body.len() + 2) as u16).to_be_bytes().to_vec();
        v.extend_from_slice(&opcode.to_le_bytes());
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn plaintext_client_header() {
        let mut framer = WorldFramer::new();
        let mut p = Packet::new(0x1ED);
        p.write_bytes(&[1, 2, 3]);

        assert_eq!(
            framer.encode(&p).unwrap(),
            vec![0x00, 0x07, 0xED, 0x01, 0x00, 0x00, 1, 2, 3]
        );
    }

    #[test]
    fn oversized_packet_is_rejected() {
        let mut framer = WorldFramer::new();
        let p = Packet::with_data(0x1ED, vec![0; usize::from(u16::MAX) - 3]);
        assert_eq!(framer.encode(&p).unwrap_err().kind(), ErrorKind::Framing);

        let p = Packet::with_data(0x1ED, vec![0; usize::from(u16::MAX) - 4]);
        assert!(framer.encode(&p).is_ok());
    }

    #[test]
    fn frames_in_any_chunking() {
        let mut stream = server_frame(0x1EC, &[1, 2, 3, 4]);
        stream.extend(server_frame(0x1DD, &[]));
        stream.extend(server_frame(0x03B, &[9; 100]));

        for chunk in [1, 2, 3, 5, 7, stream.len()] {
            let mut framer = WorldFramer::new();
            let mut packets = Vec::new();
            for part in stream.chunks(chunk) {
                framer.push(part).unwrap();
                while let Some(p) = framer.next_frame().unwrap() {
                    packets.push(p);
                }
            }

            assert_eq!(packets.len(), 3);
            assert_eq!(packets[0].opcode(), 0x1EC);
            assert_eq!(packets[0].data(), &[1, 2, 3, 4]);
            assert!(packets[1].is_empty());
            assert_eq!(packets[2].len(), 100);
            assert_eq!(framer.buffered(), 0);
        }
    }

    #[test]
    fn encrypted_headers_split_at_every_byte() {
        let key = SessionKey::from_le_bytes([0x5A; 40]);

        let mut server = ClientHeaderCrypto::new(&key, 12340);
        let mut stream = Vec::new();
        for (opcode, body) in [(0x1EE_u16, vec![0x0C]), (0x03B, vec![0]), (0x1DD, vec![7, 0, 0, 0])]
        {
            let mut frame = server_frame(opcode, &body);
            // The server encrypts with the client's decryption direction.
            server.decrypt(&mut frame[..4]);
            stream.extend(frame);
        }

        for chunk in 1..=stream.len() {
            let mut framer = WorldFramer::new();
            framer.enable_encryption(&key, 12340);

            let mut opcodes = Vec::new();
            for part in stream.chunks(chunk) {
                framer.push(part).unwrap();
                while let Some(p) = framer.next_frame().unwrap() {
                    opcodes.push(p.opcode());
                }
            }

            assert_eq!(opcodes, vec![0x1EE, 0x03B, 0x1DD]);
        }
    }

    #[test]
    fn size_bounds() {
        let mut framer = WorldFramer::new();
        framer.push(&[0x00, 0x02, 0xDD, 0x01]).unwrap();
        assert!(framer.next_frame().unwrap().unwrap().is_empty());

        let mut framer = WorldFramer::new();
        framer.push(&[0x40, 0x00, 0x3B, 0x00]).unwrap();
        assert!(framer.next_frame().unwrap().is_none());
        framer.push(&vec![0; 16382]).unwrap();
        assert_eq!(framer.next_frame().unwrap().unwrap().len(), 16382);

        for size in [[0x00, 0x01], [0x40, 0x01], [0x00, 0x00]] {
            let mut framer = WorldFramer::new();
            framer.push(&[size[0], size[1], 0x3B, 0x00]).unwrap();
            assert_eq!(
                framer.next_frame().unwrap_err().kind(),
                ErrorKind::Framing
            );
        }
    }
}

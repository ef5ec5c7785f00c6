//! Non-blocking byte streams under the logon and world sessions.
//!
//! Sessions only talk to the [`Transport`] trait, which makes it possible to drive them
//! over [`TcpTransport`] in production and over [`MemoryTransport`] in tests.

use crate::error::SessionError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::rc::Rc;
use tracing::{debug, trace};

/// Largest amount of unparsed bytes a session will hold.
pub const MAXIMUM_RECEIVE_BUFFER_SIZE: usize = 8 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 4096;

/// Byte stream that never blocks.
pub trait Transport {
    /// Reads whatever is available into `buf`.
    ///
    /// Returns `Ok(0)` once the peer has closed the stream, and an error of kind
    /// [`ErrorKind::WouldBlock`] when nothing is available yet.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Queues all of `data` for sending, in order.
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Sends as much queued data as possible without blocking.
    fn flush(&mut self) -> std::io::Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Result of [`read_available`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadStatus {
    Open,
    ClosedByPeer,
}

/// Reads from `transport` until it would block and appends to `buffer`.
///
/// Fails with a framing error if `buffer` would grow past [`MAXIMUM_RECEIVE_BUFFER_SIZE`].
pub(crate) fn read_available<T: Transport>(
    transport: &mut T,
    buffer: &mut Vec<u8>,
) -> Result<ReadStatus, SessionError> {
    let mut chunk = [0_u8; READ_CHUNK_SIZE];

    loop {
        match transport.read(&mut chunk) {
            Ok(0) => return Ok(ReadStatus::ClosedByPeer),
            Ok(n) => {
                if buffer.len() + n > MAXIMUM_RECEIVE_BUFFER_SIZE {
                    return Err(SessionError::framing(format!(
                        "receive buffer exceeded {} bytes",
                        MAXIMUM_RECEIVE_BUFFER_SIZE
                    )));
                }
                buffer.extend_from_slice(&chunk[..n]);
                trace!(bytes = n, buffered = buffer.len(), "read from transport");
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadStatus::Open),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// TCP stream in non-blocking mode.
///
/// Writes that the socket does not accept right away are kept and sent on
/// [`Transport::flush`].
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    pending: Vec<u8>,
    open: bool,
}

impl TcpTransport {
    /// Connects, then switches the stream to non-blocking mode.
    ///
    /// # Errors
    ///
    /// Has the same errors as [`TcpStream::connect`] and [`TcpStream::set_nonblocking`].
    pub fn connect(host: &str, port: u16) -> std::io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;

        debug!(host, port, "connected");

        Ok(Self::from_stream(stream))
    }

    /// Takes an already connected stream. It must be in non-blocking mode.
    pub const fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            open: true,
        }
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.open {
            return Ok(0);
        }
        self.stream.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        if !self.open {
            return Err(std::io::Error::new(
                ErrorKind::NotConnected,
                "transport is closed",
            ));
        }

        self.pending.extend_from_slice(data);
        self.flush()
    }

    fn flush(&mut self) -> std::io::Result<()> {
        while !self.pending.is_empty() {
            match self.stream.write(&self.pending) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "peer stopped accepting data",
                    ))
                }
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            // Best effort, the peer may already be gone.
            let _ = self.flush();
            let _ = self.stream.shutdown(Shutdown::Both);
            self.pending.clear();
            self.open = false;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed_by_session: bool,
    closed_by_peer: bool,
}

/// In-memory transport for tests and for hosts that bring their own I/O.
///
/// Clones share the same streams: the session owns one clone and the other side
/// pushes inbound bytes and takes outbound bytes through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `data` available to the session's next read.
    pub fn push_inbound(&self, data: &[u8]) {
        self.inner.borrow_mut().inbound.extend(data.iter().copied());
    }

    /// Everything the session has written since the last call.
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().outbound)
    }

    /// Reads return end of stream once the inbound bytes are used up.
    pub fn close_from_peer(&self) {
        self.inner.borrow_mut().closed_by_peer = true;
    }

    /// Whether the session has closed its end.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed_by_session
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.inner.borrow_mut();

        if inner.closed_by_session {
            return Ok(0);
        }

        if inner.inbound.is_empty() {
            if inner.closed_by_peer {
                return Ok(0);
            }
            return Err(ErrorKind::WouldBlock.into());
        }

        let n = buf.len().min(inner.inbound.len());
        for (dst, src) in buf.iter_mut().zip(inner.inbound.drain(..n)) {
            *dst = src;
        }

        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut inner = self.inner.borrow_mut();

        if inner.closed_by_session || inner.closed_by_peer {
            return Err(std::io::Error::new(
                ErrorKind::NotConnected,
                "transport is closed",
            ));
        }

        inner.outbound.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.inner.borrow_mut().closed_by_session = true;
    }

    fn is_open(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.closed_by_session && !inner.closed_by_peer
    }
}

#[cfg(test)]
mod test {
    use crate::error::ErrorKind;
    use crate::transport::{
        read_available, MemoryTransport, ReadStatus, Transport, MAXIMUM_RECEIVE_BUFFER_SIZE,
    };
    use std::net::TcpListener;

    #[test]
    fn memory_transport_moves_bytes_both_ways() {
        let peer = MemoryTransport::new();
        let mut session = peer.clone();

        let mut buffer = Vec::new();
        assert_eq!(
            read_available(&mut session, &mut buffer).unwrap(),
            ReadStatus::Open
        );
        assert!(buffer.is_empty());

        peer.push_inbound(&[1, 2, 3]);
        read_available(&mut session, &mut buffer).unwrap();
        assert_eq!(buffer, vec![1, 2, 3]);

        session.write_all(&[4, 5]).unwrap();
        assert_eq!(peer.take_outbound(), vec![4, 5]);
        assert!(peer.take_outbound().is_empty());

        peer.close_from_peer();
        assert_eq!(
            read_available(&mut session, &mut buffer).unwrap(),
            ReadStatus::ClosedByPeer
        );
        assert!(!session.is_open());

        session.close();
        assert!(peer.is_closed());
    }

    #[test]
    fn receive_buffer_is_capped() {
        let peer = MemoryTransport::new();
        let mut session = peer.clone();
        let mut buffer = vec![0_u8; MAXIMUM_RECEIVE_BUFFER_SIZE - 1];

        peer.push_inbound(&[1, 2]);
        let e = read_available(&mut session, &mut buffer).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Framing);
    }

    #[test]
    fn tcp_transport_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = super::TcpTransport::connect("127.0.0.1", port).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0_u8; 4];
        std::io::Read::read_exact(&mut server, &mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        std::io::Write::write_all(&mut server, b"pong").unwrap();
        drop(server);

        let mut buffer = Vec::new();
        let mut status = ReadStatus::Open;
        for _ in 0..1000 {
            status = read_available(&mut client, &mut buffer).unwrap();
            if status == ReadStatus::ClosedByPeer {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(status, ReadStatus::ClosedByPeer);
        assert_eq!(buffer, b"pong".to_vec());

        client.close();
        assert!(!client.is_open());
    }
}

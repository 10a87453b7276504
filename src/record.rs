// Post-handshake encrypted record framing. Every message travels as two
// AEAD blocks: an encrypted 2-byte length, then the encrypted payload.

use std::io::{Read, Write};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::crypto::cipher::{CipherState, TAG_SIZE};
use crate::error::{PeerLinkError, Result};

/// Largest plaintext one record can carry (the length field is 16 bits).
pub const MAX_RECORD_SIZE: usize = u16::MAX as usize;

/// Wire size of the encrypted length block: 2 ciphertext bytes + tag.
pub const LENGTH_BLOCK_SIZE: usize = 2 + TAG_SIZE;

/// Frames plaintext into encrypted records over a byte-stream transport.
///
/// Owns the two directional cipher states produced by a completed handshake.
/// The send and receive paths are independent; [`split`](Self::split) hands
/// them to two threads. Within one direction the caller must serialize
/// operations, and any error permanently invalidates the layer.
#[derive(Debug)]
pub struct RecordLayer {
    writer: RecordWriter,
    reader: RecordReader,
}

impl RecordLayer {
    /// Build a record layer from the handshake's directional cipher states.
    pub fn new(send: CipherState, recv: CipherState) -> Self {
        Self {
            writer: RecordWriter {
                send,
                pending: BytesMut::new(),
            },
            reader: RecordReader { recv },
        }
    }

    /// See [`RecordWriter::write_message`].
    pub fn write_message(&mut self, plaintext: &[u8]) -> Result<()> {
        self.writer.write_message(plaintext)
    }

    /// See [`RecordWriter::flush`].
    pub fn flush<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<usize> {
        self.writer.flush(sink)
    }

    /// See [`RecordReader::read_message`].
    pub fn read_message<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<Vec<u8>> {
        self.reader.read_message(source)
    }

    /// Separate the independently drivable halves.
    pub fn split(self) -> (RecordWriter, RecordReader) {
        (self.writer, self.reader)
    }
}

/// Send half: the send cipher plus the buffered-ciphertext staging area.
#[derive(Debug)]
pub struct RecordWriter {
    send: CipherState,
    pending: BytesMut,
}

impl RecordWriter {
    /// Encrypt `plaintext` into the pending buffer as a length block
    /// followed by a payload block. Two sequential encryptions, each
    /// independently subject to key rotation. Call [`flush`](Self::flush)
    /// to hand the ciphertext to the transport.
    pub fn write_message(&mut self, plaintext: &[u8]) -> Result<()> {
        if plaintext.len() > MAX_RECORD_SIZE {
            return Err(PeerLinkError::MessageTooLarge {
                size: plaintext.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let length = (plaintext.len() as u16).to_be_bytes();
        let length_block = self.send.encrypt(&[], &length)?;
        let payload_block = self.send.encrypt(&[], plaintext)?;

        self.pending.extend_from_slice(&length_block);
        self.pending.extend_from_slice(&payload_block);
        trace!(len = plaintext.len(), "record buffered");
        Ok(())
    }

    /// Drain buffered ciphertext into the transport, tolerating partial
    /// writes. No-op when nothing is buffered. Returns the number of bytes
    /// written; I/O errors surface unchanged.
    pub fn flush<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<usize> {
        let mut written = 0;
        while self.pending.has_remaining() {
            let n = sink.write(self.pending.chunk())?;
            if n == 0 {
                return Err(PeerLinkError::Transport(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "transport refused to accept buffered ciphertext",
                )));
            }
            self.pending.advance(n);
            written += n;
        }
        Ok(written)
    }
}

/// Receive half: the receive cipher.
#[derive(Debug)]
pub struct RecordReader {
    recv: CipherState,
}

impl RecordReader {
    /// Read and decrypt one record from the transport: exactly 18 bytes for
    /// the length block, then exactly `len + 16` bytes for the payload
    /// block. The source must block until the exact byte counts are
    /// available; short or closed reads surface as transport errors.
    pub fn read_message<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<Vec<u8>> {
        let mut length_block = [0u8; LENGTH_BLOCK_SIZE];
        source.read_exact(&mut length_block)?;

        let length_bytes = self.recv.decrypt(&[], &length_block)?;
        let mut length = [0u8; 2];
        length.copy_from_slice(&length_bytes);
        let length = u16::from_be_bytes(length) as usize;

        let mut payload_block = vec![0u8; length + TAG_SIZE];
        source.read_exact(&mut payload_block)?;

        let plaintext = self.recv.decrypt(&[], &payload_block)?;
        trace!(len = plaintext.len(), "record read");
        Ok(plaintext)
    }
}

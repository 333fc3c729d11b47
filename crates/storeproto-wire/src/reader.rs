use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{Result, WireError};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Partial reads are buffered internally; callers always get whole frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(WireError::ConnectionClosed)` when EOF is reached,
    /// including EOF in the middle of a frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                tracing::trace!(
                    key = %frame.key,
                    request_id = frame.request_id,
                    len = frame.payload.len(),
                    "frame received"
                );
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                return Err(WireError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, MAGIC};
    use crate::key::MessageKey;

    fn wire(frames: &[(MessageKey, u64, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (key, request_id, payload) in frames {
            encode_frame(*key, *request_id, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let bytes = wire(&[(MessageKey::new(0, 2), 5, &b"hello"[..])]);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.key, MessageKey::new(0, 2));
        assert_eq!(frame.request_id, 5);
        assert_eq!(frame.payload.as_ref(), b"hello");
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn read_multiple_frames_in_order() {
        let bytes = wire(&[
            (MessageKey::new(1, 1), 1, &b"one"[..]),
            (MessageKey::NULL, 0, &b""[..]),
            (MessageKey::new(2, 5), 3, &b"three"[..]),
        ]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().key, MessageKey::new(1, 1));
        assert!(reader.read_frame().unwrap().is_keepalive());
        let third = reader.read_frame().unwrap();
        assert_eq!((third.key, third.request_id), (MessageKey::new(2, 5), 3));
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[(MessageKey::new(2, 9), 77, &b"slow"[..])]);
        let mut reader = FrameReader::new(ByteByByteReader { bytes, pos: 0 });

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.request_id, 77);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn large_payload_spans_many_reads() {
        let payload = vec![0xAB; 64 * 1024];
        let bytes = wire(&[(MessageKey::new(2, 12), 0, payload.as_slice())]);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().payload.len(), payload.len());
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32_le(16);
        partial.put_u8(2);
        partial.put_u16_le(7);
        partial.put_u64_le(0);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let bytes = wire(&[(MessageKey::new(2, 10), 0, &[0u8; 64][..])]);
        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), cfg);
        assert!(matches!(
            reader.read_frame(),
            Err(WireError::PayloadTooLarge { size: 64, max: 16 })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[(MessageKey::new(0, 4), 8, &b"ok"[..])]);
        let mut reader = FrameReader::new(FailOnceThenData {
            kind: ErrorKind::Interrupted,
            failed: false,
            inner: Cursor::new(bytes),
        });
        assert_eq!(reader.read_frame().unwrap().request_id, 8);
    }

    #[test]
    fn would_block_propagates_io_error() {
        let bytes = wire(&[(MessageKey::new(0, 4), 8, &b"ok"[..])]);
        let mut reader = FrameReader::new(FailOnceThenData {
            kind: ErrorKind::WouldBlock,
            failed: false,
            inner: Cursor::new(bytes),
        });
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, WireError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let sender = std::thread::spawn(move || {
            for id in 1..=32u64 {
                let payload = format!("msg-{id}");
                writer
                    .send(MessageKey::new(2, (id % 22) as u16 + 1), id, payload.as_bytes())
                    .unwrap();
            }
        });

        for id in 1..=32u64 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.request_id, id);
            assert_eq!(frame.payload.as_ref(), format!("msg-{id}").as_bytes());
        }
        sender.join().unwrap();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct FailOnceThenData {
        kind: ErrorKind,
        failed: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for FailOnceThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            self.inner.read(buf)
        }
    }
}

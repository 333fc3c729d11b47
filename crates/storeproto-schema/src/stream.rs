//! Chunked stream fields for upload and download payloads.
//!
//! The sending side owns a reader that is drained chunk by chunk during
//! encoding; the receiving side collects chunks into a sink. A field whose
//! terminator arrives before its declared size stays incomplete and can be
//! detected with [`StreamField::is_complete`].

use std::fmt;
use std::io::{ErrorKind, Read};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use storeproto_wire::{
    check_bound, StreamReader, WireError, WireReader, WireType, WireWriter, UNDECLARED_STREAM_SIZE,
};

use crate::context::Context;
use crate::error::Result;
use crate::schema::FieldMeta;
use crate::value::WireValue;

/// One progress report, delivered once per chunk and once at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProgress {
    /// Bytes in this chunk. Zero for the final report.
    pub len: usize,
    pub is_final: bool,
    pub index: u64,
}

pub type ProgressFn = Arc<dyn Fn(StreamProgress) + Send + Sync>;

type Source = Box<dyn Read + Send>;

#[derive(Default)]
pub struct StreamField {
    source: Mutex<Option<Source>>,
    declared: Option<u64>,
    sink: Vec<u8>,
    received: u64,
    chunks: u64,
    complete: bool,
    progress: Option<ProgressFn>,
}

impl StreamField {
    /// Sending side: stream everything `reader` yields.
    ///
    /// `declared` is announced to the receiver up front; `None` sends the
    /// stream as undeclared.
    pub fn from_reader<R: Read + Send + 'static>(reader: R, declared: Option<u64>) -> Self {
        Self {
            source: Mutex::new(Some(Box::new(reader))),
            declared,
            ..Self::default()
        }
    }

    /// Sending side over an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        let declared = Some(bytes.len() as u64);
        Self::from_reader(std::io::Cursor::new(bytes), declared)
    }

    /// Receiving side: collect incoming chunks.
    pub fn sink() -> Self {
        Self::default()
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(StreamProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn set_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }

    pub fn declared(&self) -> Option<u64> {
        self.declared
    }

    /// Bytes received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// True once the terminator arrived and, for declared streams, the full
    /// declared size was received.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn data(&self) -> &[u8] {
        &self.sink
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.sink)
    }

    fn report(&self, len: usize, is_final: bool, index: u64) {
        if let Some(progress) = &self.progress {
            progress(StreamProgress {
                len,
                is_final,
                index,
            });
        }
    }

    fn take_source(&self) -> Option<Source> {
        self.source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

fn read_chunk(source: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

impl WireValue for StreamField {
    const WIRE_TYPE: WireType = WireType::Stream;
    const BYTE_BOUND: bool = true;

    fn encode_body(&self, out: &mut WireWriter, meta: &FieldMeta, _ctx: &Context) -> Result<()> {
        if let (Some(declared), Some(max)) = (self.declared, meta.max_size) {
            check_bound(meta.tag, declared, Some(max))?;
        }
        out.begin_stream(self.declared.unwrap_or(UNDECLARED_STREAM_SIZE));

        let mut sent = 0u64;
        let mut index = 0u64;
        if let Some(mut source) = self.take_source() {
            let mut buf = vec![0u8; meta.chunk_size.max(1)];
            loop {
                let n = read_chunk(source.as_mut(), &mut buf).map_err(WireError::Io)?;
                if n == 0 {
                    break;
                }
                sent += n as u64;
                check_bound(meta.tag, sent, meta.max_size)?;
                out.put_chunk(&buf[..n]);
                self.report(n, false, index);
                index += 1;
            }
        }
        out.end_stream();
        self.report(0, true, index);

        match self.declared {
            Some(declared) if declared != sent => Err(WireError::InvalidValue {
                tag: meta.tag,
                reason: format!("stream declared {declared} bytes but source yielded {sent}"),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn decode_body(
        &mut self,
        input: &mut WireReader<'_>,
        meta: &FieldMeta,
        _ctx: &Context,
    ) -> Result<()> {
        let mut stream = StreamReader::new(input.clone())?;
        self.declared = stream.declared();
        self.sink.clear();
        self.received = 0;
        self.chunks = 0;
        self.complete = false;

        if let Some(declared) = self.declared {
            check_bound(meta.tag, declared, meta.max_size)?;
            self.sink.reserve(declared.min(meta.chunk_size as u64) as usize);
        }

        while let Some(chunk) = stream.next_chunk()? {
            check_bound(meta.tag, chunk.len() as u64, Some(meta.chunk_size as u64))?;
            self.received += chunk.len() as u64;
            check_bound(meta.tag, self.received, meta.max_size)?;
            self.sink.extend_from_slice(chunk);
            self.report(chunk.len(), false, self.chunks);
            self.chunks += 1;
        }
        input.get_bytes(stream.consumed() as u64)?;
        self.report(0, true, self.chunks);

        match self.declared {
            Some(declared) if self.received < declared => Err(WireError::StreamIncomplete {
                tag: meta.tag,
                received: self.received,
                declared,
            }
            .into()),
            Some(declared) if self.received > declared => Err(WireError::InvalidValue {
                tag: meta.tag,
                reason: format!("stream declared {declared} bytes but carried {}", self.received),
            }
            .into()),
            _ => {
                self.complete = true;
                Ok(())
            }
        }
    }
}

impl PartialEq for StreamField {
    fn eq(&self, other: &Self) -> bool {
        self.declared == other.declared
            && self.sink == other.sink
            && self.complete == other.complete
    }
}

impl fmt::Debug for StreamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamField")
            .field("declared", &self.declared)
            .field("received", &self.received)
            .field("chunks", &self.chunks)
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::value::{decode_untagged, encode_untagged};

    fn meta(chunk_size: usize, max_size: Option<u64>) -> FieldMeta {
        FieldMeta {
            chunk_size,
            max_size,
            ..FieldMeta::new(3, "stream")
        }
    }

    fn encode(field: &StreamField, meta: &FieldMeta) -> Result<Vec<u8>> {
        let mut out = WireWriter::new();
        encode_untagged(field, &mut out, meta, &Context::new())?;
        Ok(out.as_slice().to_vec())
    }

    #[test]
    fn chunks_respect_ceiling_and_report_progress() {
        let reports = Arc::new(StdMutex::new(Vec::new()));
        let seen = Arc::clone(&reports);
        let field = StreamField::from_bytes(vec![7u8; 10])
            .with_progress(move |p| seen.lock().unwrap().push(p));
        let meta = meta(4, None);
        let bytes = encode(&field, &meta).unwrap();

        let lens: Vec<_> = reports.lock().unwrap().iter().map(|p| p.len).collect();
        assert_eq!(lens, vec![4, 4, 2, 0]);
        assert!(reports.lock().unwrap().last().unwrap().is_final);

        let mut sink = StreamField::sink();
        decode_untagged(&mut sink, &mut WireReader::new(&bytes), &meta, &Context::new())
            .unwrap();
        assert!(sink.is_complete());
        assert_eq!(sink.chunks(), 3);
        assert_eq!(sink.data(), &[7u8; 10]);
    }

    #[test]
    fn source_is_drained_once() {
        let field = StreamField::from_bytes(&b"abc"[..]);
        let meta = meta(64, None);
        encode(&field, &meta).unwrap();
        // second encode finds no source and mismatches the declared size
        assert!(encode(&field, &meta).is_err());
    }

    #[test]
    fn total_bound_enforced() {
        let meta = meta(4, Some(8));
        let field = StreamField::from_reader(std::io::Cursor::new(vec![0u8; 12]), None);
        assert!(encode(&field, &meta).unwrap_err().is_bound_exceeded());

        let declared = StreamField::from_bytes(vec![0u8; 12]);
        assert!(encode(&declared, &meta).unwrap_err().is_bound_exceeded());
    }

    #[test]
    fn oversized_chunk_rejected_on_decode() {
        let mut out = WireWriter::new();
        out.begin_stream(UNDECLARED_STREAM_SIZE);
        out.put_chunk(&[1u8; 16]);
        out.end_stream();

        let mut sink = StreamField::sink();
        let err = sink
            .decode_body(&mut WireReader::new(out.as_slice()), &meta(8, None), &Context::new())
            .unwrap_err();
        assert!(err.is_bound_exceeded());
    }

    #[test]
    fn short_stream_is_incomplete() {
        let mut out = WireWriter::new();
        out.begin_stream(10);
        out.put_chunk(b"abcd");
        out.end_stream();

        let mut sink = StreamField::sink();
        let err = sink
            .decode_body(&mut WireReader::new(out.as_slice()), &meta(64, None), &Context::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::SchemaError::Wire(WireError::StreamIncomplete {
                received: 4,
                declared: 10,
                ..
            })
        ));
        assert!(!sink.is_complete());
        assert_eq!(sink.received(), 4);
        assert_eq!(sink.data(), b"abcd");
    }

    #[test]
    fn undeclared_stream_completes_on_terminator() {
        let field = StreamField::from_reader(std::io::Cursor::new(b"xyz".to_vec()), None);
        let meta = meta(2, None);
        let bytes = encode(&field, &meta).unwrap();

        let mut sink = StreamField::sink();
        decode_untagged(&mut sink, &mut WireReader::new(&bytes), &meta, &Context::new())
            .unwrap();
        assert_eq!(sink.declared(), None);
        assert!(sink.is_complete());
        assert_eq!(sink.into_bytes().as_ref(), b"xyz");
    }
}

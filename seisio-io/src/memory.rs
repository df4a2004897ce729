use std::ops::Range;

use bytes::{Bytes, BytesMut};
use seisio_error::{SeisResult, seis_bail};
use seisio_meta::segy::TRACE_HEADER_SIZE;

use crate::{HeaderSink, HeaderSource};

/// Trace headers held in memory, back to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryHeaders {
    headers: Vec<u8>,
}

impl MemoryHeaders {
    /// Zeroed headers for `num_traces` traces.
    pub fn new(num_traces: usize) -> Self {
        Self {
            headers: vec![0; num_traces * TRACE_HEADER_SIZE],
        }
    }

    /// Wraps headers laid out back to back.
    pub fn try_from_bytes(headers: Vec<u8>) -> SeisResult<Self> {
        if headers.len() % TRACE_HEADER_SIZE != 0 {
            seis_bail!(
                "{} bytes are not a whole number of {TRACE_HEADER_SIZE} byte headers",
                headers.len()
            );
        }
        Ok(Self { headers })
    }

    /// The header of trace `i`.
    pub fn header(&self, i: usize) -> SeisResult<&[u8]> {
        self.check(i, 1, &(0..TRACE_HEADER_SIZE))?;
        Ok(&self.headers[i * TRACE_HEADER_SIZE..(i + 1) * TRACE_HEADER_SIZE])
    }

    /// The mutable header of trace `i`.
    pub fn header_mut(&mut self, i: usize) -> SeisResult<&mut [u8]> {
        self.check(i, 1, &(0..TRACE_HEADER_SIZE))?;
        Ok(&mut self.headers[i * TRACE_HEADER_SIZE..(i + 1) * TRACE_HEADER_SIZE])
    }

    /// All headers, back to back.
    pub fn as_bytes(&self) -> &[u8] {
        &self.headers
    }

    fn check(&self, offset: usize, count: usize, range: &Range<usize>) -> SeisResult<()> {
        if range.start > range.end || range.end > TRACE_HEADER_SIZE {
            seis_bail!(
                "byte range {}..{} is not within the {TRACE_HEADER_SIZE} byte header",
                range.start,
                range.end
            );
        }
        if offset + count > self.num_traces() {
            seis_bail!(OutOfBounds: offset + count, 0, self.num_traces());
        }
        Ok(())
    }
}

impl HeaderSource for MemoryHeaders {
    fn num_traces(&self) -> usize {
        self.headers.len() / TRACE_HEADER_SIZE
    }

    fn read_header_bytes(
        &self,
        offset: usize,
        count: usize,
        range: Range<usize>,
    ) -> SeisResult<Bytes> {
        self.check(offset, count, &range)?;
        let mut out = BytesMut::with_capacity(count * range.len());
        for i in offset..offset + count {
            let base = i * TRACE_HEADER_SIZE;
            out.extend_from_slice(&self.headers[base + range.start..base + range.end]);
        }
        Ok(out.freeze())
    }
}

impl HeaderSink for MemoryHeaders {
    fn write_header_bytes(
        &mut self,
        offset: usize,
        count: usize,
        range: Range<usize>,
        bytes: &[u8],
    ) -> SeisResult<()> {
        self.check(offset, count, &range)?;
        if bytes.len() != count * range.len() {
            seis_bail!(
                "{} bytes cannot fill {count} header slices of {} bytes",
                bytes.len(),
                range.len()
            );
        }
        if range.is_empty() {
            return Ok(());
        }
        for (i, chunk) in (offset..offset + count).zip(bytes.chunks_exact(range.len())) {
            let base = i * TRACE_HEADER_SIZE;
            self.headers[base + range.start..base + range.end].copy_from_slice(chunk);
        }
        Ok(())
    }
}

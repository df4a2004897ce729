//! Access to raw trace headers and their conversion into metadata batches.
//!
//! The byte-level storage of a dataset lives behind [`HeaderSource`] and [`HeaderSink`];
//! [`read_param`] and [`write_param`] move a shard of records between such a store and a
//! [`seisio_meta::Param`].

pub use memory::*;
pub use param::*;

mod memory;
mod param;

use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use seisio_error::SeisResult;

/// A store of trace headers that can be read by record.
pub trait HeaderSource {
    /// The number of traces in the store.
    fn num_traces(&self) -> usize;

    /// Reads bytes `range` of the headers of traces `offset..offset + count`, back to back.
    ///
    /// Fails with [`seisio_error::SeisError::OutOfBounds`] if the traces are not all present.
    fn read_header_bytes(
        &self,
        offset: usize,
        count: usize,
        range: Range<usize>,
    ) -> SeisResult<Bytes>;
}

/// A store of trace headers that can be written by record.
pub trait HeaderSink {
    /// Overwrites bytes `range` of the headers of traces `offset..offset + count` with `bytes`,
    /// which holds one `range` slice per trace, back to back.
    fn write_header_bytes(
        &mut self,
        offset: usize,
        count: usize,
        range: Range<usize>,
        bytes: &[u8],
    ) -> SeisResult<()>;
}

impl<T: HeaderSource + ?Sized> HeaderSource for Arc<T> {
    fn num_traces(&self) -> usize {
        T::num_traces(self)
    }

    fn read_header_bytes(
        &self,
        offset: usize,
        count: usize,
        range: Range<usize>,
    ) -> SeisResult<Bytes> {
        T::read_header_bytes(self, offset, count, range)
    }
}

impl<T: HeaderSource + ?Sized> HeaderSource for &T {
    fn num_traces(&self) -> usize {
        T::num_traces(self)
    }

    fn read_header_bytes(
        &self,
        offset: usize,
        count: usize,
        range: Range<usize>,
    ) -> SeisResult<Bytes> {
        T::read_header_bytes(self, offset, count, range)
    }
}

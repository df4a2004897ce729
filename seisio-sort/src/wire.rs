//! The byte layout of records moving between ranks.
//!
//! A message is a record count followed by each column of the batch in storage order (longs,
//! shorts, floats, indices, raw headers) and finally the global ordinal of every record. All
//! integers are big-endian; floats travel as their bit patterns so every value survives exactly.

use std::ops::Range;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use seisio_error::{SeisResult, seis_bail};
use seisio_meta::{EntryKind, Param, Rule};
use seisio_meta::segy::TRACE_HEADER_SIZE;

use crate::TraceCompare;
use crate::local::try_sort_by;

/// Records of one rank, each tagged with its global ordinal.
#[derive(Debug, Clone)]
pub(crate) struct Shard {
    pub param: Param,
    pub ordinals: Vec<u64>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.param.len()
    }

    pub fn rows(&self, range: Range<usize>) -> SeisResult<Self> {
        let param = self.param.slice(range.clone())?;
        Ok(Self {
            param,
            ordinals: self.ordinals[range].to_vec(),
        })
    }

    pub fn concat(rule: &Arc<Rule>, parts: &[Shard]) -> SeisResult<Self> {
        let params = parts.iter().map(|s| s.param.clone()).collect::<Vec<_>>();
        Ok(Self {
            param: Param::concat(rule.clone(), &params)?,
            ordinals: parts.iter().flat_map(|s| s.ordinals.iter().copied()).collect(),
        })
    }

    /// Sorts under `cmp`, breaking ties on the ordinals.
    pub fn sorted(&self, cmp: &dyn TraceCompare) -> SeisResult<Self> {
        let mut perm = (0..self.len()).collect::<Vec<_>>();
        try_sort_by(&mut perm, |&a, &b| {
            Ok(cmp
                .compare(&self.param, a, &self.param, b)?
                .then_with(|| self.ordinals[a].cmp(&self.ordinals[b])))
        })?;
        Ok(Self {
            param: self.param.take(&perm)?,
            ordinals: perm.iter().map(|&i| self.ordinals[i]).collect(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let param = &self.param;
        let mut buf = BytesMut::with_capacity(8 + param.nbytes() + 8 * self.ordinals.len());
        buf.put_u64(self.len() as u64);
        param.longs().iter().for_each(|&v| buf.put_i64(v));
        param.shorts().iter().for_each(|&v| buf.put_i16(v));
        param.floats().iter().for_each(|&v| buf.put_u64(v.to_bits()));
        param.indices().iter().for_each(|&v| buf.put_u64(v));
        buf.put_slice(param.headers());
        self.ordinals.iter().for_each(|&v| buf.put_u64(v));
        buf.freeze()
    }

    pub fn decode(rule: &Arc<Rule>, mut bytes: Bytes) -> SeisResult<Self> {
        if bytes.remaining() < 8 {
            seis_bail!(Collective: "record message of {} bytes has no count", bytes.remaining());
        }
        let Ok(len) = usize::try_from(bytes.get_u64()) else {
            seis_bail!(Collective: "record count does not fit in memory");
        };
        let widths = [
            (rule.width(EntryKind::Long), 8),
            (rule.width(EntryKind::Short), 2),
            (rule.width(EntryKind::Float), 8),
            (rule.width(EntryKind::Index), 8),
            (if rule.has_copy() { TRACE_HEADER_SIZE } else { 0 }, 1),
            (1, 8),
        ];
        let record = widths.iter().map(|(w, size)| w * size).sum::<usize>();
        if len.checked_mul(record) != Some(bytes.remaining()) {
            seis_bail!(
                Collective: "message for {len} records of {record} bytes holds {} bytes",
                bytes.remaining()
            );
        }

        let [long, short, float, index, header, _] = widths.map(|(w, _)| len * w);
        let longs = (0..long).map(|_| bytes.get_i64()).collect();
        let shorts = (0..short).map(|_| bytes.get_i16()).collect();
        let floats = (0..float).map(|_| f64::from_bits(bytes.get_u64())).collect();
        let indices = (0..index).map(|_| bytes.get_u64()).collect();
        let headers = bytes.split_to(header).to_vec();
        let ordinals = (0..len).map(|_| bytes.get_u64()).collect();
        Ok(Self {
            param: Param::try_from_columns(
                rule.clone(),
                len,
                longs,
                shorts,
                floats,
                indices,
                headers,
            )?,
            ordinals,
        })
    }
}

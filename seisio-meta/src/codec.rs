//! Conversion between raw trace headers and [`Param`] columns.
//!
//! Headers are exchanged as runs of `extent` slices: for every record only the bytes
//! `extent.start..extent.end` of its 240-byte header are present, back to back.

use std::ops::Range;

use bytes::{Buf, BufMut};
use itertools::Itertools;
use log::trace;
use seisio_error::{SeisResult, seis_bail};

use crate::scale::{choose_scale, decode_scaled, encode_scaled};
use crate::segy::TRACE_HEADER_SIZE;
use crate::{Column, Param, RuleEntry};

/// Where each column of a batch lives within one extent slice.
struct Layout {
    longs: Vec<(Column<i64>, usize)>,
    shorts: Vec<(Column<i16>, usize)>,
    floats: Vec<ScaleGroup>,
    copy: bool,
}

/// The float columns sharing one scale field.
struct ScaleGroup {
    scale: usize,
    fields: Vec<(Column<f64>, usize)>,
}

impl Layout {
    fn new(param: &Param, extent: &Range<usize>) -> SeisResult<Self> {
        if extent.start > extent.end || extent.end > TRACE_HEADER_SIZE {
            seis_bail!(
                "extent {}..{} is not within the {TRACE_HEADER_SIZE} byte header",
                extent.start,
                extent.end
            );
        }
        let mut layout = Self {
            longs: vec![],
            shorts: vec![],
            floats: vec![],
            copy: false,
        };
        let mut floats = vec![];
        for (key, entry) in param.rule().iter() {
            if let Some(range) = entry.byte_range() {
                if range.start < extent.start || range.end > extent.end {
                    seis_bail!(
                        "{key} at {}..{} lies outside extent {}..{}",
                        range.start,
                        range.end,
                        extent.start,
                        extent.end
                    );
                }
            }
            let rel = |loc: usize| loc - extent.start;
            match entry {
                RuleEntry::Long { loc, .. } => layout.longs.push((param.resolve(key)?, rel(loc))),
                RuleEntry::Short { loc, .. } => {
                    layout.shorts.push((param.resolve(key)?, rel(loc)))
                }
                RuleEntry::Float { loc, scale_loc, .. } => {
                    floats.push((rel(scale_loc), (param.resolve(key)?, rel(loc))))
                }
                RuleEntry::Index { .. } => {}
                RuleEntry::Copy => layout.copy = true,
            }
        }
        layout.floats = floats
            .into_iter()
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(scale, _)| *scale)
            .map(|(scale, fields)| ScaleGroup { scale, fields })
            .collect();
        Ok(layout)
    }
}

/// Decodes back to back extent slices into records `first..` of `param`.
///
/// Returns the number of records decoded. A rule touching no header bytes decodes nothing.
pub fn decode_headers(
    bytes: &[u8],
    extent: Range<usize>,
    param: &mut Param,
    first: usize,
) -> SeisResult<usize> {
    let layout = Layout::new(param, &extent)?;
    let stride = extent.len();
    if stride == 0 {
        return Ok(0);
    }
    if bytes.len() % stride != 0 {
        seis_bail!(
            "{} header bytes are not a whole number of {stride} byte records",
            bytes.len()
        );
    }
    let count = bytes.len() / stride;
    if first + count > param.len() {
        seis_bail!(OutOfBounds: first + count, 0, param.len());
    }

    for (r, record) in bytes.chunks_exact(stride).enumerate() {
        let i = first + r;
        if layout.copy {
            param.header_mut(i)?.copy_from_slice(record);
        }
        for &(column, off) in &layout.longs {
            param.put(i, column, i64::from((&record[off..off + 4]).get_i32()))?;
        }
        for &(column, off) in &layout.shorts {
            param.put(i, column, (&record[off..off + 2]).get_i16())?;
        }
        for group in &layout.floats {
            let scale = (&record[group.scale..group.scale + 2]).get_i16();
            for &(column, off) in &group.fields {
                let mantissa = (&record[off..off + 4]).get_i32();
                param.put(i, column, decode_scaled(mantissa, scale))?;
            }
        }
    }
    trace!("decoded {count} headers over {}..{}", extent.start, extent.end);
    Ok(count)
}

/// Encodes records `range` of `param` into back to back extent slices held in `out`.
///
/// Bytes of `out` that no entry covers are left as they are, so callers holding the previous
/// header contents get a read-modify-write. With a copy entry the raw header is written first
/// and the typed fields are laid over it.
pub fn encode_headers(
    param: &Param,
    range: Range<usize>,
    extent: Range<usize>,
    out: &mut [u8],
) -> SeisResult<()> {
    let layout = Layout::new(param, &extent)?;
    let stride = extent.len();
    if range.end > param.len() || range.start > range.end {
        seis_bail!(OutOfBounds: range.end, 0, param.len());
    }
    if out.len() != range.len() * stride {
        seis_bail!(
            "{} output bytes cannot hold {} records of {stride} bytes",
            out.len(),
            range.len()
        );
    }
    if stride == 0 {
        return Ok(());
    }

    for (i, record) in range.clone().zip(out.chunks_exact_mut(stride)) {
        if layout.copy {
            record.copy_from_slice(&param.header(i)?[extent.clone()]);
        }
        for &(column, off) in &layout.longs {
            let value = param.at(i, column)?;
            let Ok(value) = i32::try_from(value) else {
                seis_bail!("{value} does not fit a 4-byte header field");
            };
            (&mut record[off..off + 4]).put_i32(value);
        }
        for &(column, off) in &layout.shorts {
            (&mut record[off..off + 2]).put_i16(param.at(i, column)?);
        }
        for group in &layout.floats {
            let values = group
                .fields
                .iter()
                .map(|&(column, _)| param.at(i, column))
                .collect::<SeisResult<Vec<_>>>()?;
            let scale = choose_scale(values.iter().copied())?;
            (&mut record[group.scale..group.scale + 2]).put_i16(scale);
            for (&(_, off), value) in group.fields.iter().zip(values) {
                (&mut record[off..off + 4]).put_i32(encode_scaled(value, scale)?);
            }
        }
    }
    trace!(
        "encoded {} headers over {}..{}",
        range.len(),
        extent.start,
        extent.end
    );
    Ok(())
}

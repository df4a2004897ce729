use std::sync::Arc;

use log::debug;
use seisio_error::{ResultExt, SeisResult, seis_bail};
use seisio_meta::codec::{decode_headers, encode_headers};
use seisio_meta::{FieldValue, MetaKey, Param, Rule};

use crate::{HeaderSink, HeaderSource};

/// The largest number of headers moved by a single store request.
pub const HEADERS_PER_REQUEST: usize = 1 << 16;

/// Decodes the headers of traces `offset..offset + count` of `source` into a new batch.
///
/// Only the extent of `rule` is read from each header. When the rule holds
/// [`MetaKey::LocalTraceNum`] it is set to the trace number `offset + i` of each record.
pub fn read_param<S: HeaderSource + ?Sized>(
    source: &S,
    rule: Arc<Rule>,
    offset: usize,
    count: usize,
) -> SeisResult<Param> {
    let end = offset.checked_add(count);
    if end.is_none_or(|end| end > source.num_traces()) {
        seis_bail!(OutOfBounds: offset, 0, source.num_traces());
    }
    let extent = rule.extent();
    let mut param = Param::new(rule.clone(), count);
    if !extent.is_empty() {
        for first in (0..count).step_by(HEADERS_PER_REQUEST) {
            let n = HEADERS_PER_REQUEST.min(count - first);
            let bytes = source.read_header_bytes(offset + first, n, extent.clone())?;
            decode_headers(&bytes, extent.clone(), &mut param, first)
                .context(format!("decoding headers of traces from {}", offset + first))?;
        }
    }
    if rule.contains(MetaKey::LocalTraceNum) {
        for i in 0..count {
            param.set_value(i, MetaKey::LocalTraceNum, FieldValue::Index((offset + i) as u64))?;
        }
    }
    debug!(
        "read {count} headers from trace {offset} over bytes {}..{}",
        extent.start, extent.end
    );
    Ok(param)
}

/// Encodes every record of `param` into traces `offset..offset + param.len()` of `store`.
///
/// Header bytes outside the entries of the rule keep their stored contents.
pub fn write_param<S: HeaderSource + HeaderSink + ?Sized>(
    store: &mut S,
    offset: usize,
    param: &Param,
) -> SeisResult<()> {
    let count = param.len();
    let end = offset.checked_add(count);
    if end.is_none_or(|end| end > store.num_traces()) {
        seis_bail!(OutOfBounds: offset, 0, store.num_traces());
    }
    let extent = param.rule().extent();
    if extent.is_empty() {
        return Ok(());
    }
    for first in (0..count).step_by(HEADERS_PER_REQUEST) {
        let n = HEADERS_PER_REQUEST.min(count - first);
        let mut bytes = store
            .read_header_bytes(offset + first, n, extent.clone())?
            .to_vec();
        encode_headers(param, first..first + n, extent.clone(), &mut bytes)
            .context(format!("encoding headers of traces from {}", offset + first))?;
        store.write_header_bytes(offset + first, n, extent.clone(), &bytes)?;
    }
    debug!(
        "wrote {count} headers at trace {offset} over bytes {}..{}",
        extent.start, extent.end
    );
    Ok(())
}

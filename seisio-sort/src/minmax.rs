//! Survey-wide extremes of a coordinate pair.

use std::cmp::Ordering;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use seisio_comm::Communicator;
use seisio_error::{SeisResult, seis_bail};
use seisio_meta::{MetaKey, Param};

use crate::collective::agree;

/// An extreme value and the trace holding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordExtreme {
    /// The value of the key.
    pub value: f64,
    /// The global number of the trace holding `value`.
    pub trace: u64,
}

/// The minimum and maximum of `x_key` followed by those of `y_key` over the records of all
/// ranks.
///
/// Record `i` of `param` is trace `offset + i`. When several traces hold an extreme the smallest
/// trace number wins. Ranks without records contribute nothing; `None` means no rank held any.
pub fn coord_min_max(
    comm: &dyn Communicator,
    param: &Param,
    offset: usize,
    x_key: MetaKey,
    y_key: MetaKey,
) -> SeisResult<Option<[CoordExtreme; 4]>> {
    let (local, _) = agree(
        comm,
        "coordinate extremes",
        local_min_max(param, offset, x_key, y_key),
        |_| 0,
    )?;
    let payload = match local {
        Some(extremes) => {
            let mut buf = BytesMut::with_capacity(64);
            for e in extremes {
                buf.put_f64(e.value);
                buf.put_u64(e.trace);
            }
            buf.freeze()
        }
        None => Bytes::new(),
    };

    let mut global = None;
    for (rank, mut payload) in comm.all_gather(payload)?.into_iter().enumerate() {
        if payload.is_empty() {
            continue;
        }
        if payload.len() != 64 {
            seis_bail!(Collective: "rank {rank} sent {} bytes of extremes", payload.len());
        }
        let extremes = [(); 4].map(|()| CoordExtreme {
            value: payload.get_f64(),
            trace: payload.get_u64(),
        });
        global = Some(merge(global, extremes));
    }
    Ok(global)
}

fn local_min_max(
    param: &Param,
    offset: usize,
    x_key: MetaKey,
    y_key: MetaKey,
) -> SeisResult<Option<[CoordExtreme; 4]>> {
    param.rule().entry(x_key)?;
    param.rule().entry(y_key)?;
    let mut extremes = None;
    for i in 0..param.len() {
        let trace = (offset + i) as u64;
        let x = CoordExtreme {
            value: param.value(i, x_key)?.as_f64(),
            trace,
        };
        let y = CoordExtreme {
            value: param.value(i, y_key)?.as_f64(),
            trace,
        };
        extremes = Some(merge(extremes, [x, x, y, y]));
    }
    Ok(extremes)
}

fn merge(acc: Option<[CoordExtreme; 4]>, next: [CoordExtreme; 4]) -> [CoordExtreme; 4] {
    let Some(acc) = acc else {
        return next;
    };
    let pick = |a: CoordExtreme, b: CoordExtreme, want: Ordering| {
        match b.value.total_cmp(&a.value) {
            Ordering::Equal if b.trace < a.trace => b,
            ord if ord == want => b,
            _ => a,
        }
    };
    [
        pick(acc[0], next[0], Ordering::Less),
        pick(acc[1], next[1], Ordering::Greater),
        pick(acc[2], next[2], Ordering::Less),
        pick(acc[3], next[3], Ordering::Greater),
    ]
}

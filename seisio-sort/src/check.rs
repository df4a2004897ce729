use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use seisio_comm::Communicator;
use seisio_error::SeisResult;
use seisio_io::{HeaderSource, read_param};
use seisio_meta::{Param, Rule};

use crate::collective::agree;
use crate::wire::Shard;
use crate::{TraceCompare, first_inversion};

/// Whether the traces `offset..offset + count` of `source` are in `cmp` order.
///
/// The shard is decoded under `rule` before walking each adjacent pair. An inversion is not an
/// error: the first one found ends the walk with `Ok(false)`.
pub fn check_order<S: HeaderSource + ?Sized>(
    source: &S,
    rule: Arc<Rule>,
    (offset, count): (usize, usize),
    cmp: &dyn TraceCompare,
) -> SeisResult<bool> {
    cmp.validate(&rule)?;
    let param = read_param(source, rule, offset, count)?;
    Ok(match first_inversion(&param, cmp)? {
        Some(i) => {
            debug!(
                "traces {} and {} are out of {} order",
                offset + i,
                offset + i + 1,
                cmp.name()
            );
            false
        }
        None => true,
    })
}

/// Whether the batches of all ranks, concatenated in rank order, are in `cmp` order.
///
/// Besides the local order of each rank, the last record of every non-empty rank is compared
/// with the first record of the next non-empty rank. The answer is the same on every rank.
pub fn is_globally_sorted(
    comm: &dyn Communicator,
    param: &Param,
    cmp: &dyn TraceCompare,
) -> SeisResult<bool> {
    let local = first_inversion(param, cmp).map(|inversion| inversion.is_none());
    let (_, flags) = agree(comm, "order check", local, |sorted| u64::from(*sorted))?;

    let fencepost = match param.len() {
        0 => Bytes::new(),
        n => Shard {
            param: param.take(&[0, n - 1])?,
            ordinals: vec![0, 0],
        }
        .encode(),
    };
    let fenceposts = comm
        .all_gather(fencepost)?
        .into_iter()
        .filter(|payload| !payload.is_empty())
        .map(|payload| Shard::decode(param.rule(), payload))
        .collect::<SeisResult<Vec<_>>>()?;

    let mut sorted = flags.iter().all(|f| *f == 1);
    for pair in fenceposts.windows(2) {
        if cmp.compare(&pair[0].param, 1, &pair[1].param, 0)?.is_gt() {
            sorted = false;
        }
    }
    Ok(sorted)
}

use std::hash::Hasher;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use log::debug;
use rustc_hash::FxHasher;
use seisio_comm::{Communicator, CommunicatorExt};
use seisio_error::{SeisError, SeisResult, seis_bail, seis_err};
use seisio_meta::{Param, Rule};

use crate::TraceCompare;
use crate::collective::{abort, agree};
use crate::wire::Shard;

/// The fewest records every rank must hold for a sort over more than one rank.
pub const MIN_RECORDS_PER_RANK: usize = 3;

/// Tuning of [`sort`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    batch: Option<usize>,
    max_rounds: Option<usize>,
}

impl SortOptions {
    /// Sets the number of records moved across each boundary per exchange.
    ///
    /// The value is clamped to `1..=min / 2`, where `min` is the smallest rank size. It defaults
    /// to the upper bound.
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Fails the sort when it has not settled after `max_rounds` rounds.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// The requested exchange batch, if any.
    pub fn batch(&self) -> Option<usize> {
        self.batch
    }

    /// The round limit, if any.
    pub fn max_rounds(&self) -> Option<usize> {
        self.max_rounds
    }

    fn exchange_batch(&self, min_records: usize) -> usize {
        let cap = (min_records / 2).max(1);
        self.batch.unwrap_or(cap).clamp(1, cap)
    }
}

/// Counters describing a finished [`sort`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Exchange rounds run, including the final round that changed nothing.
    pub rounds: usize,
    /// Records, over all ranks, that ended on a different rank than they started on.
    pub migrated: u64,
}

/// The shard of a sorted dataset held by one rank.
#[derive(Debug, Clone)]
pub struct SortOutcome {
    /// The records of this rank, in order.
    pub param: Param,
    /// The position of each output record in the input, counted over all ranks in rank order.
    pub ordinals: Vec<u64>,
    /// The position in the output, counted over all ranks in rank order, of each record this
    /// rank passed in, in input order.
    pub destinations: Vec<u64>,
    /// Counters, identical on every rank.
    pub stats: SortStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Each rank hands its smallest records down.
    Low,
    /// Each rank hands its largest records up.
    High,
}

struct Step {
    shard: Shard,
    changed: bool,
    failure: Option<SeisError>,
}

/// Sorts records spread over the ranks of `comm` so that concatenating the outputs in rank order
/// yields every record in `cmp` order.
///
/// Every rank keeps as many records as it started with. Records that compare equal keep their
/// relative input order. The call is collective: all ranks must enter it with batches built
/// from the same rule and equally named comparators. Any failure, local or not, is returned
/// identically on every rank.
pub fn sort(
    comm: &dyn Communicator,
    param: &Param,
    cmp: &dyn TraceCompare,
    options: &SortOptions,
) -> SeisResult<SortOutcome> {
    let (rank, size) = (comm.rank(), comm.size());
    let rule = param.rule().clone();
    let len = param.len() as u64;

    let ((), sizes) = agree(comm, "comparator validation", cmp.validate(&rule), |_| len)?;
    let fingerprints = comm.gather_u64(rule.fingerprint())?;
    if let Some(other) = fingerprints.iter().position(|f| *f != fingerprints[0]) {
        return abort(
            comm,
            seis_err!(Collective: "rank {other} sorts records of a different rule than rank 0"),
        );
    }
    let names = comm.gather_u64(name_hash(cmp.name()))?;
    if let Some(other) = names.iter().position(|n| *n != names[0]) {
        return abort(
            comm,
            seis_err!(Collective: "rank {other} sorts with a different comparator than rank 0"),
        );
    }
    if size > 1 {
        let min_records = MIN_RECORDS_PER_RANK as u64;
        if let Some((other, n)) = sizes.iter().enumerate().find(|(_, n)| **n < min_records) {
            return abort(
                comm,
                seis_err!(
                    Unsupported: "rank {other} holds {n} records, sorting across ranks needs at least {MIN_RECORDS_PER_RANK} on every rank"
                ),
            );
        }
    }

    let start = sizes[..rank].iter().sum::<u64>();
    let input = Shard {
        param: param.clone(),
        ordinals: (start..start + len).collect(),
    };
    let (mut shard, _) = agree(comm, "local sort", input.sorted(cmp), |_| 0)?;

    let mut rounds = 0;
    if size > 1 {
        let min_records = sizes.iter().copied().min().unwrap_or(0);
        let k = options.exchange_batch(usize::try_from(min_records).unwrap_or(usize::MAX));
        debug!("rank {rank} sorting {len} records with {size} ranks, batch {k}");
        loop {
            if options.max_rounds.is_some_and(|max| rounds >= max) {
                return abort(
                    comm,
                    seis_err!(Collective: "sort did not settle within {rounds} rounds"),
                );
            }
            rounds += 1;

            let low = exchange(comm, &rule, cmp, &shard, k, Direction::Low)?;
            comm.barrier()?;
            let high = exchange(comm, &rule, cmp, &low.shard, k, Direction::High)?;
            let outcome = match low.failure.or(high.failure) {
                Some(err) => Err(err),
                None => Ok(low.changed || high.changed),
            };
            let (changed, flags) =
                agree(comm, &format!("round {rounds}"), outcome, |c| u64::from(*c))?;
            shard = high.shard;
            debug!("rank {rank} round {rounds}: changed {changed}");
            if flags.iter().all(|f| *f == 0) {
                break;
            }
        }
    }

    let moved = shard
        .ordinals
        .iter()
        .filter(|o| !(start..start + len).contains(o))
        .count();
    let migrated = comm.all_reduce_sum(moved as u64)?;
    let routed = route_destinations(comm, &sizes, &shard.ordinals);
    let (destinations, _) = agree(comm, "destination routing", routed, |_| 0)?;
    debug!("rank {rank} sorted after {rounds} rounds, {migrated} records migrated");
    Ok(SortOutcome {
        param: shard.param,
        ordinals: shard.ordinals,
        destinations,
        stats: SortStats { rounds, migrated },
    })
}

/// Sends the output position of every record held here back to the rank it came from, and
/// collects the output positions of the records this rank passed in.
///
/// Every rank keeps its input size, so output position `start + i` belongs to record `i`.
fn route_destinations(
    comm: &dyn Communicator,
    sizes: &[u64],
    ordinals: &[u64],
) -> SeisResult<Vec<u64>> {
    let rank = comm.rank();
    let starts = sizes
        .iter()
        .scan(0, |acc, n| {
            let start = *acc;
            *acc += n;
            Some(start)
        })
        .collect::<Vec<u64>>();
    let start = starts[rank];

    let mut outgoing = vec![BytesMut::new(); comm.size()];
    for (position, &ordinal) in (start..).zip(ordinals) {
        let origin = starts.partition_point(|s| *s <= ordinal).saturating_sub(1);
        outgoing[origin].put_u64(ordinal);
        outgoing[origin].put_u64(position);
    }
    let incoming = comm.all_to_all(outgoing.into_iter().map(BytesMut::freeze).collect())?;

    let len = sizes[rank];
    let mut destinations = vec![u64::MAX; ordinals.len()];
    let mut filled = 0;
    for (src, mut payload) in incoming.into_iter().enumerate() {
        if payload.len() % 16 != 0 {
            seis_bail!(Collective: "rank {src} sent {} bytes of destinations", payload.len());
        }
        while payload.has_remaining() {
            let (ordinal, position) = (payload.get_u64(), payload.get_u64());
            let Some(slot) = ordinal
                .checked_sub(start)
                .filter(|i| *i < len)
                .and_then(|i| destinations.get_mut(usize::try_from(i).ok()?))
            else {
                seis_bail!(Collective: "rank {src} routed ordinal {ordinal} to rank {rank}");
            };
            *slot = position;
            filled += 1;
        }
    }
    if filled != destinations.len() {
        seis_bail!(Collective: "rank {rank} received {filled} of {} destinations", destinations.len());
    }
    Ok(destinations)
}

fn name_hash(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}

/// One merge-split exchange across every boundary in `direction`.
///
/// Each rank hands its `k` edge records to the neighbour on the `direction` side and merges the
/// `k` edge records of its other neighbour with the rest of its shard, returning as many records
/// from the far end of the merge. Transport errors are returned; comparator errors are kept in
/// the step so the exchange still completes on every rank.
fn exchange(
    comm: &dyn Communicator,
    rule: &Arc<Rule>,
    cmp: &dyn TraceCompare,
    shard: &Shard,
    k: usize,
    direction: Direction,
) -> SeisResult<Step> {
    let (rank, size) = (comm.rank(), comm.size());
    let n = shard.len();
    let lower = rank.checked_sub(1);
    let upper = (rank + 1 < size).then_some(rank + 1);
    let (edge, rest, give_to, take_from) = match direction {
        Direction::Low => (0..k, k..n, lower, upper),
        Direction::High => (n - k..n, 0..n - k, upper, lower),
    };

    let given = shard.rows(edge)?;
    let mut kept = shard.rows(rest)?;
    let mut changed = false;
    let mut failure = None;

    if let Some(peer) = give_to {
        comm.send(peer, given.encode())?;
    }
    if let Some(peer) = take_from {
        let incoming = Shard::decode(rule, comm.recv(peer)?)?;
        let (stay, back) = match merge_split(rule, cmp, &kept, &incoming, direction) {
            Ok(split) => split,
            Err(err) => {
                failure = Some(err);
                (kept.clone(), incoming.clone())
            }
        };
        changed |= back.ordinals != incoming.ordinals;
        comm.send(peer, back.encode())?;
        kept = stay;
    }
    let edge = match give_to {
        Some(peer) => {
            let returned = Shard::decode(rule, comm.recv(peer)?)?;
            changed |= returned.ordinals != given.ordinals;
            returned
        }
        None => given,
    };

    let merged = match direction {
        Direction::Low => Shard::concat(rule, &[edge, kept])?,
        Direction::High => Shard::concat(rule, &[kept, edge])?,
    };
    let shard = if failure.is_some() || !changed {
        merged
    } else {
        match merged.sorted(cmp) {
            Ok(sorted) => sorted,
            Err(err) => {
                failure = Some(err);
                merged
            }
        }
    };
    Ok(Step {
        shard,
        changed,
        failure,
    })
}

/// Merges `incoming` into `kept` and splits off as many records as `incoming` held.
///
/// Returns the records that stay and the records sent back. A low exchange sends back the
/// largest records, a high exchange the smallest.
fn merge_split(
    rule: &Arc<Rule>,
    cmp: &dyn TraceCompare,
    kept: &Shard,
    incoming: &Shard,
    direction: Direction,
) -> SeisResult<(Shard, Shard)> {
    let merged = Shard::concat(rule, &[kept.clone(), incoming.clone()])?.sorted(cmp)?;
    let (total, m) = (merged.len(), incoming.len());
    Ok(match direction {
        Direction::Low => (merged.rows(0..total - m)?, merged.rows(total - m..total)?),
        Direction::High => (merged.rows(m..total)?, merged.rows(0..m)?),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, 3, 1)]
    #[case(None, 10, 5)]
    #[case(Some(2), 10, 2)]
    #[case(Some(0), 10, 1)]
    #[case(Some(9), 10, 5)]
    #[case(None, 1, 1)]
    fn batch_is_clamped(#[case] batch: Option<usize>, #[case] min: usize, #[case] k: usize) {
        let mut options = SortOptions::default();
        if let Some(batch) = batch {
            options = options.with_batch(batch);
        }
        assert_eq!(options.exchange_batch(min), k);
    }

    #[test]
    fn options_builder() {
        let options = SortOptions::default().with_batch(4).with_max_rounds(10);
        assert_eq!(options.batch(), Some(4));
        assert_eq!(options.max_rounds(), Some(10));
    }

    #[test]
    fn names_hash_apart() {
        assert_ne!(name_hash("SrcOff"), name_hash("SrcROff"));
        assert_eq!(name_hash("SrcOff"), name_hash("SrcOff"));
    }
}

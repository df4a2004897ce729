use bytes::{Buf, BufMut, BytesMut};
use log::warn;
use seisio_comm::Communicator;
use seisio_error::{SeisError, SeisResult, seis_bail};

const OK: u8 = 0;
const FAILED: u8 = 1;

/// Settles the outcome of a stage run independently on every rank.
///
/// Each rank contributes either a value derived from its local result or its error. When any
/// rank failed, every rank returns the same [`SeisError::Collective`] naming the lowest failed
/// rank, after a barrier. Otherwise the local result comes back with the values of all ranks.
pub(crate) fn agree<T>(
    comm: &dyn Communicator,
    stage: &str,
    local: SeisResult<T>,
    value: impl FnOnce(&T) -> u64,
) -> SeisResult<(T, Vec<u64>)> {
    let mut buf = BytesMut::new();
    match &local {
        Ok(t) => {
            buf.put_u8(OK);
            buf.put_u64(value(t));
        }
        Err(err) => {
            warn!("{stage} failed on rank {}: {}", comm.rank(), err.message());
            buf.put_u8(FAILED);
            buf.put_slice(err.message().as_bytes());
        }
    }

    let mut values = Vec::with_capacity(comm.size());
    let mut failed = None;
    for (rank, mut payload) in comm.all_gather(buf.freeze())?.into_iter().enumerate() {
        match payload.first().copied() {
            Some(OK) if payload.len() == 9 => {
                payload.advance(1);
                values.push(payload.get_u64());
            }
            Some(FAILED) => {
                if failed.is_none() {
                    failed = Some((rank, String::from_utf8_lossy(&payload[1..]).into_owned()));
                }
            }
            _ => seis_bail!(Collective: "malformed status from rank {rank} during {stage}"),
        }
    }
    if let Some((rank, msg)) = failed {
        comm.barrier()?;
        seis_bail!(Collective: "{stage} failed on rank {rank}: {msg}");
    }
    local.map(|t| (t, values))
}

/// Returns `err` once every rank has reached the same verdict.
pub(crate) fn abort<T>(comm: &dyn Communicator, err: SeisError) -> SeisResult<T> {
    comm.barrier()?;
    Err(err)
}

#[cfg(test)]
mod tests {
    use seisio_comm::LocalGroup;
    use seisio_error::seis_err;

    use super::*;

    #[test]
    fn all_ranks_succeed() {
        let results = LocalGroup::run(3, |comm| {
            agree(&comm, "stage", Ok(comm.rank() * 2), |&v| v as u64).unwrap()
        });
        for (rank, (local, values)) in results.into_iter().enumerate() {
            assert_eq!(local, rank * 2);
            assert_eq!(values, vec![0, 2, 4]);
        }
    }

    #[test]
    fn failures_are_reported_identically() {
        let results = LocalGroup::run(4, |comm| {
            let local = if comm.rank() % 2 == 1 {
                Err(seis_err!(InvalidArgument: "bad input on {}", comm.rank()))
            } else {
                Ok(())
            };
            agree(&comm, "stage", local, |_| 0).unwrap_err().message()
        });
        assert!(results[0].contains("stage failed on rank 1: bad input on 1"));
        assert!(results.iter().all(|msg| msg == &results[0]));
    }
}

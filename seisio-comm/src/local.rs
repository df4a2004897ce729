use std::panic::resume_unwind;
use std::sync::{Arc, Barrier};
use std::thread;

use bytes::Bytes;
use flume::{Receiver, Sender};
use itertools::Itertools;
use log::trace;
use seisio_error::{SeisResult, seis_bail, seis_err, seis_panic};

use crate::Communicator;

/// A process group whose ranks are threads of the current process.
pub struct LocalGroup;

impl LocalGroup {
    /// Creates the communicators of a group of `size` ranks, indexed by rank.
    ///
    /// Every ordered pair of ranks gets one point-to-point channel and one collective channel,
    /// so messages between two ranks arrive in the order they were sent.
    pub fn new(size: usize) -> Vec<LocalComm> {
        let barrier = Arc::new(Barrier::new(size));
        let matrix = || {
            let (tx, rx): (Vec<Vec<_>>, Vec<Vec<_>>) = (0..size)
                .map(|_| {
                    (0..size)
                        .map(|_| flume::unbounded::<Bytes>())
                        .unzip::<_, _, Vec<_>, Vec<_>>()
                })
                .unzip();
            // tx[src][dest] feeds rx[src][dest]; receivers are regrouped by destination.
            let mut by_dest = (0..size).map(|_| Vec::with_capacity(size)).collect_vec();
            for row in rx {
                for (dest, rx) in row.into_iter().enumerate() {
                    by_dest[dest].push(rx);
                }
            }
            (tx, by_dest)
        };
        let (p2p_tx, p2p_rx) = matrix();
        let (coll_tx, coll_rx) = matrix();

        p2p_tx
            .into_iter()
            .zip(p2p_rx)
            .zip(coll_tx.into_iter().zip(coll_rx))
            .enumerate()
            .map(|(rank, ((p2p_tx, p2p_rx), (coll_tx, coll_rx)))| LocalComm {
                rank,
                size,
                p2p_tx,
                p2p_rx,
                coll_tx,
                coll_rx,
                barrier: barrier.clone(),
            })
            .collect()
    }

    /// Runs `f` on every rank of a group of `size` ranks, one thread each, returning the results
    /// by rank. A panic on any rank is resumed on the caller.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(LocalComm) -> T + Sync,
    {
        let f = &f;
        thread::scope(|scope| {
            let handles = Self::new(size)
                .into_iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("seisio-rank-{}", comm.rank))
                        .spawn_scoped(scope, move || f(comm))
                        .unwrap_or_else(|e| seis_panic!("LocalGroup rank thread spawn: {e}"))
                })
                .collect_vec();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|err| resume_unwind(err)))
                .collect()
        })
    }
}

/// One rank of a [`LocalGroup`].
pub struct LocalComm {
    rank: usize,
    size: usize,
    p2p_tx: Vec<Sender<Bytes>>,
    p2p_rx: Vec<Receiver<Bytes>>,
    coll_tx: Vec<Sender<Bytes>>,
    coll_rx: Vec<Receiver<Bytes>>,
    barrier: Arc<Barrier>,
}

impl LocalComm {
    fn check_peer(&self, peer: usize) -> SeisResult<()> {
        if peer >= self.size {
            seis_bail!(OutOfBounds: peer, 0, self.size);
        }
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, payload: Bytes) -> SeisResult<()> {
        self.check_peer(dest)?;
        trace!("rank {} sending {} bytes to {dest}", self.rank, payload.len());
        self.p2p_tx[dest]
            .send(payload)
            .map_err(|_| seis_err!(Collective: "rank {dest} has left the group"))
    }

    fn recv(&self, src: usize) -> SeisResult<Bytes> {
        self.check_peer(src)?;
        let payload = self.p2p_rx[src]
            .recv()
            .map_err(|_| seis_err!(Collective: "rank {src} has left the group"))?;
        trace!("rank {} received {} bytes from {src}", self.rank, payload.len());
        Ok(payload)
    }

    fn all_gather(&self, payload: Bytes) -> SeisResult<Vec<Bytes>> {
        for (dest, tx) in self.coll_tx.iter().enumerate() {
            if dest != self.rank {
                tx.send(payload.clone())
                    .map_err(|_| seis_err!(Collective: "rank {dest} has left the group"))?;
            }
        }
        self.coll_rx
            .iter()
            .enumerate()
            .map(|(src, rx)| {
                if src == self.rank {
                    Ok(payload.clone())
                } else {
                    rx.recv()
                        .map_err(|_| seis_err!(Collective: "rank {src} has left the group"))
                }
            })
            .collect()
    }

    fn barrier(&self) -> SeisResult<()> {
        self.barrier.wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use seisio_error::SeisError;

    use super::*;

    #[test]
    fn ring_exchange() {
        let received = LocalGroup::run(4, |comm| {
            let next = (comm.rank() + 1) % comm.size();
            let prev = (comm.rank() + comm.size() - 1) % comm.size();
            comm.send(next, Bytes::from(vec![comm.rank() as u8])).unwrap();
            comm.barrier().unwrap();
            comm.recv(prev).unwrap()
        });
        for (rank, payload) in received.into_iter().enumerate() {
            assert_eq!(payload.as_ref(), &[((rank + 3) % 4) as u8]);
        }
    }

    #[test]
    fn messages_keep_order() {
        let received = LocalGroup::run(2, |comm| {
            if comm.rank() == 0 {
                for i in 0..10u8 {
                    comm.send(1, Bytes::from(vec![i])).unwrap();
                }
                vec![]
            } else {
                (0..10).map(|_| comm.recv(0).unwrap()[0]).collect_vec()
            }
        });
        assert_eq!(received[1], (0..10u8).collect_vec());
    }

    #[test]
    fn gathers_by_rank() {
        let gathered = LocalGroup::run(3, |comm| {
            let first = comm
                .all_gather(Bytes::from(format!("a{}", comm.rank())))
                .unwrap();
            let second = comm
                .all_gather(Bytes::from(format!("b{}", comm.rank())))
                .unwrap();
            (first, second)
        });
        for (first, second) in gathered {
            assert_eq!(first, vec!["a0", "a1", "a2"]);
            assert_eq!(second, vec!["b0", "b1", "b2"]);
        }
    }

    #[test]
    fn departed_peer() {
        let mut comms = LocalGroup::new(2);
        let survivor = comms.remove(0);
        drop(comms);
        assert!(matches!(survivor.recv(1), Err(SeisError::Collective(..))));
        assert!(matches!(
            survivor.send(1, Bytes::new()),
            Err(SeisError::Collective(..))
        ));
        assert!(matches!(
            survivor.recv(2),
            Err(SeisError::OutOfBounds(..))
        ));
    }
}

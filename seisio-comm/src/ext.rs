use std::cmp::Ordering;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use seisio_error::{SeisResult, seis_bail};

use crate::Communicator;

/// Reductions and typed gathers built on [`Communicator::all_gather`], and a personalised
/// exchange built on point-to-point messages.
pub trait CommunicatorExt: Communicator {
    /// Gathers one `u64` from every rank.
    fn gather_u64(&self, value: u64) -> SeisResult<Vec<u64>> {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u64(value);
        self.all_gather(buf.freeze())?
            .into_iter()
            .map(|mut b| {
                if b.remaining() != 8 {
                    seis_bail!(Collective: "expected an 8 byte integer, got {} bytes", b.remaining());
                }
                Ok(b.get_u64())
            })
            .collect()
    }

    /// Gathers one `f64` from every rank.
    fn gather_f64(&self, value: f64) -> SeisResult<Vec<f64>> {
        Ok(self
            .gather_u64(value.to_bits())?
            .into_iter()
            .map(f64::from_bits)
            .collect())
    }

    /// The sum of `value` over all ranks.
    fn all_reduce_sum(&self, value: u64) -> SeisResult<u64> {
        Ok(self.gather_u64(value)?.into_iter().sum())
    }

    /// The largest `value` over all ranks.
    fn all_reduce_max(&self, value: u64) -> SeisResult<u64> {
        Ok(self.gather_u64(value)?.into_iter().max().unwrap_or(value))
    }

    /// The smallest `value` over all ranks.
    fn all_reduce_min(&self, value: u64) -> SeisResult<u64> {
        Ok(self.gather_u64(value)?.into_iter().min().unwrap_or(value))
    }

    /// Whether `flag` is set on any rank.
    fn all_reduce_any(&self, flag: bool) -> SeisResult<bool> {
        Ok(self.all_reduce_max(u64::from(flag))? > 0)
    }

    /// The sum of `value` over the ranks below this one.
    fn exclusive_prefix_sum(&self, value: u64) -> SeisResult<u64> {
        Ok(self.gather_u64(value)?[..self.rank()].iter().sum())
    }

    /// Sends `payloads[r]` to every rank `r` and returns the payload each rank sent here, indexed
    /// by source rank.
    ///
    /// Ranks meet pair by pair in ascending order of the pair, the lower rank sending first, so
    /// the exchange completes under blocking sends.
    fn all_to_all(&self, payloads: Vec<Bytes>) -> SeisResult<Vec<Bytes>> {
        let (rank, size) = (self.rank(), self.size());
        if payloads.len() != size {
            seis_bail!(InvalidArgument: "{} payloads for a group of {size}", payloads.len());
        }
        let mut received = Vec::with_capacity(size);
        for (peer, payload) in payloads.into_iter().enumerate() {
            let incoming = match peer.cmp(&rank) {
                Ordering::Equal => payload,
                Ordering::Less => {
                    let incoming = self.recv(peer)?;
                    self.send(peer, payload)?;
                    incoming
                }
                Ordering::Greater => {
                    self.send(peer, payload)?;
                    self.recv(peer)?
                }
            };
            received.push(incoming);
        }
        Ok(received)
    }
}

impl<C: Communicator + ?Sized> CommunicatorExt for C {}

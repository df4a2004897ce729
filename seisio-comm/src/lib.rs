#![deny(missing_docs)]

//! Process-group communication for seisio.
//!
//! Cooperating ranks talk through a [`Communicator`]: blocking point-to-point messages, an
//! all-gather of byte buffers and a barrier. Reductions and typed gathers are derived from those
//! in [`CommunicatorExt`]. [`LocalGroup`] runs a whole group inside one process, one thread per
//! rank.

pub use decompose::*;
pub use ext::*;
pub use local::*;

mod decompose;
mod ext;
mod local;

use bytes::Bytes;
use seisio_error::SeisResult;

/// A group of ranks exchanging opaque byte buffers.
///
/// Every operation blocks until its counterpart is ready. Collective operations must be entered
/// by every rank of the group in the same order.
pub trait Communicator: Send + Sync {
    /// The rank of this process, in `0..size`.
    fn rank(&self) -> usize;

    /// The number of ranks in the group.
    fn size(&self) -> usize;

    /// Sends `payload` to rank `dest`.
    fn send(&self, dest: usize, payload: Bytes) -> SeisResult<()>;

    /// Receives the next payload rank `src` sent to this rank.
    fn recv(&self, src: usize) -> SeisResult<Bytes>;

    /// Collects one payload from every rank, indexed by rank.
    fn all_gather(&self, payload: Bytes) -> SeisResult<Vec<Bytes>>;

    /// Blocks until every rank has entered the barrier.
    fn barrier(&self) -> SeisResult<()>;
}

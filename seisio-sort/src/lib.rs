#![deny(missing_docs)]

//! Ordering of trace metadata, locally and across the ranks of a process group.
//!
//! A [`TraceCompare`] defines the order. [`SortType`] names the standard orders over
//! coordinates, line indices and offsets, and any closure over two records works as well.
//! [`sort`] redistributes the records of every rank so that the ranks, taken in order, hold one
//! totally ordered sequence. [`check_order`] and [`is_globally_sorted`] verify the result.

pub use check::*;
pub use compare::*;
pub use distributed::*;
pub use local::*;

mod check;
mod collective;
mod compare;
mod distributed;
mod local;
pub mod minmax;
mod wire;

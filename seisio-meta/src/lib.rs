#![deny(missing_docs)]

//! Trace metadata for seisio.
//!
//! A [`Rule`] maps semantic [`MetaKey`]s onto locations in the 240-byte trace header, and a
//! [`Param`] holds the decoded values of a batch of traces as one column family per storage kind.
//! The [`codec`] moves values between raw headers and a [`Param`].

pub use entry::*;
pub use key::*;
pub use param::*;
pub use rule::*;
pub use value::*;

pub mod codec;
mod entry;
mod key;
mod param;
mod rule;
pub mod scale;
pub mod segy;
#[cfg(feature = "serde")]
mod serde;
mod value;

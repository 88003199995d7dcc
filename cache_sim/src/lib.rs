//! Single-level set-associative cache in front of a byte-addressable memory.
//!
//! [`sim::Simulator`] owns every piece of state and serves one read or write
//! at a time; it is not meant to be shared between threads.

mod bin;
pub mod cache;
pub mod codec;
pub mod common;
pub mod config;
pub mod io;
pub mod memory;
pub mod replacement;
pub mod sim;
pub mod snapshot;

#[cfg(feature = "stat")]
pub mod stat;

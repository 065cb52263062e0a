//! The dicefeed synthetic metrics daemon.
//!
//! This library supports the dicefeed binary found elsewhere in this
//! project. On every clock-aligned tick the feeder rolls one die per
//! simulated site and submits the batch to a graphite backend over the
//! plaintext line protocol, tagged with a server identity.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod feeder;
pub mod graphite;
pub mod sample;

#![warn(missing_docs)]

//! Execution-unit model of tilescan.
//!
//! A run is executed by a fixed grid of cores, each a single thread with its own local state.
//! Cores only cooperate through a [Rendezvous] (a phased barrier) and a [TotalsBoard], a
//! write-once area where every core publishes its trailing totals for the others to read.

/// Global configuration.
pub mod config;

mod board;
mod error;
mod grid;
mod rendezvous;

pub use board::*;
pub use error::*;
pub use grid::*;
pub use rendezvous::*;

//! Analysis modules.
//!
//! Turns comparison rows into the distribution, series and correlation
//! views the report renders.

pub mod aggregator;

pub use aggregator::*;

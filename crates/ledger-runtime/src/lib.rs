//! Runtime layer for receipt-ledger.
//!
//! Fans a batch of messages out over a bounded pool of blocking workers and
//! joins the results into the master dataset.

pub mod batch;

pub use ledger_core as core;
pub use ledger_data as data;

//! Extraction layer for the receipt ledger.
//!
//! Decodes exported messages, flattens their bodies, runs the provider
//! extractors and folds the results into a sorted master dataset.

pub mod aggregator;
pub mod builder;
pub mod extract;
pub mod flatten;
pub mod mime;
pub mod pipeline;
pub mod reader;
pub mod summary;

pub use ledger_core as core;

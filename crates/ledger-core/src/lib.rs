//! Core types for the receipt ledger.
//!
//! The canonical transaction model, monetary amounts, the error taxonomy,
//! CLI settings and timezone helpers shared by every other crate.

pub mod amount;
pub mod error;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use amount::Amount;
pub use error::{ExtractionRejected, LedgerError, Result};
pub use models::{
    DecodedMessage, Field, MessageMetadata, Payload, Provider, RawFieldMap, RawMessage,
    RecordWarning, TransactionRecord, TxnType,
};

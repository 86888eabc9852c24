//! Canonical record construction from raw provider fields.

use ledger_core::amount::Amount;
use ledger_core::error::{LedgerError, Result};
use ledger_core::models::{Field, MessageMetadata, RawFieldMap, TransactionRecord, UNKNOWN};

/// Stateless builder turning a [`RawFieldMap`] into a [`TransactionRecord`].
pub struct RecordBuilder;

impl RecordBuilder {
    /// Normalize `raw` into a canonical record.
    ///
    /// `txn_date` always comes from the message envelope. A missing amount is
    /// an error; missing counterparties become `"unknown"`.
    pub fn build(raw: RawFieldMap, meta: &MessageMetadata) -> Result<TransactionRecord> {
        let amount = raw
            .get(Field::Amount)
            .ok_or_else(|| LedgerError::InvalidAmount(String::new()))
            .and_then(Amount::parse)?;

        let mut fields = raw.fields;
        let mut take = |field: Field| fields.remove(&field).filter(|v| !v.trim().is_empty());

        Ok(TransactionRecord {
            txn_type: raw.txn_type,
            txn_id: take(Field::TxnId),
            txn_date: meta.date,
            txn_time: take(Field::TxnTime),
            txn_amount: amount,
            txn_from: take(Field::From).unwrap_or_else(|| UNKNOWN.to_string()),
            txn_to: take(Field::To).unwrap_or_else(|| UNKNOWN.to_string()),
            message_id: meta.message_id.clone(),
            warnings: raw.warnings,
        })
    }
}

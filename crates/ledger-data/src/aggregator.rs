//! Aggregation of per-message outcomes into the master dataset.
//!
//! The only stage that sees more than one message. Drops everything that did
//! not become a record, then orders the survivors by transaction date.

use std::collections::HashSet;

use ledger_core::models::{TransactionRecord, TxnType};
use tracing::{debug, info, warn};

use crate::pipeline::{MessageOutcome, OutcomeKind};

// ── AggregationReport ─────────────────────────────────────────────────────────

/// Counts of what happened to a batch of messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub emitted: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Emitted records that carry at least one warning.
    pub flagged: usize,
}

impl AggregationReport {
    pub fn total(&self) -> usize {
        self.emitted + self.skipped + self.rejected + self.failed
    }

    /// Report with `emitted` and `flagged` recounted over `records`, e.g.
    /// after deduplication.
    pub fn recounted(&self, records: &[TransactionRecord]) -> Self {
        Self {
            emitted: records.len(),
            flagged: records.iter().filter(|r| r.is_flagged()).count(),
            ..*self
        }
    }
}

// ── MasterDataset ─────────────────────────────────────────────────────────────

/// Records sorted ascending by `txn_date`, plus what was dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct MasterDataset {
    pub records: Vec<TransactionRecord>,
    pub report: AggregationReport,
    /// Message ids of flagged records, in dataset order.
    pub flagged: Vec<String>,
}

impl MasterDataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless helper that folds outcomes into a [`MasterDataset`].
pub struct Aggregator;

impl Aggregator {
    /// Build the master dataset from `outcomes`, in any order.
    ///
    /// Input order is first fixed by message id, then records are
    /// stable-sorted by date, so equal dates keep message-id order whatever
    /// order the workers finished in.
    pub fn aggregate(mut outcomes: Vec<MessageOutcome>) -> MasterDataset {
        outcomes.sort_by(|a, b| a.message_id.cmp(&b.message_id));

        let mut report = AggregationReport::default();
        let mut records: Vec<TransactionRecord> = Vec::new();

        for outcome in outcomes {
            let provider = outcome
                .provider
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            match outcome.kind {
                OutcomeKind::Record(record) => {
                    report.emitted += 1;
                    for warning in &record.warnings {
                        warn!(
                            message_id = %outcome.message_id,
                            provider = %provider,
                            "flagged record: {}", warning
                        );
                    }
                    records.push(record);
                }
                OutcomeKind::Skipped { reason } => {
                    report.skipped += 1;
                    debug!(message_id = %outcome.message_id, provider = %provider, "skipped: {}", reason);
                }
                OutcomeKind::Rejected(rejected) => {
                    report.rejected += 1;
                    warn!(message_id = %outcome.message_id, provider = %provider, "dropped: {}", rejected);
                }
                OutcomeKind::Failed(err) => {
                    report.failed += 1;
                    warn!(message_id = %outcome.message_id, provider = %provider, "failed: {}", err);
                }
            }
        }

        records.sort_by_key(|r| r.txn_date);

        let flagged: Vec<String> = records
            .iter()
            .filter(|r| r.is_flagged())
            .map(|r| r.message_id.clone())
            .collect();
        report.flagged = flagged.len();

        info!(
            emitted = report.emitted,
            skipped = report.skipped,
            rejected = report.rejected,
            failed = report.failed,
            flagged = report.flagged,
            "aggregated {} messages",
            report.total()
        );

        MasterDataset {
            records,
            report,
            flagged,
        }
    }

    /// Keep the first record per `(txn_type, txn_id)`.
    ///
    /// Records without an id are never merged. Order is preserved.
    pub fn dedupe_by_identity(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
        let mut seen: HashSet<(TxnType, String)> = HashSet::new();
        let before = records.len();

        let kept: Vec<TransactionRecord> = records
            .into_iter()
            .filter(|record| match record.identity() {
                Some((txn_type, id)) => seen.insert((txn_type, id.to_string())),
                None => true,
            })
            .collect();

        if kept.len() < before {
            info!("dedupe removed {} duplicate records", before - kept.len());
        }
        kept
    }
}

//! PayLah transaction alerts.
//!
//! The alert carries a `Transaction Ref:` line and an eight-cell table
//! introduced by `Date & Time:`. Cell positions are fixed by the template.

use std::sync::OnceLock;

use ledger_core::error::ExtractionRejected;
use ledger_core::models::{
    Field, MessageMetadata, Provider, RawFieldMap, TxnType, MISSING_TXN_ID, SELF_ACCOUNT,
};
use ledger_core::time_utils::normalize_24h_clock;
use regex::Regex;
use tracing::debug;

use super::fsm::{AnchorMachine, TokenPredicate, Transition};
use super::Extractor;
use crate::flatten::Document;

pub const SCHEMA: &str = "paylah-v1";

const REF_ANCHOR: &str = "Transaction Ref:";
const TABLE_ANCHOR: &str = "Date & Time:";

const CELL_COUNT: usize = 8;
const TIME_CELL: usize = 1;
const AMOUNT_CELL: usize = 3;
const FROM_CELL: usize = 5;
const TO_CELL: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    RefSeen,
    TableSeen,
    Done,
}

const TRANSITIONS: &[Transition<State>] = &[
    Transition::capturing(
        State::Scanning,
        TokenPredicate::StartsWith(REF_ANCHOR),
        State::RefSeen,
        Field::TxnId,
    ),
    Transition::new(
        State::Scanning,
        TokenPredicate::Equals(TABLE_ANCHOR),
        State::TableSeen,
    ),
    Transition::new(
        State::RefSeen,
        TokenPredicate::Equals(TABLE_ANCHOR),
        State::Done,
    ),
    Transition::capturing(
        State::TableSeen,
        TokenPredicate::StartsWith(REF_ANCHOR),
        State::Done,
        Field::TxnId,
    ),
];

fn clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2}:\d{2})\b").expect("invalid clock regex"))
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Z]{3})?\s*(\d[\d,]*(?:\.\d+)?)$").expect("invalid amount regex")
    })
}

/// Extractor for `paylah.alert@dbs.com` alerts.
#[derive(Debug, Clone)]
pub struct PayLahExtractor {
    self_account_markers: Vec<String>,
}

impl PayLahExtractor {
    pub fn new(self_account_markers: Vec<String>) -> Self {
        Self {
            self_account_markers,
        }
    }

    fn is_self_account(&self, label: &str) -> bool {
        self.self_account_markers
            .iter()
            .any(|marker| !marker.is_empty() && label.contains(marker.as_str()))
    }

    fn normalize_time(&self, cell: &str) -> Result<String, ExtractionRejected> {
        clock_re()
            .captures(cell)
            .and_then(|caps| normalize_24h_clock(&caps[1]))
            .ok_or_else(|| self.reject(format!("no clock time in cell {cell:?}")))
    }

    fn normalize_amount(&self, cell: &str) -> Result<String, ExtractionRejected> {
        amount_re()
            .captures(cell.trim())
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| self.reject(format!("no amount in cell {cell:?}")))
    }
}

impl Extractor for PayLahExtractor {
    fn provider(&self) -> Provider {
        Provider::PayLah
    }

    fn schema(&self) -> &'static str {
        SCHEMA
    }

    fn extract(
        &self,
        doc: &Document,
        meta: &MessageMetadata,
    ) -> Result<RawFieldMap, ExtractionRejected> {
        let scan = AnchorMachine::new(TRANSITIONS, State::Scanning, State::Done).scan(doc.tokens());

        if !matches!(scan.state, State::TableSeen | State::Done) {
            return Err(self.reject(format!("no {TABLE_ANCHOR:?} anchor")));
        }

        // The reference is the text between the first and second colon.
        let txn_id = scan
            .get(Field::TxnId)
            .and_then(|token| token.split(':').nth(1))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(MISSING_TXN_ID);

        let cells = doc
            .table_cells_near(TABLE_ANCHOR)
            .ok_or_else(|| self.reject(format!("no table around {TABLE_ANCHOR:?}")))?;
        if cells.len() != CELL_COUNT {
            return Err(self.reject(format!(
                "expected {CELL_COUNT} cells, found {}",
                cells.len()
            )));
        }
        debug!(message_id = %meta.message_id, ?cells, "paylah table cells");

        let mut raw = RawFieldMap::new(TxnType::PayLah)
            .with(Field::TxnId, txn_id)
            .with(Field::TxnTime, self.normalize_time(&cells[TIME_CELL])?)
            .with(Field::Amount, self.normalize_amount(&cells[AMOUNT_CELL])?);

        let from = &cells[FROM_CELL];
        if self.is_self_account(from) {
            raw.set(Field::From, SELF_ACCOUNT);
        } else if !from.is_empty() {
            raw.set(Field::From, from.as_str());
        }

        let to = &cells[TO_CELL];
        if !to.is_empty() {
            raw.set(Field::To, to.as_str());
        }

        Ok(raw)
    }
}

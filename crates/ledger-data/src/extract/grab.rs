//! Grab e-receipts.
//!
//! The body only reliably yields the service kind and a currency-marked
//! total. Id and date come from the message itself.

use ledger_core::error::ExtractionRejected;
use ledger_core::models::{
    Field, MessageMetadata, Provider, RawFieldMap, RecordWarning, TxnType, SELF_ACCOUNT,
};
use tracing::warn;

use super::fsm::{AnchorMachine, TokenPredicate, Transition};
use super::Extractor;
use crate::flatten::Document;

pub const SCHEMA: &str = "grab-v1";

const CURRENCY_PREFIXES: &[&str] = &["S$", "SGD"];
const COUNTERPARTY: &str = "Grab";
const MISSING_AMOUNT: &str = "0.00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    Done,
}

const TRANSITIONS: &[Transition<State>] = &[Transition::capturing(
    State::Scanning,
    TokenPredicate::StartsWithAny(CURRENCY_PREFIXES),
    State::Done,
    Field::Amount,
)];

/// Extractor for receipts sent from `grab.com` addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrabExtractor;

impl GrabExtractor {
    /// Service kind from keywords anywhere in the text.
    pub fn classify(text: &str) -> TxnType {
        let text = text.to_lowercase();
        if text.contains("ride") {
            TxnType::GrabTransport
        } else if text.contains("food") {
            TxnType::GrabFood
        } else {
            TxnType::Grab
        }
    }
}

/// Numeric part of a currency-marked token: `"S$ 12.50"` → `"12.50"`.
fn amount_from_token(token: &str) -> Option<&str> {
    let rest = CURRENCY_PREFIXES
        .iter()
        .find_map(|prefix| token.strip_prefix(prefix))
        .unwrap_or(token);
    rest.split_whitespace().last()
}

impl Extractor for GrabExtractor {
    fn provider(&self) -> Provider {
        Provider::Grab
    }

    fn schema(&self) -> &'static str {
        SCHEMA
    }

    fn extract(
        &self,
        doc: &Document,
        meta: &MessageMetadata,
    ) -> Result<RawFieldMap, ExtractionRejected> {
        let tokens = doc.tokens();
        let txn_type = Self::classify(&tokens.joined());

        let scan = AnchorMachine::new(TRANSITIONS, State::Scanning, State::Done).scan(tokens);

        let mut raw = RawFieldMap::new(txn_type)
            .with(Field::TxnId, meta.message_id.as_str())
            .with(Field::From, SELF_ACCOUNT)
            .with(Field::To, COUNTERPARTY);

        match scan.get(Field::Amount).and_then(amount_from_token) {
            Some(amount) => raw.set(Field::Amount, amount),
            None => {
                warn!(
                    message_id = %meta.message_id,
                    "no currency-marked amount, defaulting to {}", MISSING_AMOUNT
                );
                raw.set(Field::Amount, MISSING_AMOUNT);
                raw.warn(RecordWarning::MissingAmount);
            }
        }

        Ok(raw)
    }
}

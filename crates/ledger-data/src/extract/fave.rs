//! FavePay receipts.
//!
//! Marker tokens (`Where`, `Total`, `Receipt ID`) announce the value in the
//! token that follows them. The receipt time floats free of the markers.

use std::sync::OnceLock;

use ledger_core::error::ExtractionRejected;
use ledger_core::models::{Field, MessageMetadata, Provider, RawFieldMap, TxnType, SELF_ACCOUNT};
use ledger_core::time_utils::to_24h_clock;
use regex::Regex;

use super::fsm::{AnchorMachine, TokenPredicate, Transition};
use super::Extractor;
use crate::flatten::Document;

pub const SCHEMA: &str = "fave-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    AwaitMerchant,
    AwaitAmount,
    AwaitId,
    Done,
}

const TRANSITIONS: &[Transition<State>] = &[
    Transition::new(State::Scanning, TokenPredicate::Marker("Where"), State::AwaitMerchant),
    Transition::new(State::Scanning, TokenPredicate::Marker("Total"), State::AwaitAmount),
    Transition::new(State::Scanning, TokenPredicate::Marker("Receipt ID"), State::AwaitId),
    Transition::capturing(State::AwaitMerchant, TokenPredicate::Any, State::Scanning, Field::To),
    Transition::capturing(State::AwaitAmount, TokenPredicate::Any, State::Done, Field::Amount),
    Transition::capturing(State::AwaitId, TokenPredicate::Any, State::Scanning, Field::TxnId),
];

/// Total as printed by the template: `S$` then the amount.
fn total_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^S\$\s*(\d[\d,]*(?:\.\d+)?)$").expect("invalid total regex"))
}

fn meridiem_clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2}:\d{2})\s*([AP]M)\b").expect("invalid meridiem clock regex")
    })
}

/// Extractor for `hi@myfave.com` receipts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaveExtractor;

/// 24-hour `HH:MM` from a token such as `"Fri 14 Jul 2023, 9:05 PM SGT"`.
fn receipt_time(token: &str) -> Option<String> {
    let caps = meridiem_clock_re().captures(token)?;
    to_24h_clock(&caps[1], &caps[2])
}

impl Extractor for FaveExtractor {
    fn provider(&self) -> Provider {
        Provider::Fave
    }

    fn schema(&self) -> &'static str {
        SCHEMA
    }

    fn extract(
        &self,
        doc: &Document,
        _meta: &MessageMetadata,
    ) -> Result<RawFieldMap, ExtractionRejected> {
        let tokens = doc.tokens();
        let scan = AnchorMachine::new(TRANSITIONS, State::Scanning, State::Done).scan(tokens);

        let token = scan
            .get(Field::Amount)
            .ok_or_else(|| self.reject("no amount after \"Total\""))?;
        let amount = total_re()
            .captures(token.trim())
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| self.reject(format!("total {token:?} is not an S$ amount")))?;

        let mut raw = RawFieldMap::new(TxnType::Fave)
            .with(Field::Amount, amount)
            .with(Field::From, SELF_ACCOUNT);

        if let Some(merchant) = scan.get(Field::To) {
            raw.set(Field::To, merchant);
        }
        if let Some(id) = scan.get(Field::TxnId) {
            raw.set(Field::TxnId, id);
        }
        if let Some(time) = tokens.iter().take(scan.consumed).find_map(|t| receipt_time(t)) {
            raw.set(Field::TxnTime, time);
        }

        Ok(raw)
    }
}

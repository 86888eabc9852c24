//! Provider extractors and dispatch.
//!
//! Each provider's email template is understood by one [`Extractor`]. The
//! caller decides which provider a message belongs to with
//! [`detect_provider`] and gates it with [`accepts_subject`] before any
//! extractor sees the body.

pub mod fave;
pub mod fsm;
pub mod grab;
pub mod paylah;

use ledger_core::error::ExtractionRejected;
use ledger_core::models::{MessageMetadata, Provider, RawFieldMap};

use crate::flatten::Document;

pub use fave::FaveExtractor;
pub use grab::GrabExtractor;
pub use paylah::PayLahExtractor;

/// Sender address of PayLah transaction alerts.
pub const PAYLAH_SENDER: &str = "paylah.alert@dbs.com";
/// Sender address of FavePay receipts.
pub const FAVE_SENDER: &str = "hi@myfave.com";
/// Domain of every Grab sender address.
pub const GRAB_DOMAIN: &str = "grab.com";

/// Turns a flattened message body into raw provider fields.
pub trait Extractor: Send + Sync {
    fn provider(&self) -> Provider;

    /// Named template layout the extractor's offsets belong to.
    fn schema(&self) -> &'static str;

    fn extract(
        &self,
        doc: &Document,
        meta: &MessageMetadata,
    ) -> Result<RawFieldMap, ExtractionRejected>;

    fn reject(&self, reason: impl Into<String>) -> ExtractionRejected
    where
        Self: Sized,
    {
        ExtractionRejected::new(self.provider(), self.schema(), reason)
    }
}

/// Per-run extractor options.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Substrings identifying the user's own accounts.
    pub self_account_markers: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            self_account_markers: vec!["0920".to_string()],
        }
    }
}

/// Build the extractor for `provider`.
pub fn extractor_for(provider: Provider, config: &ExtractorConfig) -> Box<dyn Extractor> {
    match provider {
        Provider::PayLah => Box::new(PayLahExtractor::new(config.self_account_markers.clone())),
        Provider::Fave => Box::new(FaveExtractor),
        Provider::Grab => Box::new(GrabExtractor),
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Decide which provider a message belongs to.
///
/// The sender address wins, then the directory hint supplied by the reader,
/// then the first provider whose subject predicate accepts the subject.
pub fn detect_provider(
    sender: Option<&str>,
    hint: Option<Provider>,
    subject: &str,
) -> Option<Provider> {
    sender
        .and_then(provider_for_sender)
        .or(hint)
        .or_else(|| {
            Provider::ALL
                .into_iter()
                .find(|p| accepts_subject(*p, subject))
        })
}

/// Subject gate a message must pass before its body is extracted.
pub fn accepts_subject(provider: Provider, subject: &str) -> bool {
    match provider {
        Provider::PayLah => subject == "Transaction Alerts",
        Provider::Fave => subject.starts_with("Your FavePay Receipt"),
        Provider::Grab => subject.to_lowercase().contains("e-receipt"),
    }
}

fn provider_for_sender(sender: &str) -> Option<Provider> {
    let address = sender_address(sender);
    if address == PAYLAH_SENDER {
        return Some(Provider::PayLah);
    }
    if address == FAVE_SENDER {
        return Some(Provider::Fave);
    }
    let domain = address.rsplit_once('@').map(|(_, d)| d)?;
    if domain == GRAB_DOMAIN || domain.ends_with(".grab.com") {
        return Some(Provider::Grab);
    }
    None
}

/// Lower-cased bare address of a `From` header (`Name <addr>` or `addr`).
fn sender_address(sender: &str) -> String {
    let inner = match (sender.rfind('<'), sender.rfind('>')) {
        (Some(open), Some(close)) if open < close => &sender[open + 1..close],
        _ => sender,
    };
    inner.trim().to_lowercase()
}

//! Per-message pipeline: dispatch, decode, flatten, extract, build.
//!
//! Every message is processed on its own and ends in exactly one
//! [`MessageOutcome`]. Nothing here touches cross-message state.

use std::fmt;

use chrono_tz::Tz;
use ledger_core::error::{ExtractionRejected, LedgerError};
use ledger_core::models::{DecodedMessage, Provider, RawMessage, TransactionRecord};
use tracing::debug;

use crate::builder::RecordBuilder;
use crate::extract::{accepts_subject, detect_provider, extractor_for, Extractor, ExtractorConfig};
use crate::flatten::Document;
use crate::mime::decode_message;

// ── Inputs ────────────────────────────────────────────────────────────────────

/// A message in either of the shapes the mail collaborator hands over.
#[derive(Debug, Clone)]
pub enum MessageSource {
    Raw(RawMessage),
    Decoded(DecodedMessage),
}

/// One message queued for processing.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub source: MessageSource,
    /// Provider suggested by where the message was found.
    pub provider_hint: Option<Provider>,
}

impl InboundMessage {
    pub fn new(source: MessageSource) -> Self {
        Self {
            source,
            provider_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<Provider>) -> Self {
        self.provider_hint = hint;
        self
    }

    pub fn id(&self) -> &str {
        match &self.source {
            MessageSource::Raw(raw) => &raw.id,
            MessageSource::Decoded(decoded) => &decoded.id,
        }
    }

    pub fn subject(&self) -> &str {
        match &self.source {
            MessageSource::Raw(raw) => raw.subject(),
            MessageSource::Decoded(decoded) => &decoded.subject,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        match &self.source {
            MessageSource::Raw(raw) => raw.sender(),
            MessageSource::Decoded(decoded) => decoded.sender.as_deref(),
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// What became of one message.
#[derive(Debug)]
pub enum OutcomeKind {
    Record(TransactionRecord),
    /// Not a message the pipeline should extract.
    Skipped { reason: String },
    Rejected(ExtractionRejected),
    Failed(LedgerError),
}

#[derive(Debug)]
pub struct MessageOutcome {
    pub message_id: String,
    /// `None` when no provider could be determined.
    pub provider: Option<Provider>,
    pub kind: OutcomeKind,
}

impl MessageOutcome {
    pub fn new(message_id: impl Into<String>, provider: Option<Provider>, kind: OutcomeKind) -> Self {
        Self {
            message_id: message_id.into(),
            provider,
            kind,
        }
    }

    pub fn skipped(
        message_id: impl Into<String>,
        provider: Option<Provider>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            message_id,
            provider,
            OutcomeKind::Skipped {
                reason: reason.into(),
            },
        )
    }

    pub fn failed(message_id: impl Into<String>, provider: Option<Provider>, err: LedgerError) -> Self {
        Self::new(message_id, provider, OutcomeKind::Failed(err))
    }

    pub fn record(&self) -> Option<&TransactionRecord> {
        match &self.kind {
            OutcomeKind::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Record(record) => write!(f, "record {}", record.txn_type),
            OutcomeKind::Skipped { reason } => write!(f, "skipped: {reason}"),
            OutcomeKind::Rejected(rejected) => write!(f, "rejected: {rejected}"),
            OutcomeKind::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Shared, immutable per-run pipeline state.
pub struct Pipeline {
    tz: Tz,
    provider_filter: Option<Provider>,
    extractors: Vec<Box<dyn Extractor>>,
}

impl Pipeline {
    pub fn new(tz: Tz, provider_filter: Option<Provider>, config: &ExtractorConfig) -> Self {
        Self {
            tz,
            provider_filter,
            extractors: Provider::ALL
                .into_iter()
                .map(|p| extractor_for(p, config))
                .collect(),
        }
    }

    fn extractor(&self, provider: Provider) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.provider() == provider)
            .map(|e| &**e)
    }

    /// Run one message through every stage.
    pub fn process(&self, message: InboundMessage) -> MessageOutcome {
        let id = message.id().to_string();

        // 1. Dispatch on sender, hint and subject.
        let Some(provider) =
            detect_provider(message.sender(), message.provider_hint, message.subject())
        else {
            return MessageOutcome::skipped(id, None, "no provider matched");
        };

        if self.provider_filter.is_some_and(|wanted| wanted != provider) {
            return MessageOutcome::skipped(id, Some(provider), "provider filtered out");
        }

        if !accepts_subject(provider, message.subject()) {
            return MessageOutcome::skipped(
                id,
                Some(provider),
                format!("subject {:?} is not a {provider} receipt", message.subject()),
            );
        }

        // 2. Decode into a single body.
        let decoded = match message.source {
            MessageSource::Decoded(decoded) => decoded,
            MessageSource::Raw(raw) => match decode_message(&raw, self.tz) {
                Ok(decoded) => decoded,
                Err(err) => return MessageOutcome::failed(id, Some(provider), err),
            },
        };

        let meta = decoded.metadata();
        let Some(body) = decoded.body else {
            let err = LedgerError::MissingBody { message_id: id.clone() };
            return MessageOutcome::skipped(id, Some(provider), err.to_string());
        };

        // 3. Flatten and extract.
        let doc = Document::parse(&body);
        debug!(message_id = %id, %provider, tokens = doc.tokens().len(), "flattened body");

        let Some(extractor) = self.extractor(provider) else {
            let err = LedgerError::Config(format!("no extractor registered for {provider}"));
            return MessageOutcome::failed(id, Some(provider), err);
        };

        let raw = match extractor.extract(&doc, &meta) {
            Ok(raw) => raw,
            Err(rejected) => {
                return MessageOutcome::new(id, Some(provider), OutcomeKind::Rejected(rejected))
            }
        };

        // 4. Normalize.
        match RecordBuilder::build(raw, &meta) {
            Ok(record) => MessageOutcome::new(id, Some(provider), OutcomeKind::Record(record)),
            Err(err) => MessageOutcome::failed(id, Some(provider), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use chrono::{NaiveDate, TimeZone, Utc};
    use ledger_core::models::{Payload, TxnType};
    use std::collections::{BTreeSet, HashMap};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn pipeline() -> Pipeline {
        Pipeline::new(Tz::Asia__Singapore, None, &ExtractorConfig::default())
    }

    fn decoded(id: &str, subject: &str, sender: &str, body: Option<&str>) -> InboundMessage {
        InboundMessage::new(MessageSource::Decoded(DecodedMessage {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 7, 14).unwrap(),
            subject: subject.to_string(),
            body: body.map(str::to_string),
            sender: Some(sender.to_string()),
        }))
    }

    fn paylah_html() -> String {
        let cells = ["", "14:32 SGD", "SGD", "15.00", "", "Acct 0920-xxxx", "", "Jane Tan"];
        let tds: String = cells
            .iter()
            .map(|c| if c.is_empty() { "<td> </td>".to_string() } else { format!("<td>{c}</td>") })
            .collect();
        format!(
            "<p>Transaction Ref: 777</p><table><tbody><tr><th>Date &amp; Time:</th></tr><tr>{tds}</tr></tbody></table>"
        )
    }

    fn raw_paylah(payload: Payload) -> InboundMessage {
        let mut headers = HashMap::new();
        headers.insert("Subject".to_string(), "Transaction Alerts".to_string());
        headers.insert("From".to_string(), "paylah.alert@dbs.com".to_string());
        InboundMessage::new(MessageSource::Raw(RawMessage {
            id: "raw-1".to_string(),
            thread_id: "raw-1".to_string(),
            label_ids: BTreeSet::new(),
            timestamp: Utc.with_ymd_and_hms(2023, 7, 14, 17, 30, 0).unwrap(),
            headers,
            payload,
        }))
    }

    // ── End to end ────────────────────────────────────────────────────────────

    #[test]
    fn test_paylah_end_to_end() {
        let outcome = pipeline().process(decoded(
            "p-1",
            "Transaction Alerts",
            "paylah.alert@dbs.com",
            Some(&paylah_html()),
        ));

        assert_eq!(outcome.provider, Some(Provider::PayLah));
        let record = outcome.record().expect("record");
        assert_eq!(record.txn_type, TxnType::PayLah);
        assert_eq!(record.txn_id.as_deref(), Some("777"));
        assert_eq!(record.txn_time.as_deref(), Some("14:32"));
        assert_eq!(record.txn_amount.to_string(), "15.00");
        assert_eq!(record.txn_from, "me");
        assert_eq!(record.txn_to, "Jane Tan");
        assert_eq!(record.txn_date, NaiveDate::from_ymd_opt(2023, 7, 14).unwrap());
    }

    #[test]
    fn test_raw_message_decoded_before_extraction() {
        let payload = Payload::Multipart {
            mime_type: "multipart/mixed".to_string(),
            parts: vec![Payload::Leaf {
                mime_type: "text/html".to_string(),
                body: URL_SAFE_NO_PAD.encode(paylah_html()),
            }],
        };
        let outcome = pipeline().process(raw_paylah(payload));
        let record = outcome.record().expect("record");
        // 17:30 UTC is the next calendar day in Singapore.
        assert_eq!(record.txn_date, NaiveDate::from_ymd_opt(2023, 7, 15).unwrap());
        assert_eq!(record.message_id, "raw-1");
    }

    #[test]
    fn test_grab_missing_amount_is_flagged_record() {
        let outcome = pipeline().process(decoded(
            "g-1",
            "Your Grab E-Receipt",
            "Grab <no-reply@grab.com>",
            Some("<p>Thanks for your food order</p>"),
        ));
        let record = outcome.record().expect("record");
        assert_eq!(record.txn_type, TxnType::GrabFood);
        assert!(record.is_flagged());
        assert_eq!(record.txn_id.as_deref(), Some("g-1"));
    }

    // ── Drops ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_subject_gate_skips() {
        let outcome = pipeline().process(decoded(
            "p-2",
            "Your PayLah! statement",
            "paylah.alert@dbs.com",
            Some(&paylah_html()),
        ));
        assert!(matches!(outcome.kind, OutcomeKind::Skipped { .. }));
        assert_eq!(outcome.provider, Some(Provider::PayLah));
    }

    #[test]
    fn test_unknown_sender_skips() {
        let outcome = pipeline().process(decoded("x", "Hello", "friend@example.com", Some("hi")));
        assert!(matches!(outcome.kind, OutcomeKind::Skipped { .. }));
        assert_eq!(outcome.provider, None);
    }

    #[test]
    fn test_provider_filter_skips_others() {
        let pipeline = Pipeline::new(Tz::UTC, Some(Provider::Fave), &ExtractorConfig::default());
        let outcome = pipeline.process(decoded(
            "p-3",
            "Transaction Alerts",
            "paylah.alert@dbs.com",
            Some(&paylah_html()),
        ));
        match outcome.kind {
            OutcomeKind::Skipped { reason } => assert_eq!(reason, "provider filtered out"),
            other => panic!("expected skip, got {other}"),
        }
    }

    #[test]
    fn test_missing_body_skips() {
        let outcome = pipeline().process(decoded(
            "f-1",
            "Your FavePay Receipt",
            "hi@myfave.com",
            None,
        ));
        match outcome.kind {
            OutcomeKind::Skipped { reason } => assert!(reason.contains("no decodable body")),
            other => panic!("expected skip, got {other}"),
        }
    }

    #[test]
    fn test_fave_without_total_is_rejected() {
        let outcome = pipeline().process(decoded(
            "f-2",
            "Your FavePay Receipt",
            "hi@myfave.com",
            Some("<p>Where</p><p>Kopi Corner</p>"),
        ));
        assert!(matches!(outcome.kind, OutcomeKind::Rejected(_)));
    }

    #[test]
    fn test_undecodable_payload_fails() {
        let payload = Payload::Leaf {
            mime_type: "application/pdf".to_string(),
            body: String::new(),
        };
        let outcome = pipeline().process(raw_paylah(payload));
        assert!(matches!(
            outcome.kind,
            OutcomeKind::Failed(LedgerError::UnsupportedMimeType(_))
        ));
    }
}

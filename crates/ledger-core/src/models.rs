use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::amount::Amount;

/// Label used for the user's own account once collapsed.
pub const SELF_ACCOUNT: &str = "me";

/// Placeholder for counterparties a template does not name.
pub const UNKNOWN: &str = "unknown";

/// Id recorded when a template carries no transaction reference.
pub const MISSING_TXN_ID: &str = "NA";

// ── Providers ─────────────────────────────────────────────────────────────────

/// The sender whose template an extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provider {
    Grab,
    PayLah,
    Fave,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::PayLah, Provider::Fave, Provider::Grab];

    /// Lower-case key used for directory names and CLI values.
    pub fn key(self) -> &'static str {
        match self {
            Provider::Grab => "grab",
            Provider::PayLah => "paylah",
            Provider::Fave => "fave",
        }
    }

    /// Inverse of [`Provider::key`], case-insensitive.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(key.trim()))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Grab => "Grab",
            Provider::PayLah => "PayLah",
            Provider::Fave => "Fave",
        };
        f.write_str(name)
    }
}

/// Transaction category carried by every canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TxnType {
    Grab,
    GrabTransport,
    GrabFood,
    PayLah,
    Fave,
}

impl TxnType {
    pub fn as_str(self) -> &'static str {
        match self {
            TxnType::Grab => "Grab",
            TxnType::GrabTransport => "GrabTransport",
            TxnType::GrabFood => "GrabFood",
            TxnType::PayLah => "PayLah",
            TxnType::Fave => "Fave",
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            TxnType::Grab | TxnType::GrabTransport | TxnType::GrabFood => Provider::Grab,
            TxnType::PayLah => Provider::PayLah,
            TxnType::Fave => Provider::Fave,
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// A node of a message's MIME payload tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A single body part; `body` is base64url text.
    Leaf { mime_type: String, body: String },
    /// A container whose children keep their wire order.
    Multipart {
        mime_type: String,
        parts: Vec<Payload>,
    },
}

impl Payload {
    pub fn mime_type(&self) -> &str {
        match self {
            Payload::Leaf { mime_type, .. } | Payload::Multipart { mime_type, .. } => mime_type,
        }
    }

    /// Number of leaves beneath (and including) this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Payload::Leaf { .. } => 1,
            Payload::Multipart { parts, .. } => parts.iter().map(Payload::leaf_count).sum(),
        }
    }
}

/// A message as handed over by the mail-retrieval collaborator, before its
/// payload is decoded.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: BTreeSet<String>,
    /// Delivery instant reported by the mail service.
    pub timestamp: DateTime<Utc>,
    /// Header name → value, keys exactly as received.
    pub headers: HashMap<String, String>,
    pub payload: Payload,
}

impl RawMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    pub fn sender(&self) -> Option<&str> {
        self.header("From")
    }
}

/// The already-decoded message shape: one text body per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub id: String,
    /// Envelope (delivery) date.
    pub date: NaiveDate,
    pub subject: String,
    /// `None` when the collaborator could not decode a body.
    pub body: Option<String>,
    pub sender: Option<String>,
}

impl DecodedMessage {
    pub fn metadata(&self) -> MessageMetadata {
        MessageMetadata::new(self.id.clone(), self.subject.clone(), self.date)
    }
}

/// Message facts an extractor may consult besides the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    pub message_id: String,
    pub subject: String,
    pub date: NaiveDate,
}

impl MessageMetadata {
    pub fn new(message_id: impl Into<String>, subject: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            message_id: message_id.into(),
            subject: subject.into(),
            date,
        }
    }
}

// ── Extraction results ────────────────────────────────────────────────────────

/// A field an extractor can capture from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    TxnId,
    TxnTime,
    Amount,
    From,
    To,
}

/// Recoverable problems that keep a record but flag it for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordWarning {
    /// No currency-marked amount was found; the amount is a sentinel zero.
    MissingAmount,
}

impl fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordWarning::MissingAmount => f.write_str("missing amount, defaulted to 0.00"),
        }
    }
}

/// Raw, provider-specific field values before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFieldMap {
    pub txn_type: TxnType,
    pub fields: BTreeMap<Field, String>,
    pub warnings: Vec<RecordWarning>,
}

impl RawFieldMap {
    pub fn new(txn_type: TxnType) -> Self {
        Self {
            txn_type,
            fields: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn warn(&mut self, warning: RecordWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// The canonical, provider-agnostic transaction record.
///
/// Serialized fields and their order are the export contract:
/// `txn_type, txn_id, txn_date, txn_time, txn_amount, txn_from, txn_to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txn_type: TxnType,
    pub txn_id: Option<String>,
    pub txn_date: NaiveDate,
    pub txn_time: Option<String>,
    pub txn_amount: Amount,
    pub txn_from: String,
    pub txn_to: String,
    /// Message the record was extracted from.
    #[serde(skip)]
    pub message_id: String,
    #[serde(skip)]
    pub warnings: Vec<RecordWarning>,
}

impl TransactionRecord {
    pub fn is_flagged(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Identity used by deduplication; `None` when the record has no id.
    pub fn identity(&self) -> Option<(TxnType, &str)> {
        self.txn_id
            .as_deref()
            .filter(|id| *id != MISSING_TXN_ID)
            .map(|id| (self.txn_type, id))
    }
}

//! Exported message discovery and loading.
//!
//! Reads the JSON files left behind by the mail export, one message per
//! file, in either the raw mail-service shape or the already-decoded shape.
//! The directory a file sits in names the provider it was exported for.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::error::{LedgerError, Result};
use ledger_core::models::{DecodedMessage, Payload, Provider, RawMessage};
use ledger_core::time_utils::{parse_calendar_date, timestamp_from_millis};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::pipeline::{InboundMessage, MessageSource};

// ── Wire shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Raw(WireRawMessage),
    Decoded(WireDecodedMessage),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRawMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(deserialize_with = "de_internal_date")]
    internal_date: DateTime<Utc>,
    payload: WirePart,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<WireHeader>,
    #[serde(default)]
    body: Option<WireBody>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct WireBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDecodedMessage {
    id: String,
    #[serde(deserialize_with = "de_calendar_date")]
    date: NaiveDate,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    sender: Option<String>,
}

fn de_internal_date<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Text(String),
        Number(i64),
    }

    let millis = match Millis::deserialize(d)? {
        Millis::Text(text) => text.trim().parse::<i64>().map_err(D::Error::custom)?,
        Millis::Number(n) => n,
    };
    timestamp_from_millis(millis)
        .ok_or_else(|| D::Error::custom(format!("internalDate out of range: {millis}")))
}

fn de_calendar_date<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveDate, D::Error> {
    let text = String::deserialize(d)?;
    parse_calendar_date(&text).ok_or_else(|| D::Error::custom(format!("invalid date {text:?}")))
}

impl WirePart {
    fn into_payload(self) -> Payload {
        if self.parts.is_empty() {
            Payload::Leaf {
                mime_type: self.mime_type,
                body: self.body.and_then(|b| b.data).unwrap_or_default(),
            }
        } else {
            Payload::Multipart {
                mime_type: self.mime_type,
                parts: self.parts.into_iter().map(WirePart::into_payload).collect(),
            }
        }
    }
}

impl WireMessage {
    fn into_source(self) -> MessageSource {
        match self {
            WireMessage::Raw(raw) => {
                let mut headers: HashMap<String, String> = HashMap::new();
                for header in &raw.payload.headers {
                    headers
                        .entry(header.name.clone())
                        .or_insert_with(|| header.value.clone());
                }
                MessageSource::Raw(RawMessage {
                    id: raw.id,
                    thread_id: raw.thread_id,
                    label_ids: raw.label_ids.into_iter().collect::<BTreeSet<_>>(),
                    timestamp: raw.internal_date,
                    headers,
                    payload: raw.payload.into_payload(),
                })
            }
            WireMessage::Decoded(decoded) => MessageSource::Decoded(DecodedMessage {
                id: decoded.id,
                date: decoded.date,
                subject: decoded.subject,
                body: decoded.body,
                sender: decoded.sender,
            }),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` files recursively under `input_dir`, sorted by path.
pub fn find_message_files(input_dir: &Path) -> Vec<PathBuf> {
    if !input_dir.exists() {
        warn!("Input directory does not exist: {}", input_dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Provider named by the directory holding `path` (`.../paylah/x.json`).
pub fn provider_hint(path: &Path) -> Option<Provider> {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .and_then(Provider::from_key)
}

/// Parse one exported message in either shape.
pub fn parse_message(text: &str) -> Result<MessageSource> {
    let wire: WireMessage = serde_json::from_str(text)?;
    Ok(wire.into_source())
}

/// Read and parse one exported message file.
pub fn load_message_file(path: &Path) -> Result<InboundMessage> {
    let text = std::fs::read_to_string(path).map_err(|source| LedgerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let source = parse_message(&text)?;
    Ok(InboundMessage::new(source).with_hint(provider_hint(path)))
}

/// Load every message under `input_dir`.
///
/// Unreadable or malformed files are logged and skipped.
pub fn load_messages(input_dir: &Path) -> Vec<InboundMessage> {
    let files = find_message_files(input_dir);
    if files.is_empty() {
        warn!("No message files found in {}", input_dir.display());
        return Vec::new();
    }

    let mut messages = Vec::with_capacity(files.len());
    for path in &files {
        match load_message_file(path) {
            Ok(message) => messages.push(message),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    debug!(
        "Loaded {} messages from {} files",
        messages.len(),
        files.len()
    );
    messages
}

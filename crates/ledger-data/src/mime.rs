//! Recursive MIME payload decoding.
//!
//! Turns the payload tree of a [`RawMessage`] into one text body by folding
//! over its leaves in wire order.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine as _;
use chrono_tz::Tz;
use ledger_core::error::{LedgerError, Result};
use ledger_core::models::{DecodedMessage, Payload, RawMessage};
use ledger_core::time_utils::envelope_date;
use tracing::debug;

/// base64url with padding accepted but not required.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const TEXT_TYPES: [&str; 2] = ["text/html", "text/plain"];

/// Decode a payload tree into text.
///
/// Text leaves are base64url-decoded as UTF-8. Multipart children are decoded
/// in order and joined with `"\n"`. Any other leaf type is an error.
pub fn decode_payload(payload: &Payload) -> Result<String> {
    match payload {
        Payload::Leaf { mime_type, body } => {
            if !is_text_type(mime_type) {
                return Err(LedgerError::UnsupportedMimeType(mime_type.clone()));
            }
            decode_body(body)
        }
        Payload::Multipart { parts, .. } => {
            let decoded = parts
                .iter()
                .map(decode_payload)
                .collect::<Result<Vec<_>>>()?;
            Ok(decoded.join("\n"))
        }
    }
}

/// Decode a raw message into the single-body shape.
///
/// The envelope date is the delivery instant as seen in `tz`. A body that
/// decodes to whitespace only is reported as absent.
pub fn decode_message(raw: &RawMessage, tz: Tz) -> Result<DecodedMessage> {
    let text = decode_payload(&raw.payload)?;
    debug!(
        message_id = %raw.id,
        leaves = raw.payload.leaf_count(),
        bytes = text.len(),
        "decoded payload"
    );

    let body = if text.trim().is_empty() { None } else { Some(text) };

    Ok(DecodedMessage {
        id: raw.id.clone(),
        date: envelope_date(raw.timestamp, tz),
        subject: raw.subject().to_string(),
        body,
        sender: raw.sender().map(str::to_string),
    })
}

fn is_text_type(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    TEXT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(essence))
}

fn decode_body(body: &str) -> Result<String> {
    let bytes = BODY_ENGINE
        .decode(body.trim())
        .map_err(|e| LedgerError::Decode(format!("invalid base64url: {e}")))?;
    String::from_utf8(bytes).map_err(|e| LedgerError::Decode(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::{BTreeSet, HashMap};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn leaf(mime: &str, text: &str) -> Payload {
        Payload::Leaf {
            mime_type: mime.to_string(),
            body: URL_SAFE_NO_PAD.encode(text),
        }
    }

    fn multipart(parts: Vec<Payload>) -> Payload {
        Payload::Multipart {
            mime_type: "multipart/mixed".to_string(),
            parts,
        }
    }

    fn raw_message(payload: Payload) -> RawMessage {
        let mut headers = HashMap::new();
        headers.insert("Subject".to_string(), "Transaction Alerts".to_string());
        headers.insert("From".to_string(), "paylah.alert@dbs.com".to_string());
        RawMessage {
            id: "18a0f".to_string(),
            thread_id: "18a0f".to_string(),
            label_ids: BTreeSet::from(["INBOX".to_string()]),
            timestamp: Utc.with_ymd_and_hms(2023, 7, 14, 17, 30, 0).unwrap(),
            headers,
            payload,
        }
    }

    // ── decode_payload ────────────────────────────────────────────────────────

    #[test]
    fn test_decode_single_html_leaf() {
        let text = decode_payload(&leaf("text/html", "<p>Hello</p>")).unwrap();
        assert_eq!(text, "<p>Hello</p>");
    }

    #[test]
    fn test_decode_accepts_padded_and_unpadded() {
        // "ab" encodes to "YWI=" with padding.
        for body in ["YWI=", "YWI"] {
            let payload = Payload::Leaf {
                mime_type: "text/plain".to_string(),
                body: body.to_string(),
            };
            assert_eq!(decode_payload(&payload).unwrap(), "ab");
        }
    }

    #[test]
    fn test_decode_uses_url_safe_alphabet() {
        // Encodes to "w7w_Pg", which standard base64 would reject.
        let payload = Payload::Leaf {
            mime_type: "text/plain".to_string(),
            body: URL_SAFE_NO_PAD.encode("ü?>"),
        };
        assert_eq!(decode_payload(&payload).unwrap(), "ü?>");
    }

    #[test]
    fn test_decode_mime_parameters_ignored() {
        let text = decode_payload(&leaf("Text/HTML; charset=\"UTF-8\"", "hi")).unwrap();
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_decode_nested_multipart_in_document_order() {
        let tree = multipart(vec![
            leaf("text/plain", "first"),
            multipart(vec![leaf("text/html", "second"), leaf("text/plain", "third")]),
        ]);
        assert_eq!(decode_payload(&tree).unwrap(), "first\nsecond\nthird");
    }

    #[test]
    fn test_decode_unsupported_leaf_type() {
        let tree = multipart(vec![leaf("text/html", "ok"), leaf("image/png", "png")]);
        match decode_payload(&tree) {
            Err(LedgerError::UnsupportedMimeType(t)) => assert_eq!(t, "image/png"),
            other => panic!("expected UnsupportedMimeType, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_base64() {
        let payload = Payload::Leaf {
            mime_type: "text/html".to_string(),
            body: "not base64!!".to_string(),
        };
        assert!(matches!(decode_payload(&payload), Err(LedgerError::Decode(_))));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let payload = Payload::Leaf {
            mime_type: "text/html".to_string(),
            body: URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]),
        };
        match decode_payload(&payload) {
            Err(LedgerError::Decode(msg)) => assert!(msg.contains("UTF-8")),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    // ── decode_message ────────────────────────────────────────────────────────

    #[test]
    fn test_decode_message_uses_local_envelope_date() {
        let raw = raw_message(leaf("text/html", "<p>body</p>"));
        let decoded = decode_message(&raw, Tz::Asia__Singapore).unwrap();

        assert_eq!(decoded.id, "18a0f");
        assert_eq!(decoded.subject, "Transaction Alerts");
        assert_eq!(decoded.sender.as_deref(), Some("paylah.alert@dbs.com"));
        assert_eq!(decoded.body.as_deref(), Some("<p>body</p>"));
        assert_eq!(decoded.date, NaiveDate::from_ymd_opt(2023, 7, 15).unwrap());

        let utc = decode_message(&raw, Tz::UTC).unwrap();
        assert_eq!(utc.date, NaiveDate::from_ymd_opt(2023, 7, 14).unwrap());
    }

    #[test]
    fn test_decode_message_blank_body_is_absent() {
        let raw = raw_message(leaf("text/plain", "  \n "));
        let decoded = decode_message(&raw, Tz::UTC).unwrap();
        assert!(decoded.body.is_none());
    }
}

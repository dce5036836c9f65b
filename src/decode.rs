//! Provenance decode seam.
//!
//! The steganographic codec proper is external to this crate; the engine only
//! depends on the [`ProvenanceDecoder`] contract. A decoder must tolerate
//! arbitrary page text: malformed input either decodes from an embedded,
//! extractable fragment or yields `None`. An `Err` crossing the seam is
//! downgraded by the engine to "no record" plus a logged diagnostic.
//!
//! [`PayloadDecoder`] is the reference implementation used by the tests and
//! by hosts without their own codec: it locates an embedded
//! `{"origin":...,"href":...}` JSON fragment, tolerating truncated or trailing
//! characters around it.

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

/// The `{href, origin}` pair identifying the source content record behind a
/// rendered text fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProvenanceRecord {
    pub href: String,
    pub origin: String,
}

/// Extracts a provenance record from a text fragment, if one is embedded.
pub trait ProvenanceDecoder {
    /// `Ok(None)` when the fragment carries no decodable record.
    fn decode(&self, text: &str) -> Result<Option<ProvenanceRecord>>;

    /// The visible counterpart of `text` with the embedded payload stripped.
    /// `Ok(None)` when there is nothing to strip.
    fn cleaned(&self, text: &str) -> Result<Option<String>>;
}

/// Maps decoder errors to "no record", logging the diagnostic. Decode failure
/// is never surfaced past this point.
pub(crate) fn decode_or_log(
    decoder: &dyn ProvenanceDecoder,
    text: &str,
) -> Option<ProvenanceRecord> {
    match decoder.decode(text) {
        Ok(record) => record,
        Err(err) => {
            debug!(error = %err, "decoder failed, treating fragment as unencoded");
            None
        }
    }
}

/// Reference decoder for the embedded JSON payload form.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayloadDecoder;

impl ProvenanceDecoder for PayloadDecoder {
    fn decode(&self, text: &str) -> Result<Option<ProvenanceRecord>> {
        let Some((start, end)) = payload_span(text) else {
            return Ok(None);
        };
        match serde_json::from_str::<ProvenanceRecord>(&text[start..end]) {
            Ok(record) if !record.href.is_empty() => Ok(Some(record)),
            Ok(_) => Ok(None),
            Err(err) => {
                debug!(error = %err, "embedded fragment is not a provenance record");
                Ok(None)
            }
        }
    }

    fn cleaned(&self, text: &str) -> Result<Option<String>> {
        let Some((start, end)) = payload_span(text) else {
            return Ok(None);
        };
        if self.decode(text)?.is_none() {
            return Ok(None);
        }
        let mut cleaned = String::with_capacity(text.len() - (end - start));
        cleaned.push_str(&text[..start]);
        cleaned.push_str(&text[end..]);
        Ok(Some(cleaned))
    }
}

/// Byte span of the embedded `{"origin"...}` object, balanced over nested
/// braces and quoted strings so trailing page text does not confuse it.
fn payload_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find("{\"origin")?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"origin":"o","href":"https://x"}"#;

    #[test]
    fn test_decode_valid_payload() {
        let text = format!("Welcome back{PAYLOAD}");
        let record = PayloadDecoder.decode(&text).unwrap().unwrap();
        assert_eq!(record.href, "https://x");
        assert_eq!(record.origin, "o");
    }

    #[test]
    fn test_decode_plain_text_yields_none() {
        assert_eq!(PayloadDecoder.decode("just some copy").unwrap(), None);
        assert_eq!(PayloadDecoder.decode("").unwrap(), None);
    }

    #[test]
    fn test_decode_tolerates_trailing_characters() {
        let text = format!("headline{PAYLOAD}}} trailing ]{{ garbage");
        let record = PayloadDecoder.decode(&text).unwrap().unwrap();
        assert_eq!(record.origin, "o");
    }

    #[test]
    fn test_decode_rejects_record_without_href() {
        let text = r#"{"origin":"o","href":""}"#;
        assert_eq!(PayloadDecoder.decode(text).unwrap(), None);
    }

    #[test]
    fn test_decode_handles_escaped_quotes_in_payload() {
        let text = r#"x{"origin":"say \"hi\"","href":"https://x"}y"#;
        let record = PayloadDecoder.decode(text).unwrap().unwrap();
        assert_eq!(record.origin, "say \"hi\"");
    }

    #[test]
    fn test_cleaned_strips_payload_only() {
        let text = format!("Welcome {PAYLOAD}back");
        let cleaned = PayloadDecoder.cleaned(&text).unwrap();
        assert_eq!(cleaned.as_deref(), Some("Welcome back"));
    }

    #[test]
    fn test_cleaned_none_for_plain_text() {
        assert_eq!(PayloadDecoder.cleaned("plain").unwrap(), None);
    }

    struct FailingDecoder;

    impl ProvenanceDecoder for FailingDecoder {
        fn decode(&self, _text: &str) -> Result<Option<ProvenanceRecord>> {
            anyhow::bail!("codec exploded")
        }

        fn cleaned(&self, _text: &str) -> Result<Option<String>> {
            anyhow::bail!("codec exploded")
        }
    }

    #[test]
    fn test_decode_or_log_absorbs_errors() {
        assert_eq!(decode_or_log(&FailingDecoder, "anything"), None);
    }
}

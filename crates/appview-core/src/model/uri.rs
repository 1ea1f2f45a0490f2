use serde::{Deserialize, Serialize};

use crate::errors::RecordError;

const SCHEME: &str = "at://";

/// Immutable record key: `at://<authority>/<collection>/<rkey>`
///
/// The key is the conflict target of every upsert and never changes for the
/// lifetime of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordUri(String);

impl RecordUri {
    /// Parse and validate a record key
    pub fn parse(value: impl Into<String>) -> Result<Self, RecordError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(RecordError::EmptyUri);
        }

        let rest = value
            .strip_prefix(SCHEME)
            .ok_or_else(|| RecordError::MalformedUri { uri: value.clone() })?;
        let segments: Vec<&str> = rest.split('/').collect();
        let well_formed = segments.len() == 3
            && segments.iter().all(|s| !s.is_empty())
            && !value.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(RecordError::MalformedUri { uri: value });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Repository DID or handle that owns the record
    pub fn authority(&self) -> &str {
        self.segment(0)
    }

    /// Lexicon collection, e.g. `pub.chive.preprint.submission`
    pub fn collection(&self) -> &str {
        self.segment(1)
    }

    pub fn rkey(&self) -> &str {
        self.segment(2)
    }

    fn segment(&self, index: usize) -> &str {
        self.0[SCHEME.len()..].split('/').nth(index).unwrap_or_default()
    }
}

impl TryFrom<String> for RecordUri {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RecordUri> for String {
    fn from(uri: RecordUri) -> Self {
        uri.0
    }
}

impl std::fmt::Display for RecordUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_segments() {
        let uri = RecordUri::parse("at://did:plc:abc/pub.chive.preprint.submission/3k2a").unwrap();
        assert_eq!(uri.authority(), "did:plc:abc");
        assert_eq!(uri.collection(), "pub.chive.preprint.submission");
        assert_eq!(uri.rkey(), "3k2a");
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert_eq!(RecordUri::parse("  "), Err(RecordError::EmptyUri));
        assert!(matches!(
            RecordUri::parse("https://example.com/a/b"),
            Err(RecordError::MalformedUri { .. })
        ));
        assert!(matches!(
            RecordUri::parse("at://did:plc:abc/collection"),
            Err(RecordError::MalformedUri { .. })
        ));
        assert!(matches!(
            RecordUri::parse("at://did:plc:abc//rkey"),
            Err(RecordError::MalformedUri { .. })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<RecordUri, _> = serde_json::from_str("\"at://did:plc:x/c/r\"");
        assert!(ok.is_ok());
        let bad: Result<RecordUri, _> = serde_json::from_str("\"not-a-uri\"");
        assert!(bad.is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provenance::Provenance;
use super::uri::RecordUri;
use crate::errors::RecordError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMotivation {
    #[default]
    Comment,
    Endorsement,
    Question,
    Correction,
}

impl ReviewMotivation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewMotivation::Comment => "comment",
            ReviewMotivation::Endorsement => "endorsement",
            ReviewMotivation::Question => "question",
            ReviewMotivation::Correction => "correction",
        }
    }

    pub fn parse(value: &str) -> Result<Self, RecordError> {
        match value {
            "comment" => Ok(ReviewMotivation::Comment),
            "endorsement" => Ok(ReviewMotivation::Endorsement),
            "question" => Ok(ReviewMotivation::Question),
            "correction" => Ok(ReviewMotivation::Correction),
            other => Err(RecordError::UnknownVariant {
                field: "motivation",
                value: other.to_string(),
            }),
        }
    }
}

/// An indexed review or threaded comment on a preprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub uri: RecordUri,
    pub cid: String,
    /// The preprint being reviewed
    pub subject_uri: RecordUri,
    pub reviewer_did: String,
    pub body: String,
    #[serde(default)]
    pub motivation: ReviewMotivation,
    /// Review this one replies to, if threaded
    #[serde(default)]
    pub parent_uri: Option<RecordUri>,
    #[serde(default)]
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn new(
        uri: RecordUri,
        cid: impl Into<String>,
        subject_uri: RecordUri,
        reviewer_did: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uri,
            cid: cid.into(),
            subject_uri,
            reviewer_did: reviewer_did.into(),
            body: body.into(),
            motivation: ReviewMotivation::default(),
            parent_uri: None,
            provenance: Provenance::default(),
            created_at,
            indexed_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        let uri = || self.uri.to_string();

        if self.cid.trim().is_empty() {
            return Err(RecordError::MissingCid { uri: uri() });
        }
        if !self.reviewer_did.starts_with("did:") {
            return Err(RecordError::InvalidField {
                uri: uri(),
                field: "reviewer_did",
                reason: "must be a DID".to_string(),
            });
        }
        if self.body.trim().is_empty() {
            return Err(RecordError::MissingField {
                uri: uri(),
                field: "body",
            });
        }
        if self.parent_uri.as_ref() == Some(&self.uri) {
            return Err(RecordError::InvalidField {
                uri: uri(),
                field: "parent_uri",
                reason: "a review cannot reply to itself".to_string(),
            });
        }
        Ok(())
    }
}

/// Sparse update of a review's mutable columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPatch {
    pub body: Option<String>,
    pub motivation: Option<ReviewMotivation>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self, uri: &RecordUri) -> Result<(), RecordError> {
        match &self.body {
            Some(body) if body.trim().is_empty() => Err(RecordError::MissingField {
                uri: uri.to_string(),
                field: "body",
            }),
            _ => Ok(()),
        }
    }
}

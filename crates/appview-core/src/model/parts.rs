//! Structured sub-objects of indexed records
//!
//! Each of these persists as a single serialized column; only the
//! repository layer ever sees that text form.

use serde::{Deserialize, Serialize};

use crate::errors::RecordError;

/// A contributor to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    /// Repository DID when the author has an account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<String>,
    #[serde(default)]
    pub is_corresponding: bool,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            did: None,
            orcid: None,
            affiliations: Vec::new(),
            is_corresponding: false,
        }
    }
}

/// Reference to a blob held in the origin repository
///
/// Flattened into three columns on write, rebuilt on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    pub cid: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// SPDX identifier, e.g. `CC-BY-4.0`
    pub spdx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSource {
    pub funder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub award_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funder_ror: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    Cites,
    IsVersionOf,
    IsSupplementTo,
    IsReplyTo,
    References,
}

/// A link to another work (DOI, arXiv id, another record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedWork {
    pub identifier: String,
    pub relation: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementaryMaterial {
    pub label: String,
    pub blob: BlobRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Publication lifecycle of a preprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    #[default]
    Preprint,
    UnderReview,
    Accepted,
    Published,
    Retracted,
}

impl PublicationStatus {
    /// Column representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Preprint => "preprint",
            PublicationStatus::UnderReview => "under_review",
            PublicationStatus::Accepted => "accepted",
            PublicationStatus::Published => "published",
            PublicationStatus::Retracted => "retracted",
        }
    }

    pub fn parse(value: &str) -> Result<Self, RecordError> {
        match value {
            "preprint" => Ok(PublicationStatus::Preprint),
            "under_review" => Ok(PublicationStatus::UnderReview),
            "accepted" => Ok(PublicationStatus::Accepted),
            "published" => Ok(PublicationStatus::Published),
            "retracted" => Ok(PublicationStatus::Retracted),
            other => Err(RecordError::UnknownVariant {
                field: "publication_status",
                value: other.to_string(),
            }),
        }
    }
}

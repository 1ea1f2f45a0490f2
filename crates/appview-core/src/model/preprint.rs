use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parts::{
    Author, BlobRef, FundingSource, License, PublicationStatus, RelatedWork,
    SupplementaryMaterial,
};
use super::provenance::Provenance;
use super::uri::RecordUri;
use crate::errors::RecordError;

/// An indexed preprint
///
/// The authoritative copy lives in the submitter's repository. This struct
/// is the index's view of it: everything needed to answer queries without a
/// round-trip to the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preprint {
    pub uri: RecordUri,

    /// Content fingerprint; changes whenever upstream content changes
    pub cid: String,

    /// DID of the account that submitted the record
    pub submitted_by: String,

    #[serde(default)]
    pub authors: Vec<Author>,

    pub title: String,

    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Main document (usually a PDF) in the origin repository
    #[serde(default)]
    pub document: Option<BlobRef>,

    #[serde(default)]
    pub doi: Option<String>,

    #[serde(default)]
    pub publication_status: PublicationStatus,

    #[serde(default)]
    pub license: Option<License>,

    #[serde(default)]
    pub funding: Vec<FundingSource>,

    #[serde(default)]
    pub related_works: Vec<RelatedWork>,

    #[serde(default)]
    pub supplementary: Vec<SupplementaryMaterial>,

    #[serde(default)]
    pub provenance: Provenance,

    /// Creation time as recorded upstream; replays must pass the original
    pub created_at: DateTime<Utc>,

    /// Set by the store on every successful write; ignored on input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl Preprint {
    /// Create a preprint with only the required fields set
    pub fn new(
        uri: RecordUri,
        cid: impl Into<String>,
        submitted_by: impl Into<String>,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uri,
            cid: cid.into(),
            submitted_by: submitted_by.into(),
            authors: Vec::new(),
            title: title.into(),
            abstract_text: None,
            keywords: Vec::new(),
            document: None,
            doi: None,
            publication_status: PublicationStatus::default(),
            license: None,
            funding: Vec::new(),
            related_works: Vec::new(),
            supplementary: Vec::new(),
            provenance: Provenance::default(),
            created_at,
            indexed_at: None,
        }
    }

    /// Check the record before it is written
    pub fn validate(&self) -> Result<(), RecordError> {
        let uri = || self.uri.to_string();

        if self.cid.trim().is_empty() {
            return Err(RecordError::MissingCid { uri: uri() });
        }
        if !self.submitted_by.starts_with("did:") {
            return Err(RecordError::InvalidField {
                uri: uri(),
                field: "submitted_by",
                reason: "must be a DID".to_string(),
            });
        }
        if self.title.trim().is_empty() {
            return Err(RecordError::MissingField {
                uri: uri(),
                field: "title",
            });
        }
        if let Some(author) = self.authors.iter().find(|a| a.name.trim().is_empty()) {
            return Err(RecordError::InvalidField {
                uri: uri(),
                field: "authors",
                reason: format!("author without a name (did: {:?})", author.did),
            });
        }
        Ok(())
    }
}

/// Sparse update of a preprint's mutable columns
///
/// `None` leaves a column untouched. For nullable columns the inner `Option`
/// distinguishes "set to NULL" from "leave alone".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprintPatch {
    pub title: Option<String>,
    pub abstract_text: Option<Option<String>>,
    pub keywords: Option<Vec<String>>,
    pub doi: Option<Option<String>>,
    pub publication_status: Option<PublicationStatus>,
    pub license: Option<Option<License>>,
}

impl PreprintPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self, uri: &RecordUri) -> Result<(), RecordError> {
        match &self.title {
            Some(title) if title.trim().is_empty() => Err(RecordError::MissingField {
                uri: uri.to_string(),
                field: "title",
            }),
            _ => Ok(()),
        }
    }
}

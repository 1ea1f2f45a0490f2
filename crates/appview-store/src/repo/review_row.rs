//! `reviews` table mapping

use crate::db::{Row, SqlValue};
use crate::errors::{decode_error, Result};
use crate::repo::entity::{from_millis, opt_from_millis, to_millis, uri_from_column, IndexedEntity};
use appview_core::errors::ExError;
use appview_core::model::{Provenance, RecordUri, Review, ReviewMotivation, ReviewPatch};

const TABLE: &str = "reviews";

impl IndexedEntity for Review {
    const KIND: &'static str = "review";
    const TABLE: &'static str = TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "uri",
        "cid",
        "subject_uri",
        "reviewer_did",
        "body",
        "motivation",
        "parent_uri",
        "origin_url",
        "last_synced_at",
        "created_at",
        "indexed_at",
    ];
    const UPDATABLE_COLUMNS: &'static [&'static str] =
        &["body", "motivation", "origin_url", "last_synced_at"];

    type Patch = ReviewPatch;

    fn key(&self) -> &RecordUri {
        &self.uri
    }

    fn validate(&self) -> Result<()> {
        Ok(Review::validate(self)?)
    }

    fn to_row(&self, indexed_at: i64) -> Result<Vec<SqlValue>> {
        Ok(vec![
            SqlValue::from(self.uri.as_str()),
            SqlValue::from(self.cid.as_str()),
            SqlValue::from(self.subject_uri.as_str()),
            SqlValue::from(self.reviewer_did.as_str()),
            SqlValue::from(self.body.as_str()),
            SqlValue::from(self.motivation.as_str()),
            SqlValue::from(self.parent_uri.as_ref().map(RecordUri::as_str)),
            SqlValue::from(self.provenance.origin_url.clone()),
            SqlValue::from(self.provenance.last_synced_at.as_ref().map(to_millis)),
            SqlValue::Integer(to_millis(&self.created_at)),
            SqlValue::Integer(indexed_at),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        let motivation = ReviewMotivation::parse(&row.text("motivation")?)
            .map_err(|e| decode_error(TABLE, "motivation", e))?;
        let parent_uri = row
            .opt_text("parent_uri")?
            .map(|text| uri_from_column(TABLE, "parent_uri", text))
            .transpose()?;

        Ok(Review {
            uri: uri_from_column(TABLE, "uri", row.text("uri")?)?,
            cid: row.text("cid")?,
            subject_uri: uri_from_column(TABLE, "subject_uri", row.text("subject_uri")?)?,
            reviewer_did: row.text("reviewer_did")?,
            body: row.text("body")?,
            motivation,
            parent_uri,
            provenance: Provenance {
                origin_url: row.opt_text("origin_url")?,
                last_synced_at: opt_from_millis(
                    TABLE,
                    "last_synced_at",
                    row.opt_int("last_synced_at")?,
                )?,
            },
            created_at: from_millis(TABLE, "created_at", row.int("created_at")?)?,
            indexed_at: Some(from_millis(TABLE, "indexed_at", row.int("indexed_at")?)?),
        })
    }

    fn patch_columns(
        key: &RecordUri,
        patch: &ReviewPatch,
    ) -> Result<Vec<(&'static str, SqlValue)>> {
        if patch.is_empty() {
            return Err(ExError::invalid_input("update", "patch sets no columns")
                .with_entity_id(key.as_str()));
        }
        patch.validate(key)?;

        let mut columns = Vec::new();
        if let Some(body) = &patch.body {
            columns.push(("body", SqlValue::from(body.as_str())));
        }
        if let Some(motivation) = &patch.motivation {
            columns.push(("motivation", SqlValue::from(motivation.as_str())));
        }
        Ok(columns)
    }
}

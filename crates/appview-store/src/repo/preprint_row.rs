//! `preprints` table mapping
//!
//! The document blob reference is flattened into three columns; authors,
//! keywords, license and the optional lists are stored as JSON text.

use crate::db::{Row, SqlValue};
use crate::errors::{decode_error, encode_error, Result};
use crate::repo::entity::{
    from_json, from_millis, list_from_json, opt_from_millis, to_json, to_json_or_null, to_millis,
    uri_from_column, IndexedEntity,
};
use appview_core::errors::ExError;
use appview_core::model::{
    BlobRef, License, Preprint, PreprintPatch, Provenance, PublicationStatus, RecordUri,
};

const TABLE: &str = "preprints";

impl IndexedEntity for Preprint {
    const KIND: &'static str = "preprint";
    const TABLE: &'static str = TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "uri",
        "cid",
        "submitted_by",
        "authors",
        "title",
        "abstract",
        "keywords",
        "document_cid",
        "document_mime_type",
        "document_size",
        "doi",
        "publication_status",
        "license",
        "funding",
        "related_works",
        "supplementary",
        "origin_url",
        "last_synced_at",
        "created_at",
        "indexed_at",
    ];
    const UPDATABLE_COLUMNS: &'static [&'static str] = &[
        "title",
        "abstract",
        "doi",
        "publication_status",
        "origin_url",
        "last_synced_at",
    ];

    type Patch = PreprintPatch;

    fn key(&self) -> &RecordUri {
        &self.uri
    }

    fn validate(&self) -> Result<()> {
        Ok(Preprint::validate(self)?)
    }

    fn to_row(&self, indexed_at: i64) -> Result<Vec<SqlValue>> {
        let (document_cid, document_mime_type, document_size) = match &self.document {
            Some(blob) => (
                SqlValue::from(blob.cid.as_str()),
                SqlValue::from(blob.mime_type.as_str()),
                SqlValue::Integer(
                    i64::try_from(blob.size).map_err(|e| encode_error("document_size", e))?,
                ),
            ),
            None => (SqlValue::Null, SqlValue::Null, SqlValue::Null),
        };

        let license = match &self.license {
            Some(license) => to_json("license", license)?,
            None => SqlValue::Null,
        };

        Ok(vec![
            SqlValue::from(self.uri.as_str()),
            SqlValue::from(self.cid.as_str()),
            SqlValue::from(self.submitted_by.as_str()),
            to_json("authors", &self.authors)?,
            SqlValue::from(self.title.as_str()),
            SqlValue::from(self.abstract_text.clone()),
            to_json("keywords", &self.keywords)?,
            document_cid,
            document_mime_type,
            document_size,
            SqlValue::from(self.doi.clone()),
            SqlValue::from(self.publication_status.as_str()),
            license,
            to_json_or_null("funding", &self.funding)?,
            to_json_or_null("related_works", &self.related_works)?,
            to_json_or_null("supplementary", &self.supplementary)?,
            SqlValue::from(self.provenance.origin_url.clone()),
            SqlValue::from(self.provenance.last_synced_at.as_ref().map(to_millis)),
            SqlValue::Integer(to_millis(&self.created_at)),
            SqlValue::Integer(indexed_at),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        let document = match (
            row.opt_text("document_cid")?,
            row.opt_text("document_mime_type")?,
            row.opt_int("document_size")?,
        ) {
            (Some(cid), Some(mime_type), Some(size)) => Some(BlobRef {
                cid,
                mime_type,
                size: u64::try_from(size)
                    .map_err(|e| decode_error(TABLE, "document_size", e))?,
            }),
            _ => None,
        };

        let license: Option<License> = match row.opt_text("license")? {
            Some(text) => Some(from_json(TABLE, "license", &text)?),
            None => None,
        };

        let status = row.text("publication_status")?;
        let publication_status = PublicationStatus::parse(&status)
            .map_err(|e| decode_error(TABLE, "publication_status", e))?;

        Ok(Preprint {
            uri: uri_from_column(TABLE, "uri", row.text("uri")?)?,
            cid: row.text("cid")?,
            submitted_by: row.text("submitted_by")?,
            authors: from_json(TABLE, "authors", &row.text("authors")?)?,
            title: row.text("title")?,
            abstract_text: row.opt_text("abstract")?,
            keywords: from_json(TABLE, "keywords", &row.text("keywords")?)?,
            document,
            doi: row.opt_text("doi")?,
            publication_status,
            license,
            funding: list_from_json(TABLE, "funding", row.opt_text("funding")?)?,
            related_works: list_from_json(
                TABLE,
                "related_works",
                row.opt_text("related_works")?,
            )?,
            supplementary: list_from_json(
                TABLE,
                "supplementary",
                row.opt_text("supplementary")?,
            )?,
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
        patch: &PreprintPatch,
    ) -> Result<Vec<(&'static str, SqlValue)>> {
        if patch.is_empty() {
            return Err(ExError::invalid_input("update", "patch sets no columns")
                .with_entity_id(key.as_str()));
        }
        patch.validate(key)?;

        let mut columns = Vec::new();
        if let Some(title) = &patch.title {
            columns.push(("title", SqlValue::from(title.as_str())));
        }
        if let Some(abstract_text) = &patch.abstract_text {
            columns.push(("abstract", SqlValue::from(abstract_text.clone())));
        }
        if let Some(keywords) = &patch.keywords {
            columns.push(("keywords", to_json("keywords", keywords)?));
        }
        if let Some(doi) = &patch.doi {
            columns.push(("doi", SqlValue::from(doi.clone())));
        }
        if let Some(status) = &patch.publication_status {
            columns.push(("publication_status", SqlValue::from(status.as_str())));
        }
        if let Some(license) = &patch.license {
            let value = match license {
                Some(license) => to_json("license", license)?,
                None => SqlValue::Null,
            };
            columns.push(("license", value));
        }
        Ok(columns)
    }
}

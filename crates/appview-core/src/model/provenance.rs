use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a record was fetched from and when it was last synced
///
/// The origin is the personal data server holding the authoritative copy.
/// The index only points at it; it never writes back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Provenance {
    pub origin_url: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Provenance {
    pub fn new(origin_url: impl Into<String>, last_synced_at: DateTime<Utc>) -> Self {
        Self {
            origin_url: Some(origin_url.into()),
            last_synced_at: Some(last_synced_at),
        }
    }
}

// Shared fixtures for appview-store integration tests

#![allow(dead_code)]

use appview_core::config::{IndexerConfig, RetryPolicy, TransactionOptions};
use appview_core::errors::{ExError, ExErrorKind};
use appview_core::logging_facility::OpLogger;
use appview_core::model::{Preprint, RecordUri, Review};
use appview_store::db::{Connection, Connector, Dialect, Row, SqlValue};
use appview_store::{Indexer, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// A failure the scripted connection injects
#[derive(Debug, Clone)]
struct FailRule {
    prefix: String,
    needle: Option<String>,
    remaining: Option<usize>,
    kind: ExErrorKind,
}

#[derive(Debug, Default)]
struct Script {
    statements: Vec<String>,
    rules: Vec<FailRule>,
    connections: usize,
}

/// Connector whose connections record every statement and fail on demand
///
/// Statements succeed with one affected row and no result rows unless a
/// rule matches: a rule matches on statement prefix and, optionally, on a
/// text parameter containing a needle.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail statements starting with `prefix`, `times` times (forever if `None`)
    pub fn fail_on(&self, prefix: &str, kind: ExErrorKind, times: Option<usize>) {
        self.script.lock().unwrap().rules.push(FailRule {
            prefix: prefix.to_string(),
            needle: None,
            remaining: times,
            kind,
        });
    }

    /// Fail statements starting with `prefix` that bind a text parameter
    /// containing `needle`
    pub fn fail_on_param(&self, prefix: &str, needle: &str, kind: ExErrorKind) {
        self.script.lock().unwrap().rules.push(FailRule {
            prefix: prefix.to_string(),
            needle: Some(needle.to_string()),
            remaining: None,
            kind,
        });
    }

    pub fn statements(&self) -> Vec<String> {
        self.script.lock().unwrap().statements.clone()
    }

    /// Statements issued that start with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }

    pub fn connections_opened(&self) -> usize {
        self.script.lock().unwrap().connections
    }

    fn run(&self, sql: &str, params: &[SqlValue]) -> Result<()> {
        let mut script = self.script.lock().unwrap();
        script.statements.push(sql.to_string());

        let hit = script.rules.iter_mut().find(|rule| {
            let prefix_matches = sql.starts_with(&rule.prefix);
            let needle_matches = match &rule.needle {
                Some(needle) => params
                    .iter()
                    .any(|p| p.as_text().map_or(false, |t| t.contains(needle.as_str()))),
                None => true,
            };
            let armed = rule.remaining.map_or(true, |n| n > 0);
            prefix_matches && needle_matches && armed
        });

        match hit {
            Some(rule) => {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                Err(ExError::new(rule.kind)
                    .with_op("scripted")
                    .with_message(format!("injected failure for: {}", sql)))
            }
            None => Ok(()),
        }
    }
}

struct ScriptedConnection {
    connector: ScriptedConnector,
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.connector.run(sql, params)?;
        Ok(1)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.connector.run(sql, params)?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.script.lock().unwrap().connections += 1;
        Ok(Box::new(ScriptedConnection {
            connector: self.clone(),
        }))
    }
}

/// Retry policy with millisecond delays so retry tests stay fast
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay_ms: 1,
        multiplier: 2,
        max_delay_ms: 5,
    }
}

pub fn fast_options(max_attempts: u32) -> TransactionOptions {
    TransactionOptions::default().with_retry(fast_retry(max_attempts))
}

pub fn test_config() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.transaction = fast_options(3);
    config.batch.transaction = fast_options(3);
    config
}

pub fn scripted_indexer(connector: &ScriptedConnector) -> Indexer {
    Indexer::from_connector(
        Arc::new(connector.clone()),
        &test_config(),
        OpLogger::new("test"),
    )
    .unwrap()
}

/// Indexer over a fresh, migrated in-memory SQLite database
pub fn sqlite_indexer() -> Indexer {
    Indexer::open(&test_config(), OpLogger::new("test")).unwrap()
}

pub fn preprint_uri(rkey: &str) -> RecordUri {
    RecordUri::parse(format!(
        "at://did:plc:author/pub.chive.preprint.submission/{}",
        rkey
    ))
    .unwrap()
}

pub fn review_uri(rkey: &str) -> RecordUri {
    RecordUri::parse(format!("at://did:plc:reviewer/pub.chive.review.comment/{}", rkey)).unwrap()
}

pub fn preprint(rkey: &str, title: &str) -> Preprint {
    Preprint::new(
        preprint_uri(rkey),
        format!("bafy-{}", rkey),
        "did:plc:author",
        title,
        Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap(),
    )
}

/// `count` preprints with keys that sort in input order
pub fn preprints(count: usize) -> Vec<Preprint> {
    (0..count)
        .map(|i| preprint(&format!("{:05}", i), &format!("Preprint {}", i)))
        .collect()
}

pub fn review(rkey: &str, subject: &RecordUri, created_ms: i64) -> Review {
    Review::new(
        review_uri(rkey),
        format!("bafy-{}", rkey),
        subject.clone(),
        "did:plc:reviewer",
        format!("Review {}", rkey),
        Utc.timestamp_millis_opt(created_ms).single().unwrap(),
    )
}

// Integration tests for the record repositories on SQLite: idempotent
// upserts, point reads, sparse updates, deletes and listings

mod common;

use appview_core::errors::ExErrorKind;
use appview_core::logging_facility::{OpLogger, TestCapture};
use appview_core::model::{
    Author, BlobRef, License, Preprint, PreprintPatch, PublicationStatus, RelatedWork,
    RelationType, ReviewPatch, SupplementaryMaterial,
};
use appview_core_types::schema::{EVENT_END, EVENT_START};
use appview_store::{Indexer, SqlValue};
use chrono::{TimeZone, Utc};
use common::{
    preprint, preprint_uri, preprints, review, scripted_indexer, sqlite_indexer, test_config,
    ScriptedConnector,
};

fn full_preprint() -> Preprint {
    let mut p = preprint("full", "A complete record");
    p.authors = vec![Author {
        name: "Ada".to_string(),
        did: Some("did:plc:ada".to_string()),
        orcid: Some("0000-0002-1825-0097".to_string()),
        affiliations: vec!["Analytical Engines Ltd".to_string()],
        is_corresponding: true,
    }];
    p.abstract_text = Some("Everything is indexed.".to_string());
    p.keywords = vec!["indexing".to_string(), "caches".to_string()];
    p.document = Some(BlobRef {
        cid: "bafy-pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        size: 1_048_576,
    });
    p.doi = Some("10.1234/full".to_string());
    p.publication_status = PublicationStatus::UnderReview;
    p.license = Some(License {
        spdx_id: "CC-BY-4.0".to_string(),
        url: None,
    });
    p.related_works = vec![RelatedWork {
        identifier: "arXiv:2401.00001".to_string(),
        relation: RelationType::IsVersionOf,
        title: None,
    }];
    p.supplementary = vec![SupplementaryMaterial {
        label: "Data".to_string(),
        blob: BlobRef {
            cid: "bafy-csv".to_string(),
            mime_type: "text/csv".to_string(),
            size: 512,
        },
        description: None,
    }];
    p
}

fn without_indexed_at(mut p: Preprint) -> Preprint {
    p.indexed_at = None;
    p
}

#[tokio::test]
async fn test_round_trip_rebuilds_every_field() {
    let indexer = sqlite_indexer();
    let original = full_preprint();

    indexer.preprints().store(&original).await.unwrap();
    let stored = indexer
        .preprints()
        .find_by_uri(&original.uri)
        .await
        .unwrap()
        .unwrap();

    assert!(stored.indexed_at.is_some());
    assert_eq!(without_indexed_at(stored), original);
}

#[tokio::test]
async fn test_storing_twice_only_advances_indexed_at() {
    let indexer = sqlite_indexer();
    let p = full_preprint();

    indexer.preprints().store(&p).await.unwrap();
    let first = indexer.preprints().find_by_uri(&p.uri).await.unwrap().unwrap();
    indexer.preprints().store(&p).await.unwrap();
    let second = indexer.preprints().find_by_uri(&p.uri).await.unwrap().unwrap();

    assert!(second.indexed_at > first.indexed_at);
    assert_eq!(without_indexed_at(first), without_indexed_at(second));
    assert_eq!(indexer.preprints().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_last_write_wins_for_same_key() {
    let indexer = sqlite_indexer();
    let v1 = preprint("k", "First title");
    let mut v2 = preprint("k", "Second title");
    v2.cid = "bafy-k-v2".to_string();
    v2.keywords = vec!["revised".to_string()];

    indexer.preprints().store(&v1).await.unwrap();
    indexer.preprints().store(&v2).await.unwrap();

    assert_eq!(indexer.preprints().count().await.unwrap(), 1);
    let stored = indexer.preprints().find_by_uri(&v1.uri).await.unwrap().unwrap();
    assert_eq!(stored.title, "Second title");
    assert_eq!(stored.cid, "bafy-k-v2");
    assert_eq!(stored.keywords, vec!["revised".to_string()]);
}

#[tokio::test]
async fn test_store_replaces_instead_of_merging() {
    let indexer = sqlite_indexer();
    let full = full_preprint();
    let mut bare = preprint("full", "A complete record");
    bare.cid = full.cid.clone();

    indexer.preprints().store(&full).await.unwrap();
    indexer.preprints().store(&bare).await.unwrap();

    let stored = indexer.preprints().find_by_uri(&full.uri).await.unwrap().unwrap();
    assert_eq!(stored.doi, None);
    assert!(stored.supplementary.is_empty());
    assert_eq!(stored.document, None);
}

#[tokio::test]
async fn test_missing_key_is_none() {
    let indexer = sqlite_indexer();
    let found = indexer
        .preprints()
        .find_by_uri(&preprint_uri("nope"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_invalid_record_never_reaches_database() {
    let indexer = sqlite_indexer();
    let mut p = preprint("bad", "title");
    p.title = String::new();

    let err = indexer.preprints().store(&p).await.unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert_eq!(err.entity_id(), Some(p.uri.as_str()));
    assert_eq!(indexer.preprints().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sparse_update_touches_only_patched_columns() {
    let indexer = sqlite_indexer();
    let p = full_preprint();
    indexer.preprints().store(&p).await.unwrap();
    let before = indexer.preprints().find_by_uri(&p.uri).await.unwrap().unwrap();

    let patch = PreprintPatch {
        title: Some("Retitled".to_string()),
        doi: Some(None),
        ..PreprintPatch::default()
    };
    indexer.preprints().update(&p.uri, &patch).await.unwrap();

    let after = indexer.preprints().find_by_uri(&p.uri).await.unwrap().unwrap();
    assert_eq!(after.title, "Retitled");
    assert_eq!(after.doi, None);
    assert_eq!(after.keywords, before.keywords);
    assert_eq!(after.license, before.license);
    assert!(after.indexed_at > before.indexed_at);
}

#[tokio::test]
async fn test_update_of_missing_key_is_not_found() {
    let indexer = sqlite_indexer();
    let patch = PreprintPatch {
        title: Some("x".to_string()),
        ..PreprintPatch::default()
    };

    let err = indexer
        .preprints()
        .update(&preprint_uri("ghost"), &patch)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);

    let err = indexer
        .preprints()
        .update(&preprint_uri("ghost"), &PreprintPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_delete_removes_row_once() {
    let indexer = sqlite_indexer();
    let p = preprint("gone", "Soon deleted");
    indexer.preprints().store(&p).await.unwrap();

    indexer.preprints().delete(&p.uri).await.unwrap();
    assert!(indexer.preprints().find_by_uri(&p.uri).await.unwrap().is_none());

    let err = indexer.preprints().delete(&p.uri).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_uris_pages_in_key_order() {
    let indexer = sqlite_indexer();
    let items = preprints(5);
    for p in &items {
        indexer.preprints().store(p).await.unwrap();
    }

    let first = indexer.preprints().list_uris(None, 2).await.unwrap();
    assert_eq!(first.uris, vec![items[0].uri.clone(), items[1].uri.clone()]);
    assert_eq!(first.next_cursor.as_deref(), Some("2"));

    let second = indexer
        .preprints()
        .list_uris(first.next_cursor.as_deref(), 2)
        .await
        .unwrap();
    assert_eq!(second.uris, vec![items[2].uri.clone(), items[3].uri.clone()]);

    let last = indexer
        .preprints()
        .list_uris(second.next_cursor.as_deref(), 2)
        .await
        .unwrap();
    assert_eq!(last.uris, vec![items[4].uri.clone()]);
    assert_eq!(last.next_cursor, None);
}

#[tokio::test]
async fn test_list_uris_limits_and_cursor_validation() {
    let indexer = sqlite_indexer();
    for p in &preprints(3) {
        indexer.preprints().store(p).await.unwrap();
    }

    let clamped = indexer.preprints().list_uris(None, 0).await.unwrap();
    assert_eq!(clamped.uris.len(), 1);

    let everything = indexer.preprints().list_uris(None, 50_000).await.unwrap();
    assert_eq!(everything.uris.len(), 3);
    assert_eq!(everything.next_cursor, None);

    let err = indexer
        .preprints()
        .list_uris(Some("page-two"), 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_provenance_and_stale_lookup() {
    let indexer = sqlite_indexer();
    let never = preprint("never", "Never synced");
    let old = preprint("old", "Synced long ago");
    let fresh = preprint("fresh", "Synced recently");
    let at = |ms: i64| Utc.timestamp_millis_opt(ms).single().unwrap();

    indexer.preprints().store(&never).await.unwrap();
    indexer
        .preprints()
        .store_with_provenance(&old, "https://pds.example.com", at(1_000))
        .await
        .unwrap();
    indexer
        .preprints()
        .store_with_provenance(&fresh, "https://pds.example.com", at(5_000))
        .await
        .unwrap();

    let stored = indexer.preprints().find_by_uri(&old.uri).await.unwrap().unwrap();
    assert_eq!(
        stored.provenance.origin_url.as_deref(),
        Some("https://pds.example.com")
    );
    assert_eq!(stored.provenance.last_synced_at, Some(at(1_000)));

    let stale = indexer.preprints().find_stale(at(3_000), 10).await.unwrap();
    assert_eq!(stale, vec![never.uri.clone(), old.uri.clone()]);
}

const BLOCK_ORIGIN_TRIGGER: &str = "CREATE TRIGGER block_origin \
     BEFORE UPDATE OF origin_url ON preprints \
     WHEN NEW.origin_url LIKE '%blocked%' \
     BEGIN SELECT RAISE(ABORT, 'blocked origin'); END";

#[tokio::test]
async fn test_failed_provenance_update_discards_the_upsert() {
    let indexer = sqlite_indexer();
    indexer
        .transactions()
        .with_connection(|s| async move { s.execute(BLOCK_ORIGIN_TRIGGER, &[]).await })
        .await
        .unwrap();
    let synced = Utc.timestamp_millis_opt(2_000).single().unwrap();

    let fresh = preprint("fresh", "Never stored");
    let err = indexer
        .preprints()
        .store_with_provenance(&fresh, "https://blocked.example.com", synced)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
    assert_eq!(err.entity_id(), Some(fresh.uri.as_str()));
    assert!(indexer.preprints().find_by_uri(&fresh.uri).await.unwrap().is_none());

    let existing = preprint("existing", "First version");
    indexer.preprints().store(&existing).await.unwrap();
    let mut revised = existing.clone();
    revised.title = "Second version".to_string();

    indexer
        .preprints()
        .store_with_provenance(&revised, "https://blocked.example.com", synced)
        .await
        .unwrap_err();

    let stored = indexer
        .preprints()
        .find_by_uri(&existing.uri)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "First version");
    assert_eq!(stored.provenance.origin_url, None);
    assert_eq!(stored.provenance.last_synced_at, None);
}

#[tokio::test]
async fn test_provenance_failure_rolls_back_instead_of_committing() {
    let connector = ScriptedConnector::new();
    connector.fail_on("UPDATE preprints SET origin_url", ExErrorKind::Persistence, None);
    let indexer = scripted_indexer(&connector);
    let item = preprint("p1", "Title");
    let synced = Utc.timestamp_millis_opt(2_000).single().unwrap();

    let err = indexer
        .preprints()
        .store_with_provenance(&item, "https://pds.example.com", synced)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Persistence);
    let statements = connector.statements();
    assert_eq!(statements.len(), 4);
    assert_eq!(statements[0], "BEGIN DEFERRED");
    assert!(statements[1].starts_with("INSERT INTO preprints"));
    assert!(statements[2].starts_with("UPDATE preprints SET origin_url"));
    assert_eq!(statements[3], "ROLLBACK");
    assert_eq!(connector.count("COMMIT"), 0);
}

#[tokio::test]
async fn test_reviews_listed_per_subject_oldest_first() {
    let indexer = sqlite_indexer();
    let subject = preprint_uri("p1");
    let other = preprint_uri("p2");

    // Reviews may be indexed before the preprint they refer to.
    indexer.reviews().store(&review("late", &subject, 3_000)).await.unwrap();
    indexer.reviews().store(&review("early", &subject, 1_000)).await.unwrap();
    indexer.reviews().store(&review("elsewhere", &other, 2_000)).await.unwrap();

    let listed = indexer.reviews().list_for_subject(&subject).await.unwrap();
    let rkeys: Vec<&str> = listed.iter().map(|u| u.rkey()).collect();
    assert_eq!(rkeys, vec!["early", "late"]);
}

#[tokio::test]
async fn test_review_update_and_missing_review() {
    let indexer = sqlite_indexer();
    let r = review("r1", &preprint_uri("p1"), 1_000);
    indexer.reviews().store(&r).await.unwrap();

    let patch = ReviewPatch {
        body: Some("Revised opinion.".to_string()),
        ..ReviewPatch::default()
    };
    indexer.reviews().update(&r.uri, &patch).await.unwrap();
    let stored = indexer.reviews().find_by_uri(&r.uri).await.unwrap().unwrap();
    assert_eq!(stored.body, "Revised opinion.");

    indexer.reviews().delete(&r.uri).await.unwrap();
    assert_eq!(indexer.reviews().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_undecodable_row_is_an_error_not_absence() {
    let indexer = sqlite_indexer();
    let p = preprint("corrupt", "Will be damaged");
    indexer.preprints().store(&p).await.unwrap();

    indexer
        .transactions()
        .with_connection(|s| async move {
            s.execute(
                "UPDATE preprints SET authors = ?1",
                &[SqlValue::from("{not json")],
            )
            .await
        })
        .await
        .unwrap();

    let err = indexer.preprints().find_by_uri(&p.uri).await.unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Serialization);
}

#[tokio::test]
async fn test_operations_log_boundaries() {
    let capture = TestCapture::new();
    let indexer = Indexer::open(
        &test_config(),
        OpLogger::with_dispatch("indexer", capture.dispatch()),
    )
    .unwrap();

    indexer.preprints().store(&preprint("logged", "Logged")).await.unwrap();

    let events = capture.events_for_op("store");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[1].component.as_deref(), Some("repository"));
}

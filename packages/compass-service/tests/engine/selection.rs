use time::OffsetDateTime;
use uuid::Uuid;

use compass_service::Error;
use compass_storage::store::RecordStore;

use crate::harness::{RecordSpec, fixture, seed_record};

const LEAF: [&str; 3] = ["health", "exercise", "running"];

#[tokio::test]
async fn selection_counts_usage_and_pays_the_deferred_embedding() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "jog for ten minutes",
		kind: "mission",
		level: Some(2),
		vector: None,
		usage_count: 1,
		label: None,
	});
	let outcome = f.service.select_record(record_id).await.unwrap();

	assert_eq!(outcome.usage_count, 2);
	assert!(outcome.embedded);
	assert!(outcome.degradation.is_none());

	let stored = f.records.snapshot().into_iter().find(|r| r.record_id == record_id).unwrap();

	assert!(stored.vector.is_some());
}

#[tokio::test]
async fn an_already_embedded_record_is_not_embedded_again() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "jog for ten minutes",
		kind: "mission",
		level: Some(2),
		vector: None,
		usage_count: 1,
		label: None,
	});

	f.service.select_record(record_id).await.unwrap();
	let second = f.service.select_record(record_id).await.unwrap();

	assert_eq!(second.usage_count, 3);
	assert!(!second.embedded);
	assert_eq!(f.embedding.calls(), 1);
}

#[tokio::test]
async fn an_embedding_outage_degrades_but_the_selection_stands() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "jog for ten minutes",
		kind: "mission",
		level: Some(2),
		vector: None,
		usage_count: 1,
		label: None,
	});

	f.embedding.set_failing(true);

	let outcome = f.service.select_record(record_id).await.unwrap();

	assert_eq!(outcome.usage_count, 2);
	assert!(!outcome.embedded);
	assert!(outcome.degradation.is_some());
}

#[tokio::test]
async fn unknown_and_inactive_records_are_rejected() {
	let f = fixture();

	assert!(matches!(
		f.service.select_record(Uuid::new_v4()).await.unwrap_err(),
		Error::NotFound(_)
	));

	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "jog for ten minutes",
		kind: "mission",
		level: Some(2),
		vector: None,
		usage_count: 1,
		label: None,
	});

	f.records.deactivate(record_id, OffsetDateTime::now_utc()).await.unwrap();

	assert!(matches!(
		f.service.select_record(record_id).await.unwrap_err(),
		Error::InvalidRequest(_)
	));
}

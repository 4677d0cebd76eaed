use compass_domain::path::RecordKind;
use compass_service::canonicalize::CanonicalizeAction;

use crate::harness::{RecordSpec, fixture, seed_record, segments};

const LEAF: [&str; 3] = ["health", "exercise", "running"];

#[tokio::test]
async fn a_near_duplicate_neighbor_lends_its_label_without_generation() {
	let f = fixture();

	seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "morning run",
		kind: "mission",
		level: Some(2),
		vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
		usage_count: 3,
		label: Some("running"),
	});

	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "30-minute jog",
		kind: "mission",
		level: Some(2),
		vector: None,
		usage_count: 1,
		label: None,
	});
	let outcome = f.service.canonicalize_record(record_id).await.unwrap();

	assert_eq!(outcome.action, CanonicalizeAction::ReusedExisting);
	assert_eq!(outcome.label.as_deref(), Some("running"));
	assert_eq!(f.generator.calls(), 0);

	// Label and embedding are persisted together.
	let stored = f.records.snapshot().into_iter().find(|r| r.record_id == record_id).unwrap();

	assert_eq!(stored.label.as_deref(), Some("running"));
	assert!(stored.vector.is_some());
}

#[tokio::test]
async fn a_labeled_record_is_terminal_and_triggers_no_calls() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "morning run",
		kind: "mission",
		level: Some(2),
		vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
		usage_count: 3,
		label: Some("running"),
	});
	let first = f.service.canonicalize_record(record_id).await.unwrap();
	let second = f.service.canonicalize_record(record_id).await.unwrap();

	assert_eq!(first.action, CanonicalizeAction::AlreadyLabeled);
	assert_eq!(second.action, CanonicalizeAction::AlreadyLabeled);
	assert_eq!(first.label, second.label);
	assert_eq!(f.embedding.calls(), 0);
	assert_eq!(f.generator.calls(), 0);
}

#[tokio::test]
async fn without_a_neighbor_a_fresh_label_is_generated_and_persisted() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &["growth", "reading", "books"],
		content: "read ten pages before bed",
		kind: "mission",
		level: Some(1),
		vector: None,
		usage_count: 1,
		label: None,
	});

	f.generator.script("{\"label\": \"reading\"}");

	let outcome = f.service.canonicalize_record(record_id).await.unwrap();

	assert_eq!(outcome.action, CanonicalizeAction::Generated);
	assert_eq!(outcome.label.as_deref(), Some("reading"));

	let stored = f.records.snapshot().into_iter().find(|r| r.record_id == record_id).unwrap();

	assert_eq!(stored.label.as_deref(), Some("reading"));
	assert!(stored.vector.is_some());
}

#[tokio::test]
async fn an_embedding_outage_skips_matching_but_still_labels() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "jog in the rain",
		kind: "mission",
		level: Some(2),
		vector: None,
		usage_count: 1,
		label: None,
	});

	f.embedding.set_failing(true);
	f.generator.script("{\"label\": \"running\"}");

	let outcome = f.service.canonicalize_record(record_id).await.unwrap();

	assert_eq!(outcome.action, CanonicalizeAction::Generated);

	let stored = f.records.snapshot().into_iter().find(|r| r.record_id == record_id).unwrap();

	assert_eq!(stored.label.as_deref(), Some("running"));
	assert!(stored.vector.is_none());
}

#[tokio::test]
async fn a_contract_violating_label_defers_instead_of_inventing_one() {
	let f = fixture();
	let record_id = seed_record(&f.records, RecordSpec {
		path: &LEAF,
		content: "swim and stretch for an hour somewhere",
		kind: "mission",
		level: Some(3),
		vector: None,
		usage_count: 1,
		label: None,
	});

	f.generator.script("swimming, stretching");

	let outcome = f.service.canonicalize_record(record_id).await.unwrap();

	assert!(matches!(outcome.action, CanonicalizeAction::Deferred { .. }));
	assert_eq!(outcome.label, None);

	let stored = f.records.snapshot().into_iter().find(|r| r.record_id == record_id).unwrap();

	assert_eq!(stored.label, None);
}

#[tokio::test]
async fn repeated_raw_submissions_converge_on_one_labeled_record() {
	let f = fixture();
	let path = segments(&LEAF);

	f.generator.script("{\"label\": \"running\"}");

	let first = f
		.service
		.canonicalize_text(&path, "run along the river", RecordKind::Mission)
		.await
		.unwrap();
	let second = f
		.service
		.canonicalize_text(&path, "run along the river", RecordKind::Mission)
		.await
		.unwrap();

	assert_eq!(first.record_id, second.record_id);
	assert_eq!(second.action, CanonicalizeAction::AlreadyLabeled);
	assert_eq!(first.label, second.label);
	assert_eq!(f.generator.calls(), 1);
	assert_eq!(f.records.snapshot().len(), 1);
}

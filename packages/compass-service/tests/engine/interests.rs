use compass_service::{
	Profile, Source, recommend::InterestRequest, retrieval::RetrievalMode,
};
use compass_storage::{
	models::ScopeFilter,
	store::RecordStore,
};

use crate::harness::{RecordSpec, fixture, seed_record, segments};

fn request(selected: Vec<Vec<String>>, target_level: i32, count: u32) -> InterestRequest {
	InterestRequest {
		selected,
		target_level,
		count,
		profile: Profile::default(),
		mode: RetrievalMode::Hybrid,
	}
}

#[tokio::test]
async fn cold_start_returns_most_popular_without_any_external_call() {
	let f = fixture();

	for (idx, name) in ["reading", "cooking", "running", "chess", "painting", "gardening"]
		.iter()
		.enumerate()
	{
		seed_record(&f.records, RecordSpec {
			path: &[name],
			content: name,
			kind: "category",
			level: Some(1),
			vector: None,
			usage_count: (idx as i64 + 1) * 10,
			label: None,
		});
	}

	let result = f.service.recommend_interests(&request(Vec::new(), 1, 5)).await.unwrap();

	assert_eq!(result.candidates.len(), 5);
	assert_eq!(result.retrieved_count, 5);
	assert!(result.candidates.iter().all(|c| c.source == Source::Retrieved));
	// Highest usage first; "reading" at usage 10 is the one left out.
	assert_eq!(result.candidates[0].content, "gardening");
	assert!(result.candidates.iter().all(|c| c.content != "reading"));
	assert_eq!(f.generator.calls(), 0);
	assert_eq!(f.embedding.calls(), 0);
}

#[tokio::test]
async fn empty_catalog_falls_back_to_one_generation_call_for_the_full_count() {
	let f = fixture();

	f.generator.script(
		"{\"items\": [{\"content\": \"Telescopes\"}, {\"content\": \"Astrophotography\"}, \
		 {\"content\": \"Star maps\"}, {\"content\": \"Meteor showers\"}, \
		 {\"content\": \"Planet spotting\"}]}",
	);

	let result = f
		.service
		.recommend_interests(&request(vec![segments(&["astronomy"])], 2, 5))
		.await
		.unwrap();

	assert_eq!(f.generator.calls(), 1);
	assert!(f.generator.prompts()[0].contains("Suggest 5 interest categories"));
	assert_eq!(result.candidates.len(), 5);
	assert_eq!(result.retrieved_count, 0);
	assert_eq!(result.generated_count, 5);
	assert!(result.candidates.iter().all(|c| c.source == Source::Generated));
	assert!(result.candidates.iter().all(|c| c.record_id.is_some()));

	// All five landed in the store without an embedding; that cost waits for selection.
	let snapshot = f.records.snapshot();

	assert_eq!(snapshot.len(), 5);
	assert!(snapshot.iter().all(|r| r.vector.is_none()));
	assert!(snapshot.iter().all(|r| r.provenance == "generated"));
	assert!(snapshot.iter().all(|r| r.path.first().map(String::as_str) == Some("astronomy")));
}

#[tokio::test]
async fn partial_retrieval_generates_only_the_shortfall_with_retrieved_texts_excluded() {
	let f = fixture();

	for name in ["yoga", "pilates", "stretching"] {
		seed_record(&f.records, RecordSpec {
			path: &[name],
			content: name,
			kind: "category",
			level: Some(1),
			vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
			usage_count: 1,
			label: None,
		});
	}

	f.generator.script("{\"items\": [{\"content\": \"Swimming\"}, {\"content\": \"Cycling\"}]}");

	let result = f
		.service
		.recommend_interests(&request(vec![segments(&["fitness"])], 1, 5))
		.await
		.unwrap();

	assert_eq!(result.retrieved_count, 3);
	assert_eq!(result.generated_count, 2);
	assert_eq!(result.candidates.len(), 5);
	assert_eq!(f.generator.calls(), 1);

	let prompt = &f.generator.prompts()[0];

	assert!(prompt.contains("Suggest 2 interest categories"));
	assert!(prompt.contains("- yoga"));
	assert!(prompt.contains("- pilates"));
	assert!(prompt.contains("- stretching"));
}

#[tokio::test]
async fn hybrid_mode_prefers_the_popular_record_at_equal_similarity() {
	let f = fixture();

	seed_record(&f.records, RecordSpec {
		path: &["niche"],
		content: "niche",
		kind: "category",
		level: Some(1),
		vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
		usage_count: 1,
		label: None,
	});
	seed_record(&f.records, RecordSpec {
		path: &["popular"],
		content: "popular",
		kind: "category",
		level: Some(1),
		vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
		usage_count: 50,
		label: None,
	});
	f.generator.script("{\"items\": []}");

	let result = f
		.service
		.recommend_interests(&request(vec![segments(&["anything"])], 1, 2))
		.await
		.unwrap();

	// Retrieval budget for a count of 2 is one slot; popularity decides the tie.
	assert_eq!(result.retrieved_count, 1);
	assert_eq!(result.candidates[0].content, "popular");
}

#[tokio::test]
async fn hybrid_mode_prefers_the_similar_record_at_equal_usage() {
	let f = fixture();

	seed_record(&f.records, RecordSpec {
		path: &["close"],
		content: "close",
		kind: "category",
		level: Some(1),
		vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
		usage_count: 5,
		label: None,
	});
	seed_record(&f.records, RecordSpec {
		path: &["farther"],
		content: "farther",
		kind: "category",
		level: Some(1),
		vector: Some(vec![0.95, 0.312, 0.0, 0.0]),
		usage_count: 5,
		label: None,
	});
	f.generator.script("{\"items\": []}");

	let result = f
		.service
		.recommend_interests(&request(vec![segments(&["anything"])], 1, 2))
		.await
		.unwrap();

	assert_eq!(result.candidates[0].content, "close");
}

#[tokio::test]
async fn lowering_the_score_floor_never_drops_a_result() {
	let f = fixture();

	seed_record(&f.records, RecordSpec {
		path: &["near"],
		content: "near",
		kind: "category",
		level: Some(1),
		vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
		usage_count: 1,
		label: None,
	});
	seed_record(&f.records, RecordSpec {
		path: &["far"],
		content: "far",
		kind: "category",
		level: Some(1),
		vector: Some(vec![0.7, 0.714, 0.0, 0.0]),
		usage_count: 1,
		label: None,
	});

	let filter = ScopeFilter::new("category").with_level(1);
	let query = [1.0, 0.0, 0.0, 0.0];
	let strict = f.records.search_similar(&query, &filter, 10, 0.95).await.unwrap();
	let relaxed = f.records.search_similar(&query, &filter, 10, 0.1).await.unwrap();

	assert_eq!(strict.len(), 1);
	assert!(relaxed.len() >= strict.len());
	for hit in &strict {
		assert!(relaxed.iter().any(|r| r.record.record_id == hit.record.record_id));
	}
}

#[tokio::test]
async fn embedding_outage_degrades_to_generation_instead_of_failing() {
	let f = fixture();

	f.embedding.set_failing(true);
	f.generator
		.script("{\"items\": [{\"content\": \"Journaling\"}, {\"content\": \"Breathing\"}]}");

	let result = f
		.service
		.recommend_interests(&request(vec![segments(&["mindfulness"])], 1, 2))
		.await
		.unwrap();

	assert_eq!(result.candidates.len(), 2);
	assert_eq!(result.retrieved_count, 0);
	assert!(!result.degradations.is_empty());
}

#[tokio::test]
async fn zero_count_is_rejected_before_any_external_call() {
	let f = fixture();
	let err = f.service.recommend_interests(&request(Vec::new(), 1, 0)).await.unwrap_err();

	assert!(matches!(err, compass_service::Error::InvalidRequest(_)));
	assert_eq!(f.embedding.calls(), 0);
	assert_eq!(f.generator.calls(), 0);
}

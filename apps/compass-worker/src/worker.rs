use std::sync::Arc;

use tokio::time as tokio_time;

use compass_domain::path::RecordKind;
use compass_service::{CompassService, canonicalize::CanonicalizeAction};
use compass_storage::store::RecordStore;

const POLL_INTERVAL_MS: u64 = 30_000;
const BATCH_SIZE: u32 = 32;

pub struct WorkerState {
	pub service: CompassService,
	pub records: Arc<dyn RecordStore>,
}

pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	tracing::info!(batch = BATCH_SIZE, "canonicalization worker started");

	loop {
		match run_once(&state).await {
			Ok(0) => {},
			Ok(labeled) => tracing::info!(labeled, "canonicalization pass complete"),
			Err(e) => tracing::error!(reason = %e, "canonicalization pass failed"),
		}

		tokio_time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
	}
}

async fn run_once(state: &WorkerState) -> color_eyre::Result<usize> {
	let pending = state.records.unlabeled(RecordKind::Mission.as_str(), BATCH_SIZE).await?;
	let mut labeled = 0;

	for record in pending {
		match state.service.canonicalize_record(record.record_id).await {
			Ok(outcome) => match outcome.action {
				CanonicalizeAction::Deferred { stage } => {
					tracing::warn!(record_id = %record.record_id, ?stage, "label deferred");
				},
				_ => labeled += 1,
			},
			// One stubborn record must not stall the rest of the batch.
			Err(e) => {
				tracing::error!(record_id = %record.record_id, reason = %e, "canonicalization failed");
			},
		}
	}

	Ok(labeled)
}

//! Batch canonicalization worker: polls for unlabeled mission records and runs each through
//! the label engine.

pub mod worker;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use compass_service::CompassService;
use compass_storage::{
	db::Db,
	store::{ExclusionStore, RecordStore},
};

#[derive(Debug, Parser)]
#[command(rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = compass_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Arc::new(Db::connect(&config.storage.postgres).await?);

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let records: Arc<dyn RecordStore> = db.clone();
	let exclusions: Arc<dyn ExclusionStore> = db;
	let service = CompassService::new(config, records.clone(), exclusions);

	worker::run_worker(worker::WorkerState { service, records }).await
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Malformed or invariant-violating request, rejected before any external call.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Not found: {0}")]
	NotFound(String),
	/// The one policy failure a recommendation call surfaces instead of degrading.
	#[error("Re-roll ceiling reached: {retries} of {ceiling} retries used today.")]
	RetryExceeded { retries: u32, ceiling: u32 },
	#[error(transparent)]
	Storage(#[from] compass_storage::Error),
}

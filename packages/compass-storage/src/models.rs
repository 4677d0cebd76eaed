use time::OffsetDateTime;
use uuid::Uuid;

/// The canonical catalog entity shared by category and mission recommendation. `(path, content)`
/// is the natural key; `vector` is absent until a user selects the record.
#[derive(Clone, Debug)]
pub struct EmbeddingRecord {
	pub record_id: Uuid,
	pub path: Vec<String>,
	pub content: String,
	pub kind: String,
	pub level: Option<i32>,
	pub vector: Option<Vec<f32>>,
	pub usage_count: i64,
	pub label: Option<String>,
	pub active: bool,
	pub provenance: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct ScoredRecord {
	pub record: EmbeddingRecord,
	pub similarity: f32,
}

#[derive(Clone, Debug)]
pub struct NewRecord {
	pub path: Vec<String>,
	pub content: String,
	pub kind: String,
	pub level: Option<i32>,
	pub vector: Option<Vec<f32>>,
	pub label: Option<String>,
	pub provenance: String,
}

#[derive(Clone, Copy, Debug)]
pub struct UpsertOutcome {
	pub record_id: Uuid,
	pub inserted: bool,
	pub usage_count: i64,
}

/// Restricts retrieval to a level/category subset. Inactive records are always excluded.
#[derive(Clone, Debug)]
pub struct ScopeFilter {
	pub kind: String,
	pub level: Option<i32>,
	/// Restricts to records whose major (first) path segment matches.
	pub major: Option<String>,
	/// Restricts to records carrying exactly this path.
	pub path: Option<Vec<String>>,
	pub labeled_only: bool,
	pub exclude: Option<Uuid>,
}
impl ScopeFilter {
	pub fn new(kind: &str) -> Self {
		Self {
			kind: kind.to_string(),
			level: None,
			major: None,
			path: None,
			labeled_only: false,
			exclude: None,
		}
	}

	pub fn with_level(mut self, level: i32) -> Self {
		self.level = Some(level);

		self
	}

	pub fn with_major(mut self, major: &str) -> Self {
		self.major = Some(major.to_string());

		self
	}

	pub fn with_path(mut self, path: &[String]) -> Self {
		self.path = Some(path.to_vec());

		self
	}

	pub fn labeled_only(mut self) -> Self {
		self.labeled_only = true;

		self
	}

	pub fn excluding(mut self, record_id: Uuid) -> Self {
		self.exclude = Some(record_id);

		self
	}
}

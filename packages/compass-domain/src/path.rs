use serde::{Deserialize, Serialize};

pub const MAIN_LEVEL: i32 = 1;
pub const MIDDLE_LEVEL: i32 = 2;
pub const SUB_LEVEL: i32 = 3;

pub const MAX_PATH_SEGMENTS: usize = 3;
pub const DIFFICULTY_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
	Category,
	Mission,
}
impl RecordKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Category => "category",
			Self::Mission => "mission",
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
	Seeded,
	User,
	Generated,
}
impl Provenance {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Seeded => "seeded",
			Self::User => "user",
			Self::Generated => "generated",
		}
	}
}

#[derive(Debug, Eq, PartialEq)]
pub enum PathError {
	Empty,
	TooDeep,
	BlankSegment,
}
impl std::fmt::Display for PathError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Empty => write!(f, "Path must contain at least one segment."),
			Self::TooDeep => write!(f, "Path must contain at most {MAX_PATH_SEGMENTS} segments."),
			Self::BlankSegment => write!(f, "Path segments must be non-empty."),
		}
	}
}
impl std::error::Error for PathError {}

pub fn validate_path(path: &[String]) -> Result<(), PathError> {
	if path.is_empty() {
		return Err(PathError::Empty);
	}
	if path.len() > MAX_PATH_SEGMENTS {
		return Err(PathError::TooDeep);
	}
	if path.iter().any(|segment| segment.trim().is_empty()) {
		return Err(PathError::BlankSegment);
	}

	Ok(())
}

/// Only fully-qualified (major > middle > sub) paths may own missions.
pub fn is_leaf(path: &[String]) -> bool {
	path.len() == MAX_PATH_SEGMENTS
}

pub fn is_valid_level(level: i32) -> bool {
	(MAIN_LEVEL..=SUB_LEVEL).contains(&level)
}

pub fn is_valid_difficulty(difficulty: i32) -> bool {
	DIFFICULTY_RANGE.contains(&difficulty)
}

/// Stable key for exclusion-cache scoping, derived from the selected path.
pub fn scope_key(path: &[String]) -> String {
	path.join("/")
}

/// Human-readable path rendering used as seed text for embedding and in prompts.
pub fn display_path(path: &[String]) -> String {
	path.join(" > ")
}

//! Generative fallback: structured prompts, a strict JSON payload contract, and fail-soft
//! parsing. A malformed response contributes zero candidates, never an error.

use serde::Deserialize;

use compass_domain::{path::display_path, text::strip_code_fences};

use crate::{CompassService, Degradation, Profile, Stage};

pub(crate) const INTEREST_SYSTEM: &str = "\
You suggest interest categories for a personal-growth service. Respond with a single JSON \
object of the form {\"items\": [{\"content\": \"...\"}]} and nothing else. Each content is one \
concise category name. Never repeat anything listed as already shown.";

pub(crate) const MISSION_SYSTEM: &str = "\
You suggest small daily missions for a personal-growth service. Respond with a single JSON \
object of the form {\"items\": [{\"content\": \"...\", \"difficulty\": 1}]} and nothing else. \
Each content is one actionable sentence; difficulty is an integer from 1 (trivial) to 5 \
(demanding). Never repeat anything listed as already shown.";

pub(crate) const LABEL_SYSTEM: &str = "\
You assign one canonical short label to a mission sentence so equivalent missions share a \
ranking bucket. Respond with a single JSON object of the form {\"label\": \"...\"} and nothing \
else. The label names exactly one activity, contains no commas, slashes, or enumerations, and \
normalizes synonyms to one preferred term.";

/// One proposed candidate from the generator.
#[derive(Debug, Deserialize)]
pub(crate) struct GeneratedItem {
	pub content: String,
	#[serde(default)]
	pub difficulty: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GeneratedPayload {
	items: Vec<GeneratedItem>,
}

#[derive(Debug, Deserialize)]
struct LabelPayload {
	label: String,
}

pub(crate) fn parse_items(raw: &str) -> Result<Vec<GeneratedItem>, serde_json::Error> {
	let payload: GeneratedPayload = serde_json::from_str(strip_code_fences(raw))?;

	Ok(payload.items)
}

pub(crate) fn parse_label(raw: &str) -> Result<String, serde_json::Error> {
	let payload: LabelPayload = serde_json::from_str(strip_code_fences(raw))?;

	Ok(payload.label)
}

fn profile_lines(profile: &Profile, out: &mut String) {
	if let Some(age) = profile.age {
		out.push_str(&format!("User age: {age}\n"));
	}
	if let Some(role) = profile.role.as_deref() {
		out.push_str(&format!("User role: {role}\n"));
	}
	if let Some(bio) = profile.bio.as_deref() {
		out.push_str(&format!("About the user: {bio}\n"));
	}
}

/// The far side reasons over text only, so exclusions are listed by literal text, not id.
fn exclusion_block(exclusions: &[String], out: &mut String) {
	if exclusions.is_empty() {
		return;
	}

	out.push_str("Already shown, do not repeat any of these:\n");

	for text in exclusions {
		out.push_str(&format!("- {text}\n"));
	}
}

pub(crate) fn interest_prompt(
	selected: &[Vec<String>],
	target_level: i32,
	count: u32,
	profile: &Profile,
	exclusions: &[String],
) -> String {
	let mut out = String::new();

	profile_lines(profile, &mut out);

	if !selected.is_empty() {
		out.push_str("Categories the user already picked:\n");

		for path in selected {
			out.push_str(&format!("- {}\n", display_path(path)));
		}
	}

	out.push_str(&format!("Suggest {count} interest categories at depth {target_level}.\n"));
	exclusion_block(exclusions, &mut out);

	out
}

pub(crate) fn mission_prompt(
	path: &[String],
	difficulties: &[i32],
	per_difficulty: u32,
	profile: &Profile,
	exclusions: &[String],
) -> String {
	let mut out = String::new();

	profile_lines(profile, &mut out);
	out.push_str(&format!("Chosen category: {}\n", display_path(path)));

	let listed =
		difficulties.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");

	if per_difficulty == 1 {
		out.push_str(&format!(
			"Suggest exactly one mission for each of these difficulties: {listed}.\n"
		));
	} else {
		out.push_str(&format!(
			"Suggest {per_difficulty} missions for each of these difficulties: {listed}.\n"
		));
	}

	exclusion_block(exclusions, &mut out);

	out
}

pub(crate) fn label_prompt(path: &[String], content: &str, max_chars: u32) -> String {
	format!(
		"Category: {}\nMission: {content}\nAssign one canonical label of at most {max_chars} \
		 characters.\n",
		display_path(path),
	)
}

impl CompassService {
	/// One generation round-trip. Call failures and contract violations both collapse to an
	/// empty list with a recorded degradation.
	pub(crate) async fn generate_items(
		&self,
		system_instruction: &str,
		prompt: &str,
	) -> (Vec<GeneratedItem>, Option<Degradation>) {
		let raw = match self.generator.generate(system_instruction, prompt).await {
			Ok(raw) => raw,
			Err(e) => {
				tracing::warn!(reason = %e, "generation call failed");

				return (
					Vec::new(),
					Some(Degradation { stage: Stage::Generation, reason: e.to_string() }),
				);
			},
		};

		match parse_items(&raw) {
			Ok(items) => (items, None),
			Err(e) => {
				tracing::warn!(reason = %e, "generation payload violated the contract");

				(Vec::new(), Some(Degradation { stage: Stage::Generation, reason: e.to_string() }))
			},
		}
	}
}

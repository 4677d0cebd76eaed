/// Canonical labels name exactly one activity: no enumeration, no joining punctuation, and a
/// hard character budget so they stay usable as ranking buckets.
pub fn normalize_label(raw: &str, max_chars: u32) -> Option<String> {
	let trimmed = raw
		.trim()
		.trim_matches(|c| matches!(c, '"' | '\'' | '`'))
		.trim_end_matches('.')
		.trim();

	if trimmed.is_empty() {
		return None;
	}
	if trimmed.chars().count() > max_chars as usize {
		return None;
	}
	if trimmed.chars().any(|c| matches!(c, ',' | '、' | '/' | '&' | '\n')) {
		return None;
	}
	if trimmed.contains(" and ") {
		return None;
	}

	Some(trimmed.to_string())
}

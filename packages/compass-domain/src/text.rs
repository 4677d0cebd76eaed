/// Case- and whitespace-insensitive identity used when merging retrieved and generated
/// candidates. "Morning Run" and "morning  run" collapse to one entry.
pub fn dedup_key(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Strips a surrounding Markdown code fence, with or without a language tag. Generative
/// services wrap JSON payloads in fences often enough that parsing must tolerate it.
pub fn strip_code_fences(text: &str) -> &str {
	let trimmed = text.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let Some(body) = rest.strip_suffix("```") else {
		return trimmed;
	};
	// The first fence line may carry a language tag such as "json".
	let body = match body.split_once('\n') {
		Some((first_line, remainder))
			if first_line.trim().chars().all(|c| c.is_ascii_alphanumeric()) =>
			remainder,
		_ => body,
	};

	body.trim()
}

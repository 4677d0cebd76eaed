/// Cosine similarity on the -1.0-1.0 scale. Mismatched dimensions or a zero-norm input score
/// as 0.0 rather than erroring; retrieval treats such vectors as unrelated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b.iter()) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Component-wise mean of several seed embeddings. Inputs are short, related phrases, so the
/// centroid is an acceptable stand-in for "interest in all of these at once."
pub fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
	let first = vectors.first()?;
	let dim = first.len();

	if vectors.iter().any(|vec| vec.len() != dim) {
		return None;
	}

	let mut out = vec![0.0_f32; dim];

	for vec in vectors {
		for (idx, value) in vec.iter().enumerate() {
			out[idx] += value;
		}
	}
	for value in &mut out {
		*value /= vectors.len() as f32;
	}

	Some(out)
}

/// Popularity-blended ranking score. Popularity is normalized against the most-used record in
/// scope so it can nudge ordering without overriding semantic relevance.
pub fn hybrid_score(
	similarity: f32,
	usage_count: i64,
	max_usage: i64,
	similarity_weight: f32,
	usage_weight: f32,
) -> f32 {
	let popularity =
		if max_usage > 0 { (usage_count.max(0) as f32) / (max_usage as f32) } else { 0.0 };

	similarity * similarity_weight + popularity * usage_weight
}

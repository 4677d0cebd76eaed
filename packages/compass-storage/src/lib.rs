pub mod db;
pub mod exclusions;
pub mod models;
pub mod records;
pub mod schema;
pub mod store;

mod error;

pub use error::Error;

use std::{future::Future, pin::Pin};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Renders a vector as the pgvector text literal, e.g. `[0.1,0.2]`.
pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets = trimmed
		.strip_prefix('[')
		.and_then(|s| s.strip_suffix(']'))
		.ok_or_else(|| Error::InvalidArgument("Vector text is not bracketed.".to_string()))?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value: f32 = part.trim().parse().map_err(|_| {
			Error::InvalidArgument("Vector text contains a non-numeric value.".to_string())
		})?;

		vec.push(value);
	}

	Ok(vec)
}

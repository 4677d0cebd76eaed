use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ChatResponse {
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
	content: String,
}

/// One chat-completion round-trip. Returns the raw assistant text; the caller owns the
/// structured-payload contract and its failure policy.
pub async fn generate(
	cfg: &compass_config::GeneratorProviderConfig,
	system_instruction: &str,
	user_prompt: &str,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": system_instruction },
			{ "role": "user", "content": user_prompt },
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let response: ChatResponse = res.error_for_status()?.json().await?;

	content_of(response)
}

fn content_of(response: ChatResponse) -> Result<String> {
	response
		.choices
		.into_iter()
		.next()
		.map(|choice| choice.message.content)
		.ok_or_else(|| eyre::eyre!("Generator response contains no choices."))
}

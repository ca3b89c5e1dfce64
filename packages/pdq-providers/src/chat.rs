use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{Client, Response};
use serde_json::Value;

/// Runs a chat completion in JSON mode and returns the assistant message
/// content verbatim.
pub async fn complete(
	cfg: &pdq_config::LlmProviderConfig,
	messages: &[Value],
	temperature: f32,
	max_tokens: u32,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature,
		"max_tokens": max_tokens,
		"response_format": { "type": "json_object" },
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion(json)
}

fn parse_completion(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Chat response is missing message content."))
}

/// Opens a streamed chat completion. Deltas are pulled one at a time with
/// [`ChatStream::next_delta`].
pub async fn stream(
	cfg: &pdq_config::LlmProviderConfig,
	messages: &[Value],
	temperature: f32,
	max_tokens: u32,
) -> Result<ChatStream> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature,
		"max_tokens": max_tokens,
		"response_format": { "type": "json_object" },
		"stream": true,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;

	Ok(ChatStream { response: res, buffer: Vec::new(), done: false })
}

/// Incremental reader over a server-sent-events completion body.
pub struct ChatStream {
	response: Response,
	buffer: Vec<u8>,
	done: bool,
}
impl ChatStream {
	/// Next content delta, or `None` once the provider signals completion or
	/// the body ends.
	pub async fn next_delta(&mut self) -> Result<Option<String>> {
		loop {
			if self.done {
				return Ok(None);
			}
			if let Some(line) = take_line(&mut self.buffer) {
				match parse_event_line(&line) {
					EventLine::Delta(delta) => return Ok(Some(delta)),
					EventLine::Done => {
						self.done = true;

						return Ok(None);
					},
					EventLine::Skip => continue,
				}
			}
			match self.response.chunk().await? {
				Some(bytes) => self.buffer.extend_from_slice(&bytes),
				None => {
					self.done = true;

					return Ok(None);
				},
			}
		}
	}
}

/// Splits the next complete line off the raw byte buffer. The body is kept as
/// bytes until a full line is present so a multi-byte character split across
/// network chunks is never decoded from half its bytes.
fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
	let newline = buffer.iter().position(|&b| b == b'\n')?;
	let line: Vec<u8> = buffer.drain(..=newline).collect();
	let line = &line[..line.len() - 1];
	let line = line.strip_suffix(b"\r").unwrap_or(line);

	Some(String::from_utf8_lossy(line).into_owned())
}

enum EventLine {
	Delta(String),
	Done,
	Skip,
}

fn parse_event_line(line: &str) -> EventLine {
	let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
		return EventLine::Skip;
	};
	let payload = payload.trim();

	if payload == "[DONE]" {
		return EventLine::Done;
	}

	let Ok(json) = serde_json::from_str::<Value>(payload) else {
		return EventLine::Skip;
	};

	match json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("delta"))
		.and_then(|delta| delta.get("content"))
		.and_then(|c| c.as_str())
	{
		Some(content) if !content.is_empty() => EventLine::Delta(content.to_string()),
		_ => EventLine::Skip,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_message_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"answer\": \"ok\"}" } }
			]
		});
		assert_eq!(parse_completion(json).expect("parse failed"), "{\"answer\": \"ok\"}");
	}

	#[test]
	fn extracts_content_delta_from_event_line() {
		let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
		match parse_event_line(line) {
			EventLine::Delta(delta) => assert_eq!(delta, "Hel"),
			_ => panic!("expected a delta"),
		}
	}

	#[test]
	fn multibyte_characters_split_across_chunks_decode_intact() {
		let event = "data: {\"choices\":[{\"delta\":{\"content\":\"état\"}}]}\n".as_bytes();
		let mut buffer = Vec::new();

		// First chunk ends mid-way through the two-byte "é".
		buffer.extend_from_slice(&event[..40]);
		assert!(take_line(&mut buffer).is_none());

		buffer.extend_from_slice(&event[40..]);

		let line = take_line(&mut buffer).expect("line incomplete");
		match parse_event_line(&line) {
			EventLine::Delta(delta) => assert_eq!(delta, "état"),
			_ => panic!("expected a delta"),
		}
	}

	#[test]
	fn take_line_strips_carriage_returns_and_keeps_the_tail() {
		let mut buffer = b"data: [DONE]\r\ntrailing".to_vec();
		assert_eq!(take_line(&mut buffer).as_deref(), Some("data: [DONE]"));
		assert_eq!(buffer, b"trailing");
		assert!(take_line(&mut buffer).is_none());
	}

	#[test]
	fn recognizes_the_done_sentinel() {
		assert!(matches!(parse_event_line("data: [DONE]"), EventLine::Done));
		assert!(matches!(parse_event_line(": keep-alive"), EventLine::Skip));
		assert!(matches!(parse_event_line("data: {\"choices\":[]}"), EventLine::Skip));
	}
}

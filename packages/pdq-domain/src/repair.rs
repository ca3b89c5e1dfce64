/// Returns the first balanced `{...}` span in `raw`, tolerating prose or
/// markdown fencing around it. Brace depth is tracked outside string
/// literals, so braces inside quoted values do not confuse the scan.
pub fn extract_json_object(raw: &str) -> Option<&str> {
	let start = raw.find('{')?;
	let bytes = raw.as_bytes();
	let mut depth = 0_usize;
	let mut in_string = false;
	let mut escaped = false;

	for (offset, byte) in bytes[start..].iter().enumerate() {
		if escaped {
			escaped = false;

			continue;
		}

		match byte {
			b'\\' if in_string => escaped = true,
			b'"' => in_string = !in_string,
			b'{' if !in_string => depth += 1,
			b'}' if !in_string => {
				depth -= 1;

				if depth == 0 {
					return Some(&raw[start..=start + offset]);
				}
			},
			_ => {},
		}
	}

	None
}

/// Incrementally extracts the value of the top-level `"answer"` field from a
/// possibly incomplete JSON document, tracking string state explicitly.
///
/// `push` returns only text not yet surfaced, so the extracted answer length
/// is monotonically non-decreasing no matter how malformed the partial input
/// gets.
#[derive(Debug, Default)]
pub struct AnswerScanner {
	buffer: String,
	emitted_chars: usize,
	current: String,
}
impl AnswerScanner {
	pub fn new() -> Self {
		Self::default()
	}

	/// The answer text extracted so far.
	pub fn current(&self) -> &str {
		&self.current
	}

	/// The raw accumulated generation output.
	pub fn raw(&self) -> &str {
		&self.buffer
	}

	pub fn push(&mut self, delta: &str) -> Option<String> {
		self.buffer.push_str(delta);

		let answer = extract_answer_field(&self.buffer);
		let answer_chars = answer.chars().count();

		if answer_chars <= self.emitted_chars {
			return None;
		}

		let new: String = answer.chars().skip(self.emitted_chars).collect();

		self.emitted_chars = answer_chars;
		self.current = answer;

		Some(new)
	}
}

/// Decodes the `"answer"` string value out of `raw`, stopping at the closing
/// quote or at the end of the (possibly truncated) buffer. A trailing
/// half-finished escape sequence is dropped rather than guessed at.
fn extract_answer_field(raw: &str) -> String {
	let Some(key) = raw.find("\"answer\"") else {
		return String::new();
	};
	let mut rest = raw[key + "\"answer\"".len()..].chars();

	loop {
		match rest.next() {
			Some(':') => break,
			Some(ch) if ch.is_whitespace() => continue,
			_ => return String::new(),
		}
	}
	loop {
		match rest.next() {
			Some('"') => break,
			Some(ch) if ch.is_whitespace() => continue,
			_ => return String::new(),
		}
	}

	let mut out = String::new();

	while let Some(ch) = rest.next() {
		match ch {
			'"' => break,
			'\\' => match rest.next() {
				Some('"') => out.push('"'),
				Some('\\') => out.push('\\'),
				Some('/') => out.push('/'),
				Some('n') => out.push('\n'),
				Some('t') => out.push('\t'),
				Some('r') => out.push('\r'),
				Some('u') => {
					let hex: String = rest.by_ref().take(4).collect();

					if hex.len() < 4 {
						break;
					}
					if let Some(decoded) =
						u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
					{
						out.push(decoded);
					}
				},
				Some(other) => out.push(other),
				// Escape split across deltas; wait for the next push.
				None => break,
			},
			other => out.push(other),
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_object_embedded_in_prose() {
		let raw = "Here you go:\n```json\n{\"answer\": \"ok\", \"citations\": []}\n```";

		assert_eq!(extract_json_object(raw), Some("{\"answer\": \"ok\", \"citations\": []}"));
	}

	#[test]
	fn ignores_braces_inside_strings() {
		let raw = "{\"answer\": \"a } b\"} trailing";

		assert_eq!(extract_json_object(raw), Some("{\"answer\": \"a } b\"}"));
	}

	#[test]
	fn returns_none_for_unbalanced_input() {
		assert_eq!(extract_json_object("{\"answer\": \"never closed"), None);
	}

	#[test]
	fn scanner_emits_monotonic_deltas() {
		let mut scanner = AnswerScanner::new();

		assert_eq!(scanner.push("{\"ans"), None);
		assert_eq!(scanner.push("wer\": \"Hel"), Some("Hel".to_string()));
		assert_eq!(scanner.push("lo"), Some("lo".to_string()));
		assert_eq!(scanner.push(" world\", \"citations\": []}"), Some(" world".to_string()));
		assert_eq!(scanner.current(), "Hello world");
	}

	#[test]
	fn scanner_survives_partial_escapes() {
		let mut scanner = AnswerScanner::new();

		scanner.push("{\"answer\": \"a\\");
		assert_eq!(scanner.current(), "a");

		let new = scanner.push("nb\"}");

		assert_eq!(new, Some("\nb".to_string()));
		assert_eq!(scanner.current(), "a\nb");
	}

	#[test]
	fn scanner_handles_arbitrary_garbage() {
		let mut scanner = AnswerScanner::new();

		assert_eq!(scanner.push("not json at all"), None);
		assert_eq!(scanner.current(), "");
	}
}

use unicode_segmentation::UnicodeSegmentation;

/// Trims `text` to at most `max_chars` characters, preferring the last
/// sentence-terminal boundary before the cutoff. The boundary is only kept
/// when it does not discard more than 30% of the allowed window; otherwise
/// the text is hard-truncated with an ellipsis marker.
pub fn trim_to_sentence_boundary(text: &str, max_chars: usize) -> String {
	let Some(cutoff) = byte_index_at_char(text, max_chars) else {
		return text.to_string();
	};
	let truncated = &text[..cutoff];
	let mut boundary = 0_usize;

	for (idx, sentence) in truncated.split_sentence_bound_indices() {
		let trimmed = sentence.trim_end();

		if trimmed.ends_with(['.', '!', '?']) {
			boundary = boundary.max(idx + trimmed.len());
		}
	}

	if boundary * 10 >= cutoff * 7 {
		text[..boundary].trim_end().to_string()
	} else {
		format!("{truncated}…")
	}
}

/// Truncates to `max_chars` characters, appending an ellipsis when anything
/// was dropped.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
	match byte_index_at_char(text, max_chars) {
		Some(cutoff) => format!("{}…", &text[..cutoff]),
		None => text.to_string(),
	}
}

/// Byte index of the `chars`-th character, or `None` when the text is short
/// enough already.
fn byte_index_at_char(text: &str, chars: usize) -> Option<usize> {
	text.char_indices().nth(chars).map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_short_text_untouched() {
		assert_eq!(trim_to_sentence_boundary("Short.", 100), "Short.");
	}

	#[test]
	fn trims_at_sentence_boundary_near_cutoff() {
		let text = "First sentence here. Second sentence follows. Third one is cut off midw";
		let trimmed = trim_to_sentence_boundary(text, 60);

		assert_eq!(trimmed, "First sentence here. Second sentence follows.");
	}

	#[test]
	fn hard_truncates_when_boundary_is_too_early() {
		let text = "Tiny. Then an extremely long run of words with no punctuation at all continuing forever";
		let trimmed = trim_to_sentence_boundary(text, 60);

		assert!(trimmed.ends_with('…'));
		assert_eq!(trimmed.chars().count(), 61);
	}

	#[test]
	fn ellipsize_counts_characters_not_bytes() {
		assert_eq!(ellipsize("ééééé", 3), "ééé…");
		assert_eq!(ellipsize("abc", 3), "abc");
	}
}

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

static LABEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		// Wall and assembly codes: W2A, A1, F10B.
		r"\b[A-Z]\d+[A-Z]?\b",
		// Hyphenated codes: R-10, A-3, SB-12.
		r"\b[A-Z]{1,2}-\d+\b",
		// STC ratings: STC 36, STC50.
		r"\bSTC ?\d+\b",
		// Fire ratings: 1H, 2HR, 45MIN.
		r"\b\d+ ?(?:H|HR|MIN)\b",
	]
	.iter()
	.map(|pattern| Regex::new(pattern).expect("label pattern is valid"))
	.collect()
});

/// Extracts construction code labels (wall types, assembly codes, R-values,
/// STC and fire ratings) for exact-match boosting against table rows.
pub fn extract_labels(text: &str) -> Vec<String> {
	if text.is_empty() {
		return Vec::new();
	}

	let upper = text.to_uppercase();
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for pattern in LABEL_PATTERNS.iter() {
		for found in pattern.find_iter(&upper) {
			let label = found.as_str().to_string();

			if seen.insert(label.clone()) {
				out.push(label);
			}
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_wall_and_assembly_codes() {
		let labels = extract_labels("wall type W2a next to assembly A-2");

		assert!(labels.contains(&"W2A".to_string()));
		assert!(labels.contains(&"A-2".to_string()));
	}

	#[test]
	fn extracts_ratings() {
		let labels = extract_labels("insulation R-10 with STC 36 and a 2hr rating");

		assert!(labels.contains(&"R-10".to_string()));
		assert!(labels.contains(&"STC 36".to_string()));
		assert!(labels.contains(&"2HR".to_string()));
	}

	#[test]
	fn dedupes_and_handles_empty_input() {
		assert!(extract_labels("").is_empty());

		let labels = extract_labels("W2a and W2A again");

		assert_eq!(labels.iter().filter(|label| *label == "W2A").count(), 1);
	}
}

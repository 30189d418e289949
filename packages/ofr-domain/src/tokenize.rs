use unicode_segmentation::UnicodeSegmentation;

/// Splits text into lowercase word tokens on Unicode word boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
	text.unicode_words().map(str::to_lowercase).collect()
}

/// Lowercase whitespace-separated terms, as typed.
pub fn whitespace_terms(text: &str) -> Vec<String> {
	text.split_whitespace().map(str::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_on_punctuation_and_lowercases() {
		assert_eq!(tokenize("MacBook Air M3 15\""), vec!["macbook", "air", "m3", "15"]);
		assert_eq!(tokenize("KALLAX Shelf + Desk Combo"), vec!["kallax", "shelf", "desk", "combo"]);
	}

	#[test]
	fn whitespace_terms_keep_punctuation() {
		assert_eq!(whitespace_terms("Bike+ Bundle"), vec!["bike+", "bundle"]);
	}
}

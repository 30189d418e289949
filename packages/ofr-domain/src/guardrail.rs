use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

pub const MIN_QUERY_CHARS: usize = 2;

static PII_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
	[
		(r"\b\d{3}-\d{2}-\d{4}\b", "[SSN_REDACTED]"),
		(r"\b\d{16}\b", "[CARD_REDACTED]"),
		(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b", "[EMAIL_REDACTED]"),
		(r"\b\d{3}[-.]\d{3}[-.]\d{4}\b", "[PHONE_REDACTED]"),
	]
	.into_iter()
	.map(|(pattern, replacement)| (Regex::new(pattern).expect("PII regex"), replacement))
	.collect()
});
static DISALLOWED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		r"(?i)hack\s+credit",
		r"(?i)steal\s+identity",
		r"(?i)fraud",
		r"(?i)launder",
		r"(?i)exploit\s+",
		r"(?i)bypass\s+approval",
	]
	.into_iter()
	.map(|pattern| Regex::new(pattern).expect("disallowed-intent regex"))
	.collect()
});
static WHITESPACE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectCode {
	DisallowedIntent,
	TooShort,
}
impl RejectCode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::DisallowedIntent => "REJECT_DISALLOWED_INTENT",
			Self::TooShort => "REJECT_TOO_SHORT",
		}
	}

	pub fn message(self) -> &'static str {
		match self {
			Self::DisallowedIntent => {
				"This query isn't supported. Try searching for a product or category."
			},
			Self::TooShort => "Please enter a longer search query.",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardOutcome {
	pub cleaned: String,
	pub rejection: Option<RejectCode>,
}

pub fn guard(raw: &str) -> GuardOutcome {
	let cleaned = sanitize(raw);

	if DISALLOWED_PATTERNS.iter().any(|re| re.is_match(&cleaned)) {
		return GuardOutcome { cleaned, rejection: Some(RejectCode::DisallowedIntent) };
	}
	if cleaned.chars().count() < MIN_QUERY_CHARS {
		return GuardOutcome { cleaned, rejection: Some(RejectCode::TooShort) };
	}

	GuardOutcome { cleaned, rejection: None }
}

/// NFKC-normalizes, redacts PII, lowercases, and collapses whitespace.
pub fn sanitize(raw: &str) -> String {
	let normalized: String = raw.trim().nfkc().collect();
	let redacted = redact_pii(&normalized).to_lowercase();

	WHITESPACE.replace_all(redacted.trim(), " ").into_owned()
}

pub fn redact_pii(text: &str) -> String {
	let mut out = text.to_string();

	for (re, replacement) in PII_PATTERNS.iter() {
		out = re.replace_all(&out, *replacement).into_owned();
	}

	out
}

use regex::Regex;
use std::sync::LazyLock;

/// Rating fragments removed from persona descriptions, most specific first
static RATING_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bhas\s+EI\s*[=:]\s*\d+/10\s+and\s+CI\s*[=:]\s*\d+/10\b\.?", ""),
        (r"(?i)\bEI\s*[=:]\s*\d+/10\s+and\s+CI\s*[=:]\s*\d+/10\b\.?", ""),
        (r"(?i)\bEI\s*[=:]\s*\d+/10\b\.?", ""),
        (r"(?i)\bCI\s*[=:]\s*\d+/10\b\.?", ""),
        (r"(?i)\bEmotional\s+Intelligence\s*[=:]\s*\d+/10\b\.?", ""),
        (r"(?i)\bCognitive\s+Intelligence\s*[=:]\s*\d+/10\b\.?", ""),
        (r"(?i)\bcharacter\s+\.", "character."),
        (r"\s+", " "),
        (r"\s*[.,]\s*[.,]+", "."),
        (r"[.,]\s*\.", "."),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("rating pattern must compile"),
            replacement,
        )
    })
    .collect()
});

static LEADING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.,]\s*").expect("leading pattern must compile"));

static TRAILING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[.,]$").expect("trailing pattern must compile"));

/// Remove EI/CI rating mentions ("EI=3/10", "CI: 5/10", "Emotional
/// Intelligence: 7/10") from a description.
///
/// Returns the input unchanged when nothing readable would remain.
pub fn strip_ratings(description: &str) -> String {
    let mut filtered = description.to_string();
    for (pattern, replacement) in RATING_PATTERNS.iter() {
        filtered = pattern.replace_all(&filtered, *replacement).into_owned();
    }

    let filtered = filtered.trim();
    let filtered = LEADING_PUNCT.replace(filtered, "");
    let filtered = TRAILING_PUNCT.replace(&filtered, "");

    if filtered.trim().is_empty() {
        return description.to_string();
    }

    filtered.into_owned()
}

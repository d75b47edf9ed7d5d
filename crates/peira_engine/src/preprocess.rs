//! Query normalization ahead of retrieval and policy lookup: lowercase,
//! strip punctuation, collapse whitespace, drop stopwords. Deterministic
//! by construction so the same query always produces the same feature.

use regex::Regex;
use std::sync::LazyLock;

static RE_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "for", "from",
    "had", "has", "have", "how", "i", "if", "in", "is", "it", "its", "me", "my", "no", "not",
    "of", "on", "or", "so", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "was", "we", "were", "what", "when", "where", "which", "who", "why", "will",
    "with", "you", "your",
];

/// Normalize a raw user query. Can return an empty string if the query
/// was nothing but stopwords and punctuation.
pub fn preprocess_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    let stripped = RE_PUNCT.replace_all(&lowered, "");
    let collapsed = RE_SPACES.replace_all(stripped.trim(), " ");

    collapsed
        .split(' ')
        .filter(|word| !word.is_empty() && !STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

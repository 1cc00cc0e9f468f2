//! Work item identifier generation
//!
//! Project identifiers must satisfy the provider's naming grammar:
//! lowercase letters, digits, and hyphens, starting with a letter, at
//! most 30 characters. Each run gets a random namespace token so that
//! identifiers never collide across runs, and a zero-padded sequence
//! number so they never collide within one.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum identifier length accepted by the provider
const MAX_ID_LEN: usize = 30;

/// Length of the per-run namespace token
const TOKEN_LEN: usize = 6;

/// Digits in the zero-padded sequence number
const SEQ_LEN: usize = 3;

/// A single unit of provisioning work: one resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem(String);

impl WorkItem {
    /// Wrap an operator-supplied identifier, sanitizing it to the
    /// provider's naming grammar.
    pub fn new(id: impl Into<String>) -> Self {
        Self(sanitize(&id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Naming scheme for one run: prefix + namespace token + sequence number.
#[derive(Debug, Clone)]
pub struct NameScheme {
    prefix: String,
    token: String,
}

impl NameScheme {
    /// Create a scheme with a fresh random namespace token.
    pub fn new(prefix: impl Into<String>) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        Self::with_token(prefix, token)
    }

    /// Create a scheme with an explicit token (used by tests and resume).
    ///
    /// The prefix is bounded so that `{prefix}-{token}-{seq}` always fits
    /// the provider's length cap with the token and sequence number
    /// intact; sanitization may otherwise truncate the sequence away and
    /// collapse every generated identifier into one.
    pub fn with_token(prefix: impl Into<String>, token: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        let max_prefix = MAX_ID_LEN - TOKEN_LEN - SEQ_LEN - 2;
        if prefix.chars().count() > max_prefix {
            // Count chars, not bytes: sanitization maps every char to
            // one ASCII byte, and byte truncation could split a char.
            prefix = prefix.chars().take(max_prefix).collect();
            while prefix.ends_with('-') {
                prefix.pop();
            }
        }

        Self {
            prefix,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Generate `count` work items, numbered from 1.
    pub fn generate(&self, count: usize) -> Vec<WorkItem> {
        (1..=count)
            .map(|seq| {
                WorkItem::new(format!(
                    "{}-{}-{:0width$}",
                    self.prefix,
                    self.token,
                    seq,
                    width = SEQ_LEN
                ))
            })
            .collect()
    }
}

/// Sanitize a raw identifier to the provider naming grammar.
fn sanitize(raw: &str) -> String {
    let mut id: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    // Must start with a letter
    if !id.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        id.insert(0, 'k');
    }

    if id.len() > MAX_ID_LEN {
        id.truncate(MAX_ID_LEN);
    }

    // No trailing hyphen after truncation
    while id.ends_with('-') {
        id.pop();
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique_within_run() {
        let scheme = NameScheme::with_token("keyflow", "ab12cd");
        let items = scheme.generate(50);

        let unique: HashSet<_> = items.iter().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(items[0].as_str(), "keyflow-ab12cd-001");
        assert_eq!(items[49].as_str(), "keyflow-ab12cd-050");
    }

    #[test]
    fn test_generated_ids_satisfy_grammar() {
        let scheme = NameScheme::new("keyflow");
        for item in scheme.generate(20) {
            let id = item.as_str();
            assert!(id.len() <= MAX_ID_LEN);
            assert!(id.chars().next().unwrap().is_ascii_lowercase());
            assert!(id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!id.ends_with('-'));
        }
    }

    #[test]
    fn test_sanitize_bad_input() {
        // '_' and '!' map to '-', then the trailing hyphen is trimmed
        assert_eq!(WorkItem::new("My_Project!").as_str(), "my-project");
    }

    #[test]
    fn test_sanitize_leading_digit_and_length() {
        let item = WorkItem::new("9starts-with-digit");
        assert!(item.as_str().starts_with('k'));

        let long = WorkItem::new("a".repeat(64));
        assert!(long.as_str().len() <= MAX_ID_LEN);
    }

    #[test]
    fn test_long_prefix_keeps_sequence_numbers() {
        // A 20-char prefix would push the sequence number past the
        // length cap; the prefix gives way, never the sequence.
        let scheme = NameScheme::with_token("a".repeat(20), "ab12cd");
        let items = scheme.generate(9);

        let unique: HashSet<_> = items.iter().collect();
        assert_eq!(unique.len(), 9);
        assert!(items[0].as_str().ends_with("-ab12cd-001"));
        assert!(items[8].as_str().ends_with("-ab12cd-009"));
        for item in &items {
            assert!(item.as_str().len() <= MAX_ID_LEN);
        }
    }

    #[test]
    fn test_random_tokens_are_lowercase_alnum() {
        let scheme = NameScheme::new("keyflow");
        assert_eq!(scheme.token().len(), TOKEN_LEN);
        assert!(scheme
            .token()
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}

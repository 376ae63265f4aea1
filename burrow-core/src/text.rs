// Tokenization and stop-word handling for page text

use crate::error::{CrawlError, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

pub const DEFAULT_STOPWORDS: &str = include_str!("../stopwords/english.txt");

/// Split text into lowercase ASCII-alphanumeric tokens. Apostrophes inside a
/// word are kept so contractions match the stop-word list.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '\''))
        .map(|word| word.trim_matches('\''))
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
        .collect()
}

pub fn word_frequencies(tokens: &[String]) -> HashMap<String, u64> {
    let mut frequencies = HashMap::new();
    for token in tokens {
        *frequencies.entry(token.clone()).or_insert(0) += 1;
    }
    frequencies
}

/// Parse a newline-delimited stop-word list. Blank lines and `#` comments
/// are ignored.
pub fn parse_stopwords(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_ascii_lowercase())
        .collect()
}

pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(path).map_err(|source| CrawlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_stopwords(&content))
}

pub fn default_stopwords() -> HashSet<String> {
    parse_stopwords(DEFAULT_STOPWORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, World! The 3 ICS-courses."),
            vec!["hello", "world", "the", "3", "ics", "courses"]
        );
    }

    #[test]
    fn test_tokenize_keeps_inner_apostrophes() {
        assert_eq!(tokenize("Don't 'quote' me"), vec!["don't", "quote", "me"]);
    }

    #[test]
    fn test_tokenize_drops_non_ascii() {
        assert_eq!(tokenize("café · naïve"), vec!["caf", "na", "ve"]);
    }

    #[test]
    fn test_word_frequencies() {
        let tokens = tokenize("a b a c a b");
        let frequencies = word_frequencies(&tokens);
        assert_eq!(frequencies.get("a"), Some(&3));
        assert_eq!(frequencies.get("b"), Some(&2));
        assert_eq!(frequencies.get("c"), Some(&1));
        assert_eq!(frequencies.len(), 3);
    }

    #[test]
    fn test_parse_stopwords() {
        let words = parse_stopwords("The\n\n  and \n# comment\nof\n");
        assert_eq!(words.len(), 3);
        assert!(words.contains("the"));
        assert!(words.contains("and"));
        assert!(words.contains("of"));
    }

    #[test]
    fn test_default_stopwords_cover_contractions() {
        let words = default_stopwords();
        assert!(words.contains("the"));
        assert!(words.contains("don't"));
    }
}

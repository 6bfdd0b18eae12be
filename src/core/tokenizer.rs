//! Whitespace tokenizer with per-token punctuation stripping
//!
//! Text arriving from speech recognition or typed input is split on runs of
//! whitespace. Each piece keeps its raw form (for display and highlighting)
//! and a sanitized form holding only ASCII letters and digits (for asset
//! resolution). Case is preserved in both.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Everything outside `[A-Za-z0-9]`
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").expect("static regex"));

/// One whitespace-delimited word of submitted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Position in the token sequence
    pub index: usize,
    /// Substring as submitted
    pub raw: String,
    /// `raw` with every non-alphanumeric character removed (may be empty)
    pub sanitized: String,
}

impl Token {
    /// True if nothing signable is left after sanitizing
    pub fn is_blank(&self) -> bool {
        self.sanitized.is_empty()
    }

    /// Number of signable characters (letter units on fallback)
    pub fn char_count(&self) -> usize {
        self.sanitized.len()
    }
}

/// Strip all characters outside `[A-Za-z0-9]`
pub fn sanitize(word: &str) -> String {
    NON_ALNUM.replace_all(word, "").into_owned()
}

/// Split text into ordered tokens.
///
/// Empty or whitespace-only input yields an empty sequence.
pub fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, raw)| Token {
            index,
            raw: raw.to_string(),
            sanitized: sanitize(raw),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_and_strips() {
        let tokens = tokenize("Hi 5!");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].raw, "Hi");
        assert_eq!(tokens[0].sanitized, "Hi");
        assert_eq!(tokens[1].raw, "5!");
        assert_eq!(tokens[1].sanitized, "5");
        assert_eq!(tokens[1].index, 1);
    }

    #[test]
    fn test_whitespace_runs() {
        let tokens = tokenize("  hello \t\n  world  ");
        let raws: Vec<_> = tokens.iter().map(|t| t.raw.as_str()).collect();
        assert_eq!(raws, vec!["hello", "world"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_punctuation_only_token_is_blank() {
        let tokens = tokenize("wait ... what?");
        assert_eq!(tokens.len(), 3);
        assert!(tokens[1].is_blank());
        assert_eq!(tokens[2].sanitized, "what");
    }

    #[test]
    fn test_case_preserved_and_unicode_dropped() {
        let tokens = tokenize("DoN't café");
        assert_eq!(tokens[0].sanitized, "DoNt");
        assert_eq!(tokens[1].sanitized, "caf");
    }

    #[test]
    fn test_alphanumeric_content_preserved() {
        let inputs = [
            "The quick, brown fox (jumps) over 13 lazy dogs!",
            "  a  b\tc\n",
            "---",
            "x1-y2 z3",
        ];
        for text in inputs {
            let joined = tokenize(text)
                .iter()
                .map(|t| t.raw.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let expected: String = text.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            assert_eq!(sanitize(&joined), expected, "input: {:?}", text);
        }
    }
}

//! Highlight view derived from scheduler position (no state of its own)

use serde::Serialize;

use super::tokenizer::Token;

/// Token plus whether it is the word currently being signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightedWord<'a> {
    pub token: &'a Token,
    pub is_highlighted: bool,
}

/// Ordered highlight view.
///
/// At most one word is highlighted: the one at `current` while `active`.
pub fn highlight(tokens: &[Token], current: usize, active: bool) -> Vec<HighlightedWord<'_>> {
    tokens
        .iter()
        .map(|token| HighlightedWord {
            token,
            is_highlighted: active && token.index == current,
        })
        .collect()
}

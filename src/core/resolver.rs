//! Asset id resolution for words and single characters
//!
//! Naming convention of the clip store: `"<Name>.clip"`, where a word is
//! capitalized (`hello` -> `Hello.clip`), a letter is upper-cased
//! (`h` -> `H.clip`) and a digit is used as is (`5` -> `5.clip`).
//! No I/O happens here.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::tokenizer::Token;

/// Clip file extension used by every asset id
pub const CLIP_EXT: &str = ".clip";

/// Fixed alphabet preloaded at startup (letters then digits)
pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Identifier of one visual clip in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    fn from_name(name: &str) -> Self {
        Self(format!("{}{}", name, CLIP_EXT))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the `.clip` extension
    pub fn name(&self) -> &str {
        self.0.strip_suffix(CLIP_EXT).unwrap_or(&self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Capitalize: first character upper-cased, remainder lower-cased
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Asset id for the whole sanitized word.
///
/// Returns None for a blank token (nothing to sign).
pub fn resolve_word(token: &Token) -> Option<AssetId> {
    if token.is_blank() {
        return None;
    }
    Some(AssetId::from_name(&capitalize(&token.sanitized)))
}

/// Asset id for one letter or digit; None for anything else.
pub fn resolve_char(c: char) -> Option<AssetId> {
    if c.is_ascii_alphabetic() {
        Some(AssetId::from_name(&c.to_ascii_uppercase().to_string()))
    } else if c.is_ascii_digit() {
        Some(AssetId::from_name(&c.to_string()))
    } else {
        None
    }
}

/// Asset ids of the full preload alphabet (A-Z, 0-9)
pub fn alphabet_ids() -> impl Iterator<Item = AssetId> {
    ALPHABET.chars().filter_map(resolve_char)
}

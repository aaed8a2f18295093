//! Pre-tokenizers: split normalized text into word-like pieces.
//!
//! Every variant exposes [`PreTokenizer::pre_tokenize`] returning pieces
//! with byte offsets into the input where they can be computed; pieces that
//! cannot be located carry the `(0, 0)` sentinel. None of the variants fail
//! on valid UTF-8, and empty input always produces an empty list.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::TokenizerConfig;
use crate::error::{Result, TokenizerError};
use crate::unicode;

/// A pre-tokenized fragment with its byte span in the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub text: String,
    /// Byte offset of the first byte, inclusive.
    pub start: usize,
    /// Byte offset past the last byte, exclusive. `start == end` means the
    /// piece is not locatable in the input.
    pub end: usize,
}

impl Piece {
    #[must_use]
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Offset pair, `(0, 0)` when unknown.
    #[must_use]
    pub fn offset(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// GPT-2 style byte-to-unicode table: printable bytes map to themselves,
/// everything else to the `U+0100`.. range so every byte has a visible,
/// unambiguous character form.
fn byte_char_tables() -> &'static ([char; 256], HashMap<char, u8>) {
    static TABLES: OnceLock<([char; 256], HashMap<char, u8>)> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut encoder = ['\0'; 256];
        let mut decoder = HashMap::with_capacity(256);
        let direct = |b: u8| {
            (b'!'..=b'~').contains(&b) || (0xA1..=0xACu8).contains(&b) || b >= 0xAE
        };
        let mut shifted = 0u32;
        for b in 0..=255u8 {
            let c = if direct(b) {
                char::from_u32(u32::from(b)).unwrap_or('\u{FFFD}')
            } else {
                let c = char::from_u32(256 + shifted).unwrap_or('\u{FFFD}');
                shifted += 1;
                c
            };
            encoder[b as usize] = c;
            decoder.insert(c, b);
        }
        (encoder, decoder)
    })
}

/// Visible character standing in for a raw byte.
#[must_use]
pub fn byte_to_char(byte: u8) -> char {
    byte_char_tables().0[byte as usize]
}

/// Inverse of [`byte_to_char`]; `None` for characters outside the table.
#[must_use]
pub fn char_to_byte(c: char) -> Option<u8> {
    byte_char_tables().1.get(&c).copied()
}

fn split_whitespace_offsets(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut run_start: Option<usize> = None;
    for (pos, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = run_start.take() {
                pieces.push(Piece::new(&text[start..pos], start, pos));
            }
        } else if run_start.is_none() {
            run_start = Some(pos);
        }
    }
    if let Some(start) = run_start {
        pieces.push(Piece::new(&text[start..], start, text.len()));
    }
    pieces
}

/// Splits normalized text into word-like pieces.
#[derive(Debug)]
pub enum PreTokenizer {
    /// Split on runs of Unicode whitespace.
    Whitespace,
    /// Apply regex patterns left to right; matches and gaps both survive.
    Patterns(Vec<Regex>),
    /// One piece per input byte, rendered through the byte table.
    ByteLevel,
    /// Word-break segmentation; URLs and e-mail addresses stay whole.
    WordBreak,
}

impl PreTokenizer {
    /// Select and compile the pre-tokenizer described by the config.
    ///
    /// # Errors
    ///
    /// [`TokenizerError::InvalidParameter`] when a configured pattern does
    /// not compile.
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        if config.byte_level {
            return Ok(Self::ByteLevel);
        }
        if config.word_break {
            return Ok(Self::WordBreak);
        }
        if config.pre_tokenizer_patterns.is_empty() {
            return Ok(Self::Whitespace);
        }
        let mut patterns = Vec::with_capacity(config.pre_tokenizer_patterns.len());
        for pattern in &config.pre_tokenizer_patterns {
            let compiled = Regex::new(pattern).map_err(|e| TokenizerError::InvalidParameter {
                param: "pre_tokenizer_patterns".to_string(),
                value: pattern.clone(),
                constraint: format!("must be a valid regex: {e}"),
            })?;
            patterns.push(compiled);
        }
        Ok(Self::Patterns(patterns))
    }

    /// Split `text` into pieces. Empty input produces an empty list.
    #[must_use]
    pub fn pre_tokenize(&self, text: &str) -> Vec<Piece> {
        if text.is_empty() {
            return Vec::new();
        }
        match self {
            Self::Whitespace => split_whitespace_offsets(text),
            Self::Patterns(patterns) => Self::apply_patterns(patterns, text),
            Self::ByteLevel => text
                .bytes()
                .enumerate()
                .map(|(i, b)| Piece::new(byte_to_char(b).to_string(), i, i + 1))
                .collect(),
            Self::WordBreak => Self::word_break(text),
        }
    }

    /// Pointwise-equivalent batched form.
    #[must_use]
    pub fn pre_tokenize_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<Piece>> {
        texts
            .iter()
            .map(|text| self.pre_tokenize(text.as_ref()))
            .collect()
    }

    fn apply_patterns(patterns: &[Regex], text: &str) -> Vec<Piece> {
        let mut fragments = vec![Piece::new(text, 0, text.len())];
        for pattern in patterns {
            let mut next = Vec::with_capacity(fragments.len());
            for fragment in &fragments {
                let base = fragment.start;
                let mut cursor = 0;
                for found in pattern.find_iter(&fragment.text) {
                    if found.start() > cursor {
                        next.push(Piece::new(
                            &fragment.text[cursor..found.start()],
                            base + cursor,
                            base + found.start(),
                        ));
                    }
                    if !found.as_str().is_empty() {
                        next.push(Piece::new(
                            found.as_str(),
                            base + found.start(),
                            base + found.end(),
                        ));
                    }
                    cursor = found.end();
                }
                if cursor < fragment.text.len() {
                    next.push(Piece::new(
                        &fragment.text[cursor..],
                        base + cursor,
                        base + fragment.text.len(),
                    ));
                }
            }
            fragments = next;
        }
        fragments.retain(|piece| !piece.text.is_empty());
        fragments
    }

    fn word_break(text: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for chunk in split_whitespace_offsets(text) {
            if unicode::is_url(&chunk.text) || unicode::is_email(&chunk.text) {
                pieces.push(chunk);
                continue;
            }
            for (word, start, end) in unicode::segment_words(&chunk.text) {
                pieces.push(Piece::new(word, chunk.start + start, chunk.start + end));
            }
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(pieces: &[Piece]) -> Vec<&str> {
        pieces.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_whitespace_split_with_offsets() {
        let pre = PreTokenizer::Whitespace;
        let input = "  hello   wörld ";
        let pieces = pre.pre_tokenize(input);
        assert_eq!(texts(&pieces), vec!["hello", "wörld"]);
        for piece in &pieces {
            assert_eq!(&input[piece.start..piece.end], piece.text);
        }
    }

    #[test]
    fn test_empty_input() {
        for pre in [
            PreTokenizer::Whitespace,
            PreTokenizer::ByteLevel,
            PreTokenizer::WordBreak,
        ] {
            assert!(pre.pre_tokenize("").is_empty());
        }
    }

    #[test]
    fn test_pattern_partition_keeps_matches_and_gaps() {
        let config = TokenizerConfig {
            pre_tokenizer_patterns: vec![r"\d+".to_string()],
            ..TokenizerConfig::default()
        };
        let pre = PreTokenizer::from_config(&config).expect("compile");
        let pieces = pre.pre_tokenize("ab12cd345");
        assert_eq!(texts(&pieces), vec!["ab", "12", "cd", "345"]);
        for piece in &pieces {
            assert_eq!(&"ab12cd345"[piece.start..piece.end], piece.text);
        }
    }

    #[test]
    fn test_patterns_apply_left_to_right() {
        let config = TokenizerConfig {
            pre_tokenizer_patterns: vec![r"\d+".to_string(), r"[a-z]+".to_string()],
            ..TokenizerConfig::default()
        };
        let pre = PreTokenizer::from_config(&config).expect("compile");
        let pieces = pre.pre_tokenize("ab12CD34ef");
        assert_eq!(texts(&pieces), vec!["ab", "12", "CD", "34", "ef"]);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = TokenizerConfig {
            pre_tokenizer_patterns: vec!["(unclosed".to_string()],
            ..TokenizerConfig::default()
        };
        let err = PreTokenizer::from_config(&config).expect_err("bad regex");
        assert!(matches!(err, TokenizerError::InvalidParameter { .. }));
    }

    #[test]
    fn test_byte_level_one_piece_per_byte() {
        let pre = PreTokenizer::ByteLevel;
        let pieces = pre.pre_tokenize("hé");
        // 'h' is one byte, 'é' is two.
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].text, "h");
        assert_eq!(pieces[0].offset(), (0, 1));
        assert_eq!(pieces[2].offset(), (2, 3));
    }

    #[test]
    fn test_byte_table_is_invertible() {
        for b in 0..=255u8 {
            let c = byte_to_char(b);
            assert_eq!(char_to_byte(c), Some(b));
        }
        assert_eq!(char_to_byte('\u{FFFD}'), None);
    }

    #[test]
    fn test_word_break_splits_punctuation() {
        let pre = PreTokenizer::WordBreak;
        let pieces = pre.pre_tokenize("Hello, world!");
        assert_eq!(texts(&pieces), vec!["Hello", ",", "world", "!"]);
    }

    #[test]
    fn test_word_break_keeps_urls_and_emails_whole() {
        let pre = PreTokenizer::WordBreak;
        let input = "mail admin@example.com or https://example.com/x";
        let pieces = pre.pre_tokenize(input);
        assert_eq!(
            texts(&pieces),
            vec!["mail", "admin@example.com", "or", "https://example.com/x"]
        );
        for piece in &pieces {
            assert_eq!(&input[piece.start..piece.end], piece.text);
        }
    }

    #[test]
    fn test_batch_is_pointwise() {
        let pre = PreTokenizer::Whitespace;
        let inputs = ["a b", "", "c"];
        let batch = pre.pre_tokenize_batch(&inputs);
        assert_eq!(batch.len(), 3);
        for (input, row) in inputs.iter().zip(&batch) {
            assert_eq!(row, &pre.pre_tokenize(input));
        }
    }
}

//! WordPiece: greedy longest-match segmentation with `##` continuation.

use crate::vocab::Vocab;

/// Default cap on word length before the whole word maps to the unknown
/// token without any search.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 100;

/// Continuation prefix carried by every subword after the first.
pub const CONTINUATION_PREFIX: &str = "##";

/// WordPiece segmentation state. The vocabulary itself is borrowed from the
/// pipeline at call time.
#[derive(Debug, Clone)]
pub struct WordPieceModel {
    unk_token: String,
    max_input_chars: usize,
}

impl WordPieceModel {
    #[must_use]
    pub fn new(unk_token: impl Into<String>) -> Self {
        Self {
            unk_token: unk_token.into(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    #[must_use]
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    #[must_use]
    pub fn unk_token(&self) -> &str {
        &self.unk_token
    }

    #[must_use]
    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    /// Segment one word: repeatedly take the longest prefix that (with the
    /// `##` prefix when not word-initial) is in the vocabulary. A word with
    /// no match, or longer than the input guard, becomes a single unknown
    /// token.
    #[must_use]
    pub fn segment(&self, word: &str, vocab: &Vocab) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > self.max_input_chars {
            return vec![self.unk_token.clone()];
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = chars.len();
            let mut matched = None;
            while start < end {
                let mut candidate: String = if start > 0 {
                    CONTINUATION_PREFIX.to_string()
                } else {
                    String::new()
                };
                candidate.extend(&chars[start..end]);
                if vocab.contains(&candidate) {
                    matched = Some(candidate);
                    break;
                }
                end -= 1;
            }
            match matched {
                Some(piece) => {
                    pieces.push(piece);
                    start = end;
                }
                None => return vec![self.unk_token.clone()],
            }
        }
        pieces
    }

    /// Inverse of segmentation: drop continuation markers and concatenate,
    /// with a space before each word-initial piece.
    #[must_use]
    pub fn join(&self, pieces: &[String]) -> String {
        let mut out = String::new();
        for piece in pieces {
            match piece.strip_prefix(CONTINUATION_PREFIX) {
                Some(rest) => out.push_str(rest),
                None => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(piece);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bert_vocab() -> Vocab {
        let mut vocab = Vocab::new();
        for token in ["[UNK]", "un", "##aff", "##able", "do", "##ing"] {
            vocab.add(token);
        }
        vocab
    }

    #[test]
    fn test_greedy_longest_match() {
        let model = WordPieceModel::new("[UNK]");
        let vocab = bert_vocab();
        assert_eq!(
            model.segment("unaffable", &vocab),
            vec!["un", "##aff", "##able"]
        );
        assert_eq!(model.segment("doing", &vocab), vec!["do", "##ing"]);
    }

    #[test]
    fn test_unmatched_word_becomes_unknown() {
        let model = WordPieceModel::new("[UNK]");
        let vocab = bert_vocab();
        assert_eq!(model.segment("xyz", &vocab), vec!["[UNK]"]);
        // A matched prefix with an unmatched tail is still one unknown.
        assert_eq!(model.segment("unxyz", &vocab), vec!["[UNK]"]);
    }

    #[test]
    fn test_long_word_guard() {
        let model = WordPieceModel::new("[UNK]").with_max_input_chars(5);
        let vocab = bert_vocab();
        assert_eq!(model.segment("unaffable", &vocab), vec!["[UNK]"]);
    }

    #[test]
    fn test_empty_word() {
        let model = WordPieceModel::new("[UNK]");
        assert!(model.segment("", &bert_vocab()).is_empty());
    }

    #[test]
    fn test_join_strips_continuations() {
        let model = WordPieceModel::new("[UNK]");
        let pieces = vec![
            "un".to_string(),
            "##aff".to_string(),
            "##able".to_string(),
            "do".to_string(),
            "##ing".to_string(),
        ];
        assert_eq!(model.join(&pieces), "unaffable doing");
    }
}

//! Segmentation models.
//!
//! The algorithm set is closed, so the pipeline holds a tagged [`Model`]
//! enum rather than a trait object. Shared concerns — vocabulary lookup,
//! normalization, post-processing — live in the pipeline; a model only
//! turns one pre-tokenized word into subword strings and knows how to
//! invert that composition when decoding.

mod bpe;
mod charlevel;
mod trie;
mod unigram;
mod wordpiece;

pub use bpe::{BpeModel, END_OF_WORD};
pub use charlevel::CharLevelModel;
pub use trie::Trie;
pub use unigram::UnigramModel;
pub use wordpiece::{WordPieceModel, CONTINUATION_PREFIX, DEFAULT_MAX_INPUT_CHARS};

use crate::config::Algorithm;
use crate::vocab::Vocab;

/// Algorithm state installed into the pipeline.
#[derive(Debug, Clone)]
pub enum Model {
    Bpe(BpeModel),
    Unigram(UnigramModel),
    WordPiece(WordPieceModel),
    CharLevel(CharLevelModel),
}

impl Model {
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Bpe(_) => Algorithm::Bpe,
            Self::Unigram(_) => Algorithm::Unigram,
            Self::WordPiece(_) => Algorithm::WordPiece,
            Self::CharLevel(_) => Algorithm::CharLevel,
        }
    }

    /// Segment one pre-tokenized word into subword strings. `vocab` is the
    /// pipeline's vocabulary, lent for the duration of the call.
    #[must_use]
    pub fn segment(&self, word: &str, vocab: &Vocab) -> Vec<String> {
        match self {
            Self::Bpe(model) => model.segment(word),
            Self::Unigram(model) => model.segment(word, vocab),
            Self::WordPiece(model) => model.segment(word, vocab),
            Self::CharLevel(model) => model.segment(word),
        }
    }

    /// Join decoded subword strings back into text; each algorithm inverts
    /// its own composition.
    #[must_use]
    pub fn join(&self, pieces: &[String]) -> String {
        match self {
            Self::Bpe(model) => model.join(pieces),
            Self::Unigram(model) => model.join(pieces),
            Self::WordPiece(model) => model.join(pieces),
            Self::CharLevel(model) => model.join(pieces),
        }
    }
}

//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use segmentar::prelude::*;
//!
//! let tokenizer = Tokenizer::new(TokenizerConfig::default()).unwrap();
//! assert!(tokenizer.vocab_size() > 0);
//! ```

pub use crate::config::{
    Algorithm, ModelFamily, NormalizationForm, TokenizerConfig, TruncationStrategy,
};
pub use crate::encoding::{BatchEncoding, Token};
pub use crate::error::{Result, TokenizerError};
pub use crate::model::{BpeModel, CharLevelModel, Model, UnigramModel, WordPieceModel};
pub use crate::pipeline::Tokenizer;
pub use crate::vocab::{SpecialTokenType, Vocab};

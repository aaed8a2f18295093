//! Segmentar: trainable subword tokenization in pure Rust.
//!
//! Segmentar converts UTF-8 text into sequences of integer token ids and
//! back, using one of four segmentation algorithms behind a single
//! pipeline:
//!
//! - BPE (byte-pair encoding) with end-to-end training
//! - Unigram language model with Viterbi best-path segmentation
//! - WordPiece greedy longest-match with `##` continuation
//! - Character-level (and, with a byte-level pre-tokenizer, byte-level)
//!
//! Encoding runs normalize → pre-tokenize → segment → post-process and
//! returns a row-aligned [`BatchEncoding`] with attention masks, token type
//! ids and offsets. Decoding inverts the active model's joining convention.
//! A trained tokenizer serializes to a single binary stream.
//!
//! # Quick Start
//!
//! ```
//! use segmentar::config::TokenizerConfig;
//! use segmentar::Tokenizer;
//!
//! let config = TokenizerConfig {
//!     vocab_size: 80,
//!     min_frequency: 1,
//!     ..TokenizerConfig::default()
//! };
//! let mut tokenizer = Tokenizer::new(config).unwrap();
//! tokenizer
//!     .train(&["the quick brown fox", "the lazy dog"])
//!     .unwrap();
//!
//! let encoding = tokenizer.encode("the quick dog").unwrap();
//! let text = tokenizer.decode(&encoding.input_ids[0], true).unwrap();
//! assert_eq!(text, "the quick dog");
//! ```
//!
//! # Modules
//!
//! - [`vocab`]: bidirectional token↔id mapping with special-token roles
//! - [`normalize`]: Unicode form, accent stripping, case folding
//! - [`pretokenize`]: whitespace/regex, byte-level and word-break splitters
//! - [`model`]: the four segmentation algorithms
//! - [`train`]: the BPE trainer
//! - [`postprocess`]: BERT-style, template and composite post-processors
//! - [`pipeline`]: the [`Tokenizer`] orchestrator

pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod postprocess;
pub mod prelude;
pub mod pretokenize;
mod serialize;
pub mod train;
pub mod unicode;
pub mod vocab;

pub use encoding::{BatchEncoding, Token};
pub use error::{Result, TokenizerError};
pub use pipeline::Tokenizer;

//! Error types for the tokenization engine.
//!
//! Every fallible operation in the crate returns [`Result`], and errors are
//! never swallowed internally: training aborts on the first error and
//! encode/decode either return a complete result or fail as a whole.

use thiserror::Error;

/// Result type alias for tokenizer operations.
pub type Result<T> = std::result::Result<T, TokenizerError>;

/// Errors surfaced by training, encoding, decoding and persistence.
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// Training was invoked with zero input lines.
    #[error("empty corpus provided for training")]
    EmptyCorpus,

    /// A parameter is outside its valid range.
    #[error("invalid parameter {param}={value}: {constraint}")]
    InvalidParameter {
        /// Parameter name.
        param: String,
        /// Offending value, rendered as text.
        value: String,
        /// What the parameter must satisfy.
        constraint: String,
    },

    /// File open/read/write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected section, length mismatch or truncated record in a model
    /// file.
    #[error("malformed model file: {0}")]
    MalformedModelFile(String),

    /// An id collision during vocabulary merge or load.
    #[error("duplicate id {id}: already assigned to {existing:?}")]
    DuplicateId {
        /// The contested id.
        id: i32,
        /// The token text that already owns the id.
        existing: String,
    },

    /// An unparseable placeholder in a template string.
    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    /// A template referenced a variable other than `message`.
    #[error("unknown template variable: {0}")]
    UnknownTemplateVariable(String),

    /// The pipeline was asked to train an algorithm without a trainer.
    #[error("no trainer implemented for algorithm {0}")]
    UnsupportedAlgorithm(String),

    /// Encode or decode was called before a model was installed.
    #[error("no model loaded: {0}")]
    ModelNotLoaded(String),

    /// Byte content that is not valid UTF-8 where UTF-8 is required.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(String),
}

//! Post-processing: inject special tokens around encoded sequences.
//!
//! Three composable variants: BERT-style `[CLS] … [SEP]` framing, a parsed
//! template of literal/variable/special segments, and a composite that
//! applies its parts in insertion order. Injected tokens carry the `(0, 0)`
//! offset sentinel so offset mappings stay aligned with the ids.

use crate::config::{ModelFamily, TokenizerConfig};
use crate::error::{Result, TokenizerError};
use crate::vocab::{SpecialTokenType, Vocab, UNKNOWN_ID};

/// One parsed element of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Plain text, tokenized through the vocabulary.
    Literal(String),
    /// A `{{name}}` placeholder; only `message` is accepted.
    Variable(String),
    /// A `[NAME]` placeholder resolved by special-token role or added-token
    /// name.
    Special(String),
}

/// Parse a template into segments.
///
/// `{{name}}` is a variable, `[NAME]` a special-token placeholder, anything
/// else literal text. Unterminated or empty placeholders are
/// [`TokenizerError::MalformedTemplate`].
///
/// # Examples
///
/// ```
/// use segmentar::postprocess::{parse_template, TemplateSegment};
///
/// let segments = parse_template("<bos>{{message}}[SEP]").expect("parse");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[1], TemplateSegment::Variable("message".to_string()));
/// ```
pub fn parse_template(template: &str) -> Result<Vec<TemplateSegment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    let flush = |literal: &mut String, segments: &mut Vec<TemplateSegment>| {
        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(std::mem::take(literal)));
        }
    };

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("{{") {
            let Some(close) = after.find("}}") else {
                return Err(TokenizerError::MalformedTemplate(format!(
                    "unterminated variable placeholder in {template:?}"
                )));
            };
            let name = after[..close].trim();
            if name.is_empty() {
                return Err(TokenizerError::MalformedTemplate(
                    "empty variable placeholder".to_string(),
                ));
            }
            flush(&mut literal, &mut segments);
            segments.push(TemplateSegment::Variable(name.to_string()));
            rest = &after[close + 2..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let Some(close) = after.find(']') else {
                return Err(TokenizerError::MalformedTemplate(format!(
                    "unterminated special-token placeholder in {template:?}"
                )));
            };
            let name = after[..close].trim();
            if name.is_empty() {
                return Err(TokenizerError::MalformedTemplate(
                    "empty special-token placeholder".to_string(),
                ));
            }
            flush(&mut literal, &mut segments);
            segments.push(TemplateSegment::Special(name.to_string()));
            rest = &after[close + 1..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }
    }
    flush(&mut literal, &mut segments);
    Ok(segments)
}

/// Ids with their parallel offset spans, threaded through post-processing.
pub type Processed = (Vec<i32>, Vec<(usize, usize)>);

/// Prepend `[CLS]`, append `[SEP]`; for pairs, separate the segments with
/// an additional `[SEP]`.
#[derive(Debug, Clone)]
pub struct BertPostProcessor {
    cls_id: i32,
    sep_id: i32,
}

impl BertPostProcessor {
    #[must_use]
    pub fn from_vocab(vocab: &Vocab) -> Self {
        Self {
            cls_id: vocab.special_id(SpecialTokenType::Cls),
            sep_id: vocab.special_id(SpecialTokenType::Sep),
        }
    }

    #[must_use]
    pub fn process(&self, ids: &[i32], offsets: &[(usize, usize)]) -> Processed {
        let mut out_ids = Vec::with_capacity(ids.len() + 2);
        let mut out_offsets = Vec::with_capacity(ids.len() + 2);
        if self.cls_id >= 0 {
            out_ids.push(self.cls_id);
            out_offsets.push((0, 0));
        }
        out_ids.extend_from_slice(ids);
        out_offsets.extend_from_slice(offsets);
        if self.sep_id >= 0 {
            out_ids.push(self.sep_id);
            out_offsets.push((0, 0));
        }
        (out_ids, out_offsets)
    }

    /// Number of special tokens a pair encoding adds: one `[CLS]` plus a
    /// `[SEP]` per segment, for the roles actually configured.
    #[must_use]
    pub fn pair_overhead(&self) -> usize {
        usize::from(self.cls_id >= 0) + 2 * usize::from(self.sep_id >= 0)
    }

    /// Two-segment form. Returns ids, offsets and the 0/1 segment markers:
    /// 0 through the first `[SEP]` inclusive, 1 afterwards.
    #[must_use]
    pub fn process_pair(
        &self,
        first: &[i32],
        first_offsets: &[(usize, usize)],
        second: &[i32],
        second_offsets: &[(usize, usize)],
    ) -> (Vec<i32>, Vec<(usize, usize)>, Vec<u8>) {
        let mut ids = Vec::new();
        let mut offsets = Vec::new();
        if self.cls_id >= 0 {
            ids.push(self.cls_id);
            offsets.push((0, 0));
        }
        ids.extend_from_slice(first);
        offsets.extend_from_slice(first_offsets);
        if self.sep_id >= 0 {
            ids.push(self.sep_id);
            offsets.push((0, 0));
        }
        let first_len = ids.len();
        ids.extend_from_slice(second);
        offsets.extend_from_slice(second_offsets);
        if self.sep_id >= 0 {
            ids.push(self.sep_id);
            offsets.push((0, 0));
        }
        let mut type_ids = vec![0u8; first_len];
        type_ids.resize(ids.len(), 1);
        (ids, offsets, type_ids)
    }
}

/// Substitute the encoded sequence into a parsed template.
#[derive(Debug, Clone)]
pub struct TemplatePostProcessor {
    segments: Vec<TemplateSegment>,
}

impl TemplatePostProcessor {
    /// Parse the template eagerly so malformed placeholders fail at
    /// construction, not at encode time.
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self {
            segments: parse_template(template)?,
        })
    }

    #[must_use]
    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// Expand the template around `ids`.
    ///
    /// # Errors
    ///
    /// [`TokenizerError::UnknownTemplateVariable`] for a variable other
    /// than `message`; [`TokenizerError::MalformedTemplate`] when a
    /// special-token placeholder resolves to nothing.
    pub fn process(
        &self,
        ids: &[i32],
        offsets: &[(usize, usize)],
        vocab: &Vocab,
        config: &TokenizerConfig,
    ) -> Result<Processed> {
        let mut out_ids = Vec::new();
        let mut out_offsets = Vec::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => {
                    push_literal(text, vocab, &mut out_ids, &mut out_offsets);
                }
                TemplateSegment::Variable(name) => {
                    if name != "message" {
                        return Err(TokenizerError::UnknownTemplateVariable(name.clone()));
                    }
                    out_ids.extend_from_slice(ids);
                    out_offsets.extend_from_slice(offsets);
                }
                TemplateSegment::Special(name) => {
                    let id = resolve_special(name, vocab, config);
                    if id == UNKNOWN_ID {
                        return Err(TokenizerError::MalformedTemplate(format!(
                            "unknown special token {name:?} in template"
                        )));
                    }
                    out_ids.push(id);
                    out_offsets.push((0, 0));
                }
            }
        }
        Ok((out_ids, out_offsets))
    }

}

/// Literals resolve by whole-text vocabulary lookup first, then character
/// by character; characters outside the vocabulary fall back to the unknown
/// id when that role exists and are dropped otherwise.
fn push_literal(
    text: &str,
    vocab: &Vocab,
    out_ids: &mut Vec<i32>,
    out_offsets: &mut Vec<(usize, usize)>,
) {
    if let Some(id) = vocab.get(text) {
        out_ids.push(id);
        out_offsets.push((0, 0));
        return;
    }
    let unk = vocab.special_id(SpecialTokenType::Unk);
    for c in text.chars() {
        let id = vocab.get(&c.to_string()).unwrap_or(unk);
        if id >= 0 {
            out_ids.push(id);
            out_offsets.push((0, 0));
        }
    }
}

/// Resolve a `[NAME]` placeholder: canonical role names first, then custom
/// added-token names.
fn resolve_special(name: &str, vocab: &Vocab, config: &TokenizerConfig) -> i32 {
    let text = match name {
        "CLS" => Some(config.cls_token.as_str()),
        "SEP" => Some(config.sep_token.as_str()),
        "BOS" => Some(config.bos_token.as_str()),
        "EOS" => Some(config.eos_token.as_str()),
        "PAD" => Some(config.pad_token.as_str()),
        "UNK" => Some(config.unk_token.as_str()),
        "MASK" => Some(config.mask_token.as_str()),
        _ => None,
    };
    if let Some(text) = text {
        return vocab.id_of(text);
    }
    if config.added_tokens.contains_key(name) {
        return vocab.id_of(name);
    }
    UNKNOWN_ID
}

/// Post-processor variants, composable in insertion order.
#[derive(Debug, Clone)]
pub enum PostProcessor {
    Bert(BertPostProcessor),
    Template(TemplatePostProcessor),
    Composite(Vec<PostProcessor>),
}

impl PostProcessor {
    /// Build the post-processor stack the config calls for, or `None` when
    /// nothing applies.
    pub fn from_config(config: &TokenizerConfig, vocab: &Vocab) -> Result<Option<Self>> {
        let mut parts = Vec::new();
        if config.model_family == ModelFamily::Bert {
            parts.push(Self::Bert(BertPostProcessor::from_vocab(vocab)));
        }
        if !config.chat_template.is_empty() {
            parts.push(Self::Template(TemplatePostProcessor::new(
                &config.chat_template,
            )?));
        }
        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Self::Composite(parts)),
        })
    }

    /// Apply to a single sequence.
    pub fn process(
        &self,
        ids: &[i32],
        offsets: &[(usize, usize)],
        vocab: &Vocab,
        config: &TokenizerConfig,
    ) -> Result<Processed> {
        match self {
            Self::Bert(bert) => Ok(bert.process(ids, offsets)),
            Self::Template(template) => template.process(ids, offsets, vocab, config),
            Self::Composite(parts) => {
                let mut current = (ids.to_vec(), offsets.to_vec());
                for part in parts {
                    current = part.process(&current.0, &current.1, vocab, config)?;
                }
                Ok(current)
            }
        }
    }
}

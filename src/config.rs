//! Tokenizer configuration.
//!
//! [`TokenizerConfig`] is the one options record the whole pipeline consults:
//! algorithm selection, special-token texts, normalization flags,
//! pre-tokenization, post-processing and padding/truncation. An empty string
//! disables a special-token role.
//!
//! The config round-trips through a textual `key=value` form
//! ([`TokenizerConfig::to_kv_string`] / [`TokenizerConfig::from_kv_string`])
//! which is the wire format embedded in saved model files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenizerError};

/// Supported segmentation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Byte-pair encoding with an ordered merge-rule list.
    #[default]
    Bpe,
    /// Unigram language model with Viterbi segmentation.
    Unigram,
    /// Greedy longest-match with `##` continuation.
    WordPiece,
    /// One token per character.
    CharLevel,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bpe => "bpe",
            Self::Unigram => "unigram",
            Self::WordPiece => "wordpiece",
            Self::CharLevel => "charlevel",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "bpe" => Some(Self::Bpe),
            "unigram" => Some(Self::Unigram),
            "wordpiece" => Some(Self::WordPiece),
            "charlevel" => Some(Self::CharLevel),
            _ => None,
        }
    }
}

/// Model family the post-processor is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Bert,
    Gpt2,
    Roberta,
    Xlnet,
    Albert,
    #[default]
    Custom,
}

impl ModelFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bert => "bert",
            Self::Gpt2 => "gpt2",
            Self::Roberta => "roberta",
            Self::Xlnet => "xlnet",
            Self::Albert => "albert",
            Self::Custom => "custom",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "bert" => Some(Self::Bert),
            "gpt2" => Some(Self::Gpt2),
            "roberta" => Some(Self::Roberta),
            "xlnet" => Some(Self::Xlnet),
            "albert" => Some(Self::Albert),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Unicode normalization forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationForm {
    None,
    #[default]
    Nfc,
    Nfd,
    Nfkc,
    Nfkd,
}

impl NormalizationForm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Nfc => "nfc",
            Self::Nfd => "nfd",
            Self::Nfkc => "nfkc",
            Self::Nfkd => "nfkd",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "nfc" => Some(Self::Nfc),
            "nfd" => Some(Self::Nfd),
            "nfkc" => Some(Self::Nfkc),
            "nfkd" => Some(Self::Nfkd),
            _ => None,
        }
    }
}

/// How over-long sequences are shortened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Trim whichever segment is currently longer, one token at a time.
    #[default]
    LongestFirst,
    /// Trim only the first segment of a pair.
    OnlyFirst,
    /// Trim only the second segment of a pair.
    OnlySecond,
}

impl TruncationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LongestFirst => "longest_first",
            Self::OnlyFirst => "only_first",
            Self::OnlySecond => "only_second",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "longest_first" => Some(Self::LongestFirst),
            "only_first" => Some(Self::OnlyFirst),
            "only_second" => Some(Self::OnlySecond),
            _ => None,
        }
    }
}

/// Options consulted by the tokenization pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Segmentation algorithm.
    pub algorithm: Algorithm,
    /// Model family driving post-processor selection.
    pub model_family: ModelFamily,

    /// Target vocabulary size for training.
    pub vocab_size: usize,
    /// Minimum corpus frequency for seed characters.
    pub min_frequency: usize,
    /// Upper bound on tokens a trainer may emit.
    pub max_tokens: usize,

    /// Whether encode runs the post-processor.
    pub add_special_tokens: bool,
    /// Unknown-token text. Empty disables the role.
    pub unk_token: String,
    pub pad_token: String,
    pub bos_token: String,
    pub eos_token: String,
    pub mask_token: String,
    pub sep_token: String,
    pub cls_token: String,

    /// Extra `(text, id)` entries installed as custom specials at load time.
    pub added_tokens: BTreeMap<String, i32>,
    /// Chat template string; empty means no template post-processor.
    pub chat_template: String,

    /// Regex patterns for the pre-tokenizer. Empty means whitespace split.
    pub pre_tokenizer_patterns: Vec<String>,
    /// Emit one token per input byte.
    pub byte_level: bool,
    /// Use word-break segmentation instead of plain whitespace splitting.
    pub word_break: bool,

    pub normalization_form: NormalizationForm,
    pub lowercase: bool,
    pub strip_accents: bool,
    pub normalize_whitespace: bool,
    pub remove_control_chars: bool,

    /// Maximum sequence length; 0 disables truncation and padding.
    pub max_length: usize,
    pub pad_to_max_length: bool,
    pub truncation_strategy: TruncationStrategy,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Bpe,
            model_family: ModelFamily::Custom,
            vocab_size: 30_000,
            min_frequency: 2,
            max_tokens: 1_000_000,
            add_special_tokens: true,
            unk_token: "[UNK]".to_string(),
            pad_token: "[PAD]".to_string(),
            bos_token: "[BOS]".to_string(),
            eos_token: "[EOS]".to_string(),
            mask_token: "[MASK]".to_string(),
            sep_token: "[SEP]".to_string(),
            cls_token: "[CLS]".to_string(),
            added_tokens: BTreeMap::new(),
            chat_template: String::new(),
            pre_tokenizer_patterns: Vec::new(),
            byte_level: false,
            word_break: false,
            normalization_form: NormalizationForm::Nfc,
            lowercase: false,
            strip_accents: false,
            normalize_whitespace: true,
            remove_control_chars: true,
            max_length: 0,
            pad_to_max_length: false,
            truncation_strategy: TruncationStrategy::LongestFirst,
        }
    }
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

impl TokenizerConfig {
    /// Render the config as a single-line `key=value` record.
    #[must_use]
    pub fn to_kv_string(&self) -> String {
        let mut out = String::from("TokenizerConfig{");
        let mut field = |out: &mut String, key: &str| {
            if !out.ends_with('{') {
                out.push_str(", ");
            }
            out.push_str(key);
            out.push('=');
        };

        field(&mut out, "algorithm");
        push_quoted(&mut out, self.algorithm.as_str());
        field(&mut out, "model_family");
        push_quoted(&mut out, self.model_family.as_str());
        field(&mut out, "vocab_size");
        out.push_str(&self.vocab_size.to_string());
        field(&mut out, "min_frequency");
        out.push_str(&self.min_frequency.to_string());
        field(&mut out, "max_tokens");
        out.push_str(&self.max_tokens.to_string());
        field(&mut out, "add_special_tokens");
        out.push_str(if self.add_special_tokens { "true" } else { "false" });

        for (key, value) in [
            ("unk_token", &self.unk_token),
            ("pad_token", &self.pad_token),
            ("bos_token", &self.bos_token),
            ("eos_token", &self.eos_token),
            ("mask_token", &self.mask_token),
            ("sep_token", &self.sep_token),
            ("cls_token", &self.cls_token),
            ("chat_template", &self.chat_template),
        ] {
            field(&mut out, key);
            push_quoted(&mut out, value);
        }

        field(&mut out, "added_tokens");
        out.push('[');
        for (i, (text, id)) in self.added_tokens.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            push_quoted(&mut out, text);
            out.push(':');
            out.push_str(&id.to_string());
        }
        out.push(']');

        field(&mut out, "pre_tokenizer_patterns");
        out.push('[');
        for (i, pattern) in self.pre_tokenizer_patterns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            push_quoted(&mut out, pattern);
        }
        out.push(']');

        field(&mut out, "byte_level");
        out.push_str(if self.byte_level { "true" } else { "false" });
        field(&mut out, "word_break");
        out.push_str(if self.word_break { "true" } else { "false" });
        field(&mut out, "normalization_form");
        push_quoted(&mut out, self.normalization_form.as_str());
        field(&mut out, "lowercase");
        out.push_str(if self.lowercase { "true" } else { "false" });
        field(&mut out, "strip_accents");
        out.push_str(if self.strip_accents { "true" } else { "false" });
        field(&mut out, "normalize_whitespace");
        out.push_str(if self.normalize_whitespace { "true" } else { "false" });
        field(&mut out, "remove_control_chars");
        out.push_str(if self.remove_control_chars { "true" } else { "false" });
        field(&mut out, "max_length");
        out.push_str(&self.max_length.to_string());
        field(&mut out, "pad_to_max_length");
        out.push_str(if self.pad_to_max_length { "true" } else { "false" });
        field(&mut out, "truncation_strategy");
        push_quoted(&mut out, self.truncation_strategy.as_str());

        out.push('}');
        out
    }

    /// Parse a config from the `key=value` record produced by
    /// [`to_kv_string`](Self::to_kv_string).
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::MalformedModelFile`] on unbalanced quoting,
    /// unknown enum values or unparseable numbers. Unknown keys are ignored
    /// so newer writers stay readable.
    pub fn from_kv_string(text: &str) -> Result<Self> {
        let body = text
            .trim()
            .strip_prefix("TokenizerConfig{")
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| {
                TokenizerError::MalformedModelFile(
                    "config record must be wrapped in TokenizerConfig{...}".to_string(),
                )
            })?;

        let mut config = Self::default();
        let mut scanner = KvScanner::new(body);
        while let Some((key, value)) = scanner.next_entry()? {
            config.apply(&key, value)?;
        }
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: KvValue) -> Result<()> {
        let bad = |key: &str, detail: &str| {
            TokenizerError::MalformedModelFile(format!("config key {key}: {detail}"))
        };
        match (key, value) {
            ("algorithm", KvValue::Text(s)) => {
                self.algorithm =
                    Algorithm::parse(&s).ok_or_else(|| bad(key, "unknown algorithm"))?;
            }
            ("model_family", KvValue::Text(s)) => {
                self.model_family =
                    ModelFamily::parse(&s).ok_or_else(|| bad(key, "unknown model family"))?;
            }
            ("vocab_size", KvValue::Bare(s)) => {
                self.vocab_size = s.parse().map_err(|_| bad(key, "expected integer"))?;
            }
            ("min_frequency", KvValue::Bare(s)) => {
                self.min_frequency = s.parse().map_err(|_| bad(key, "expected integer"))?;
            }
            ("max_tokens", KvValue::Bare(s)) => {
                self.max_tokens = s.parse().map_err(|_| bad(key, "expected integer"))?;
            }
            ("add_special_tokens", KvValue::Bare(s)) => self.add_special_tokens = s == "true",
            ("unk_token", KvValue::Text(s)) => self.unk_token = s,
            ("pad_token", KvValue::Text(s)) => self.pad_token = s,
            ("bos_token", KvValue::Text(s)) => self.bos_token = s,
            ("eos_token", KvValue::Text(s)) => self.eos_token = s,
            ("mask_token", KvValue::Text(s)) => self.mask_token = s,
            ("sep_token", KvValue::Text(s)) => self.sep_token = s,
            ("cls_token", KvValue::Text(s)) => self.cls_token = s,
            ("chat_template", KvValue::Text(s)) => self.chat_template = s,
            ("added_tokens", KvValue::TokenList(entries)) => {
                self.added_tokens = entries.into_iter().collect();
            }
            ("pre_tokenizer_patterns", KvValue::TextList(patterns)) => {
                self.pre_tokenizer_patterns = patterns;
            }
            ("byte_level", KvValue::Bare(s)) => self.byte_level = s == "true",
            ("word_break", KvValue::Bare(s)) => self.word_break = s == "true",
            ("normalization_form", KvValue::Text(s)) => {
                self.normalization_form =
                    NormalizationForm::parse(&s).ok_or_else(|| bad(key, "unknown form"))?;
            }
            ("lowercase", KvValue::Bare(s)) => self.lowercase = s == "true",
            ("strip_accents", KvValue::Bare(s)) => self.strip_accents = s == "true",
            ("normalize_whitespace", KvValue::Bare(s)) => self.normalize_whitespace = s == "true",
            ("remove_control_chars", KvValue::Bare(s)) => self.remove_control_chars = s == "true",
            ("max_length", KvValue::Bare(s)) => {
                self.max_length = s.parse().map_err(|_| bad(key, "expected integer"))?;
            }
            ("pad_to_max_length", KvValue::Bare(s)) => self.pad_to_max_length = s == "true",
            ("truncation_strategy", KvValue::Text(s)) => {
                self.truncation_strategy =
                    TruncationStrategy::parse(&s).ok_or_else(|| bad(key, "unknown strategy"))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Collect the configured special-token texts paired with their role,
    /// skipping roles disabled by an empty string.
    #[must_use]
    pub fn special_token_texts(&self) -> Vec<(crate::vocab::SpecialTokenType, &str)> {
        use crate::vocab::SpecialTokenType as Role;
        [
            (Role::Unk, self.unk_token.as_str()),
            (Role::Pad, self.pad_token.as_str()),
            (Role::Bos, self.bos_token.as_str()),
            (Role::Eos, self.eos_token.as_str()),
            (Role::Mask, self.mask_token.as_str()),
            (Role::Sep, self.sep_token.as_str()),
            (Role::Cls, self.cls_token.as_str()),
        ]
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .collect()
    }
}

enum KvValue {
    /// A bare (unquoted) value such as a number or boolean.
    Bare(String),
    /// A quoted string with escapes resolved.
    Text(String),
    /// A `["a", "b"]` list of quoted strings.
    TextList(Vec<String>),
    /// A `["a":1, "b":2]` list of quoted-string/id pairs.
    TokenList(Vec<(String, i32)>),
}

struct KvScanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> KvScanner<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            chars: body.chars().peekable(),
        }
    }

    fn malformed(detail: &str) -> TokenizerError {
        TokenizerError::MalformedModelFile(format!("config record: {detail}"))
    }

    fn skip_separators(&mut self) {
        while matches!(self.chars.peek(), Some(' ' | ',' | '\t')) {
            self.chars.next();
        }
    }

    fn next_entry(&mut self) -> Result<Option<(String, KvValue)>> {
        self.skip_separators();
        if self.chars.peek().is_none() {
            return Ok(None);
        }

        let mut key = String::new();
        for c in self.chars.by_ref() {
            if c == '=' {
                break;
            }
            key.push(c);
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(Self::malformed("empty key"));
        }

        let value = match self.chars.peek() {
            Some('"') => KvValue::Text(self.read_quoted()?),
            Some('[') => self.read_list()?,
            _ => {
                let mut bare = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c == ',' {
                        break;
                    }
                    bare.push(c);
                    self.chars.next();
                }
                KvValue::Bare(bare.trim().to_string())
            }
        };
        Ok(Some((key, value)))
    }

    fn read_quoted(&mut self) -> Result<String> {
        match self.chars.next() {
            Some('"') => {}
            _ => return Err(Self::malformed("expected opening quote")),
        }
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(Self::malformed("dangling escape")),
                },
                Some('"') => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(Self::malformed("unterminated string")),
            }
        }
    }

    fn read_list(&mut self) -> Result<KvValue> {
        self.chars.next(); // consume '['
        let mut texts = Vec::new();
        let mut pairs = Vec::new();
        let mut saw_pair = false;
        loop {
            self.skip_separators();
            match self.chars.peek() {
                Some(']') => {
                    self.chars.next();
                    break;
                }
                Some('"') => {
                    let text = self.read_quoted()?;
                    if self.chars.peek() == Some(&':') {
                        self.chars.next();
                        let mut digits = String::new();
                        while let Some(&c) = self.chars.peek() {
                            if c == ',' || c == ']' {
                                break;
                            }
                            digits.push(c);
                            self.chars.next();
                        }
                        let id: i32 = digits
                            .trim()
                            .parse()
                            .map_err(|_| Self::malformed("expected integer id in list"))?;
                        pairs.push((text, id));
                        saw_pair = true;
                    } else {
                        texts.push(text);
                    }
                }
                Some(_) => return Err(Self::malformed("expected quoted list element")),
                None => return Err(Self::malformed("unterminated list")),
            }
        }
        if saw_pair {
            Ok(KvValue::TokenList(pairs))
        } else {
            Ok(KvValue::TextList(texts))
        }
    }
}

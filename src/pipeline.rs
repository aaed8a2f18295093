//! The tokenization pipeline: normalize → pre-tokenize → segment →
//! post-process, plus the inverse decode path and model persistence.
//!
//! [`Tokenizer`] owns the vocabulary and every stage; the model and
//! post-processor borrow the vocabulary immutably during a call, so nothing
//! observable mutates while encoding and a frozen tokenizer is safe to share
//! across threads.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;
use rayon::prelude::*;

use crate::config::{Algorithm, TokenizerConfig, TruncationStrategy};
use crate::encoding::{BatchEncoding, Token};
use crate::error::{Result, TokenizerError};
use crate::model::{BpeModel, CharLevelModel, Model, UnigramModel, WordPieceModel};
use crate::normalize::{Normalizer, PARALLEL_BATCH_THRESHOLD};
use crate::postprocess::{BertPostProcessor, PostProcessor};
use crate::pretokenize::{byte_to_char, char_to_byte, PreTokenizer};
use crate::serialize;
use crate::train::{train_char_level, BpeTrainer};
use crate::vocab::{SpecialTokenType, Vocab};

/// A complete tokenizer: configuration, vocabulary, normalizer,
/// pre-tokenizer, segmentation model and post-processor.
///
/// # Examples
///
/// ```
/// use segmentar::config::TokenizerConfig;
/// use segmentar::Tokenizer;
///
/// let config = TokenizerConfig {
///     vocab_size: 60,
///     min_frequency: 1,
///     ..TokenizerConfig::default()
/// };
/// let mut tokenizer = Tokenizer::new(config).expect("config is valid");
/// tokenizer
///     .train(&["low lower lowest", "new newer newest"])
///     .expect("training should succeed");
///
/// let encoding = tokenizer.encode("lower").expect("encode");
/// assert_eq!(encoding.input_ids.len(), 1);
/// let text = tokenizer
///     .decode(&encoding.input_ids[0], true)
///     .expect("decode");
/// assert_eq!(text, "lower");
/// ```
#[derive(Debug)]
pub struct Tokenizer {
    config: TokenizerConfig,
    vocab: Vocab,
    normalizer: Normalizer,
    pre_tokenizer: PreTokenizer,
    model: Option<Model>,
    post_processor: Option<PostProcessor>,
}

impl Tokenizer {
    /// Build a tokenizer from a config: installs the configured special
    /// tokens and added tokens into a fresh vocabulary and compiles the
    /// pre-tokenizer and post-processor. No model is loaded yet.
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        let mut vocab = Vocab::new();
        for (role, text) in config.special_token_texts() {
            vocab.mark_special(text, role);
        }
        for (text, &id) in &config.added_tokens {
            vocab.mark_special_with_id(text, id, SpecialTokenType::Custom)?;
        }
        let normalizer = Normalizer::from_config(&config);
        let pre_tokenizer = PreTokenizer::from_config(&config)?;
        let post_processor = PostProcessor::from_config(&config, &vocab)?;
        Ok(Self {
            config,
            vocab,
            normalizer,
            pre_tokenizer,
            model: None,
            post_processor,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    #[must_use]
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    #[must_use]
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    #[must_use]
    pub fn token_to_id(&self, token: &str) -> Option<i32> {
        self.vocab.get(token)
    }

    #[must_use]
    pub fn id_to_token(&self, id: i32) -> Option<&str> {
        self.vocab.token(id)
    }

    /// All special-token texts, ordered by id.
    #[must_use]
    pub fn special_tokens(&self) -> Vec<String> {
        self.vocab.special_tokens()
    }

    /// Add ordinary (non-special) tokens, assigning sequential ids.
    pub fn add_tokens<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            self.vocab.add(token.as_ref());
        }
    }

    /// Register extra custom special tokens.
    pub fn add_special_tokens(&mut self, tokens: &[&str]) -> Result<()> {
        for token in tokens {
            if !token.is_empty() {
                self.vocab.mark_special(token, SpecialTokenType::Custom);
            }
        }
        self.post_processor = PostProcessor::from_config(&self.config, &self.vocab)?;
        Ok(())
    }

    /// Install an already-built model. The config's algorithm tag follows
    /// the installed model so persistence stays consistent.
    pub fn set_model(&mut self, model: Model) {
        self.config.algorithm = model.algorithm();
        self.model = Some(model);
    }

    /// Install a WordPiece vocabulary (word-initial and `##`-continued
    /// pieces) and the matching model.
    pub fn install_wordpiece<I, S>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            self.vocab.add(token.as_ref());
        }
        let model = WordPieceModel::new(self.config.unk_token.clone());
        self.set_model(Model::WordPiece(model));
        self.post_processor = PostProcessor::from_config(&self.config, &self.vocab)?;
        Ok(())
    }

    /// Install scored Unigram entries, adding each token to the vocabulary
    /// in iteration order.
    pub fn install_unigram<I, S>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        let mut model = UnigramModel::default();
        for (token, score) in entries {
            self.vocab.add(token.as_ref());
            model.insert(token.as_ref().to_string(), score);
        }
        self.set_model(Model::Unigram(model));
        self.post_processor = PostProcessor::from_config(&self.config, &self.vocab)?;
        Ok(())
    }

    /// Install the identity byte model: a byte-level pre-tokenizer, all 256
    /// byte tokens in the vocabulary and a char-level model over them.
    pub fn install_byte_level(&mut self) -> Result<()> {
        if !self.config.byte_level {
            self.config.byte_level = true;
            self.pre_tokenizer = PreTokenizer::from_config(&self.config)?;
        }
        for byte in 0..=255u8 {
            self.vocab.add(&byte_to_char(byte).to_string());
        }
        self.set_model(Model::CharLevel(CharLevelModel::new()));
        Ok(())
    }

    /// Train a model from a line corpus. Only BPE and char-level carry a
    /// trainer; Unigram and WordPiece report
    /// [`TokenizerError::UnsupportedAlgorithm`].
    pub fn train(&mut self, corpus: &[&str]) -> Result<()> {
        match self.config.algorithm {
            Algorithm::Bpe => {
                let trainer = BpeTrainer::from_config(&self.config)?;
                let mut vocab = Vocab::new();
                let merges =
                    trainer.train(corpus, &self.config, &self.normalizer, &mut vocab)?;
                for (text, &id) in &self.config.added_tokens {
                    vocab.mark_special_with_id(text, id, SpecialTokenType::Custom)?;
                }
                self.vocab = vocab;
                self.model = Some(Model::Bpe(BpeModel::new(merges)));
            }
            Algorithm::CharLevel => {
                let mut vocab = Vocab::new();
                train_char_level(corpus, &self.config, &self.normalizer, &mut vocab)?;
                for (text, &id) in &self.config.added_tokens {
                    vocab.mark_special_with_id(text, id, SpecialTokenType::Custom)?;
                }
                self.vocab = vocab;
                self.model = Some(Model::CharLevel(CharLevelModel::new()));
            }
            Algorithm::Unigram => {
                return Err(TokenizerError::UnsupportedAlgorithm("unigram".to_string()));
            }
            Algorithm::WordPiece => {
                return Err(TokenizerError::UnsupportedAlgorithm(
                    "wordpiece".to_string(),
                ));
            }
        }
        self.post_processor = PostProcessor::from_config(&self.config, &self.vocab)?;
        Ok(())
    }

    fn require_model(&self) -> Result<&Model> {
        let model = self.model.as_ref().ok_or_else(|| {
            TokenizerError::ModelNotLoaded("train or load a model first".to_string())
        })?;
        if self.vocab.is_empty() {
            return Err(TokenizerError::ModelNotLoaded(
                "vocabulary is empty".to_string(),
            ));
        }
        Ok(model)
    }

    /// Normalize, pre-tokenize and segment one text into ids plus byte
    /// spans. Sub-tokens inherit the span of the pre-tokenized piece they
    /// came from; spans index the normalized text.
    fn segment_text(&self, text: &str) -> Result<(Vec<i32>, Vec<(usize, usize)>)> {
        let model = self.require_model()?;
        let normalized = self.normalizer.normalize(text);
        let pieces = self.pre_tokenizer.pre_tokenize(&normalized);
        let unk = self.vocab.special_id(SpecialTokenType::Unk);

        let mut ids = Vec::new();
        let mut offsets = Vec::new();
        for piece in pieces {
            for sub in model.segment(&piece.text, &self.vocab) {
                ids.push(self.vocab.get(&sub).unwrap_or(unk));
                offsets.push(piece.offset());
            }
        }
        Ok((ids, offsets))
    }

    /// Encode one text into a single-row [`BatchEncoding`].
    pub fn encode(&self, text: &str) -> Result<BatchEncoding> {
        let (ids, offsets) = self.segment_text(text)?;
        let (ids, offsets) = if self.config.add_special_tokens {
            match &self.post_processor {
                Some(processor) => {
                    processor.process(&ids, &offsets, &self.vocab, &self.config)?
                }
                None => (ids, offsets),
            }
        } else {
            (ids, offsets)
        };
        let type_ids = vec![0u8; ids.len()];
        Ok(self.finish_row(ids, offsets, type_ids))
    }

    /// Encode a two-segment input. The pair is framed BERT-style when the
    /// model family calls for it; `token_type_ids` marks the second segment
    /// with 1.
    pub fn encode_pair(&self, first: &str, second: &str) -> Result<BatchEncoding> {
        let (mut a_ids, mut a_offsets) = self.segment_text(first)?;
        let (mut b_ids, mut b_offsets) = self.segment_text(second)?;

        let bert = if self.config.add_special_tokens {
            self.bert_post_processor()
        } else {
            None
        };
        let overhead = bert.as_ref().map_or(0, BertPostProcessor::pair_overhead);

        let mut overflow = Vec::new();
        if self.config.max_length > 0 {
            let budget = self.config.max_length.saturating_sub(overhead);
            truncate_pair(
                &mut a_ids,
                &mut a_offsets,
                &mut b_ids,
                &mut b_offsets,
                budget,
                self.config.truncation_strategy,
                &mut overflow,
            );
        }

        let (ids, offsets, type_ids) = match bert {
            Some(bert) => bert.process_pair(&a_ids, &a_offsets, &b_ids, &b_offsets),
            None => {
                let mut ids = a_ids;
                let mut offsets = a_offsets;
                let first_len = ids.len();
                ids.extend_from_slice(&b_ids);
                offsets.extend_from_slice(&b_offsets);
                let mut type_ids = vec![0u8; first_len];
                type_ids.resize(ids.len(), 1);
                (ids, offsets, type_ids)
            }
        };

        let mut encoding = self.finish_row(ids, offsets, type_ids);
        if let Some(row_overflow) = encoding.overflowing_tokens.first_mut() {
            row_overflow.extend(overflow);
        }
        Ok(encoding)
    }

    /// Encode many texts; row `i` of the result equals `encode(texts[i])`.
    /// Large batches fan out across threads with order preserved.
    pub fn encode_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Result<BatchEncoding> {
        let rows: Result<Vec<BatchEncoding>> = if texts.len() > PARALLEL_BATCH_THRESHOLD {
            texts
                .par_iter()
                .map(|text| self.encode(text.as_ref()))
                .collect()
        } else {
            texts.iter().map(|text| self.encode(text.as_ref())).collect()
        };
        let mut out = BatchEncoding::with_capacity(texts.len());
        for row in rows? {
            out.append(row);
        }
        Ok(out)
    }

    /// Encode one text into [`Token`] records (id, surface text, special
    /// flag, byte span).
    pub fn encode_tokens(&self, text: &str) -> Result<Vec<Token>> {
        let encoding = self.encode(text)?;
        let ids = &encoding.input_ids[0];
        let offsets = &encoding.offset_mapping[0];
        Ok(ids
            .iter()
            .zip(offsets)
            .map(|(&id, &offset)| {
                Token::new(
                    id,
                    self.vocab.text_of(id),
                    self.vocab.is_special_id(id),
                    offset,
                )
            })
            .collect())
    }

    /// Truncate (preserving trailing boundary specials), build the
    /// attention mask, then pad.
    fn finish_row(
        &self,
        mut ids: Vec<i32>,
        mut offsets: Vec<(usize, usize)>,
        mut type_ids: Vec<u8>,
    ) -> BatchEncoding {
        let max_length = self.config.max_length;
        let mut overflow = Vec::new();
        if max_length > 0 && ids.len() > max_length {
            truncate_keeping_tail_specials(
                &mut ids,
                &mut offsets,
                &mut type_ids,
                max_length,
                &self.vocab,
                &mut overflow,
            );
        }

        let length = ids.len();
        let mut mask = vec![1u8; length];

        if self.config.pad_to_max_length && max_length > 0 {
            let pad_id = self.vocab.special_id(SpecialTokenType::Pad);
            if pad_id >= 0 {
                while ids.len() < max_length {
                    ids.push(pad_id);
                    offsets.push((0, 0));
                    type_ids.push(0);
                    mask.push(0);
                }
            }
        }

        let mut encoding = BatchEncoding::with_capacity(1);
        encoding.input_ids.push(ids);
        encoding.attention_mask.push(mask);
        encoding.token_type_ids.push(type_ids);
        encoding.offset_mapping.push(offsets);
        encoding.length.push(length);
        encoding.overflowing_tokens.push(overflow);
        encoding
    }

    fn bert_post_processor(&self) -> Option<BertPostProcessor> {
        match &self.post_processor {
            Some(PostProcessor::Bert(_)) => Some(BertPostProcessor::from_vocab(&self.vocab)),
            Some(PostProcessor::Composite(parts))
                if parts
                    .iter()
                    .any(|part| matches!(part, PostProcessor::Bert(_))) =>
            {
                Some(BertPostProcessor::from_vocab(&self.vocab))
            }
            _ => None,
        }
    }

    /// Decode ids back to text. Unknown ids contribute nothing; specials
    /// are dropped when `skip_special` is set. Joining is the inverse of
    /// the active model's segmentation composition.
    pub fn decode(&self, ids: &[i32], skip_special: bool) -> Result<String> {
        let model = self.require_model()?;
        let mut pieces = Vec::with_capacity(ids.len());
        for &id in ids {
            if skip_special && self.vocab.is_special_id(id) {
                continue;
            }
            let text = self.vocab.text_of(id);
            if text.is_empty() {
                continue;
            }
            pieces.push(text.to_string());
        }
        if self.config.byte_level {
            return Ok(decode_byte_pieces(&pieces));
        }
        Ok(model.join(&pieces))
    }

    /// Pointwise [`decode`](Self::decode) over rows, order preserved.
    pub fn decode_batch(&self, rows: &[Vec<i32>], skip_special: bool) -> Result<Vec<String>> {
        rows.iter()
            .map(|ids| self.decode(ids, skip_special))
            .collect()
    }

    /// Serialize config, vocabulary and model state to a single binary
    /// stream at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(TokenizerError::InvalidParameter {
                param: "path".to_string(),
                value: String::new(),
                constraint: "save path must be non-empty".to_string(),
            });
        }
        let model = self.require_model()?;

        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        serialize::write_string(&mut out, &self.config.to_kv_string())?;
        self.vocab.write_to(&mut out)?;

        match model {
            Model::Bpe(bpe) => {
                let merges = bpe.merges();
                serialize::write_u64(&mut out, merges.len() as u64)?;
                for (left, right) in merges {
                    serialize::write_string(&mut out, left)?;
                    serialize::write_string(&mut out, right)?;
                }
            }
            Model::Unigram(unigram) => {
                let scored: Vec<(&str, f32)> = self
                    .vocab
                    .entries_by_id()
                    .into_iter()
                    .filter_map(|(_, text)| unigram.score(text).map(|score| (text, score)))
                    .collect();
                serialize::write_u64(&mut out, scored.len() as u64)?;
                for (text, score) in scored {
                    serialize::write_string(&mut out, text)?;
                    serialize::write_f32(&mut out, score)?;
                }
            }
            Model::WordPiece(_) | Model::CharLevel(_) => {}
        }
        out.flush()?;
        debug!(
            "saved {} model with {} tokens to {}",
            self.config.algorithm.as_str(),
            self.vocab.len(),
            path.display()
        );
        Ok(())
    }

    /// Restore a tokenizer saved by [`save`](Self::save). Trailing bytes
    /// after the expected sections are an error; added tokens from the
    /// config are installed as specials.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(TokenizerError::InvalidParameter {
                param: "path".to_string(),
                value: String::new(),
                constraint: "load path must be non-empty".to_string(),
            });
        }

        let file = File::open(path)?;
        let mut input = BufReader::new(file);
        let config_text = serialize::read_string(&mut input, "config block")?;
        let config = TokenizerConfig::from_kv_string(&config_text)?;
        let mut vocab = Vocab::read_from(&mut input)?;

        let model = match config.algorithm {
            Algorithm::Bpe => {
                let rule_count = serialize::read_u64(&mut input, "merge rule count")?;
                let mut merges = Vec::new();
                for _ in 0..rule_count {
                    let left = serialize::read_string(&mut input, "merge rule")?;
                    let right = serialize::read_string(&mut input, "merge rule")?;
                    merges.push((left, right));
                }
                Model::Bpe(BpeModel::new(merges))
            }
            Algorithm::Unigram => {
                let count = serialize::read_u64(&mut input, "score count")?;
                let mut model = UnigramModel::default();
                for _ in 0..count {
                    let text = serialize::read_string(&mut input, "score record")?;
                    let score = serialize::read_f32(&mut input, "score value")?;
                    model.insert(text, score);
                }
                Model::Unigram(model)
            }
            Algorithm::WordPiece => {
                Model::WordPiece(WordPieceModel::new(config.unk_token.clone()))
            }
            Algorithm::CharLevel => Model::CharLevel(CharLevelModel::new()),
        };
        serialize::expect_eof(&mut input)?;

        for (text, &id) in &config.added_tokens {
            vocab.mark_special_with_id(text, id, SpecialTokenType::Custom)?;
        }

        let normalizer = Normalizer::from_config(&config);
        let pre_tokenizer = PreTokenizer::from_config(&config)?;
        let post_processor = PostProcessor::from_config(&config, &vocab)?;
        debug!(
            "loaded {} model with {} tokens from {}",
            config.algorithm.as_str(),
            vocab.len(),
            path.display()
        );
        Ok(Self {
            config,
            vocab,
            normalizer,
            pre_tokenizer,
            model: Some(model),
            post_processor,
        })
    }
}

/// Reassemble byte-table pieces into text. Characters outside the byte
/// table contribute their own UTF-8 bytes.
fn decode_byte_pieces(pieces: &[String]) -> String {
    let mut bytes = Vec::with_capacity(pieces.len());
    for piece in pieces {
        for c in piece.chars() {
            match char_to_byte(c) {
                Some(b) => bytes.push(b),
                None => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Shorten a finished row to `max_length`, keeping the run of special
/// tokens at the tail (sequence boundaries) intact. Removed content ids are
/// appended to `overflow`.
fn truncate_keeping_tail_specials(
    ids: &mut Vec<i32>,
    offsets: &mut Vec<(usize, usize)>,
    type_ids: &mut Vec<u8>,
    max_length: usize,
    vocab: &Vocab,
    overflow: &mut Vec<i32>,
) {
    let mut tail = 0;
    while tail < ids.len() && vocab.is_special_id(ids[ids.len() - 1 - tail]) {
        tail += 1;
    }
    if tail >= max_length {
        overflow.extend(ids.drain(max_length..));
        offsets.truncate(max_length);
        type_ids.truncate(max_length);
        return;
    }
    let keep_content = max_length - tail;
    let content_len = ids.len() - tail;
    if content_len > keep_content {
        overflow.extend(ids.drain(keep_content..content_len));
        offsets.drain(keep_content..content_len);
        type_ids.drain(keep_content..content_len);
    }
}

/// Trim a pair of segments down to `budget` total tokens according to the
/// truncation strategy, recording removed ids.
fn truncate_pair(
    a_ids: &mut Vec<i32>,
    a_offsets: &mut Vec<(usize, usize)>,
    b_ids: &mut Vec<i32>,
    b_offsets: &mut Vec<(usize, usize)>,
    budget: usize,
    strategy: TruncationStrategy,
    overflow: &mut Vec<i32>,
) {
    let mut pop = |ids: &mut Vec<i32>, offsets: &mut Vec<(usize, usize)>| {
        if let Some(id) = ids.pop() {
            offsets.pop();
            overflow.push(id);
        }
    };
    while a_ids.len() + b_ids.len() > budget {
        match strategy {
            TruncationStrategy::LongestFirst => {
                if b_ids.len() > a_ids.len() {
                    pop(b_ids, b_offsets);
                } else if !a_ids.is_empty() {
                    pop(a_ids, a_offsets);
                } else {
                    pop(b_ids, b_offsets);
                }
            }
            TruncationStrategy::OnlyFirst => {
                if a_ids.is_empty() {
                    break;
                }
                pop(a_ids, a_offsets);
            }
            TruncationStrategy::OnlySecond => {
                if b_ids.is_empty() {
                    break;
                }
                pop(b_ids, b_offsets);
            }
        }
    }
}

//! Offline vocabulary training.
//!
//! The BPE trainer is the end-to-end trainer in this crate: it learns an
//! ordered merge-rule list from a line corpus. Character-level training is
//! the degenerate case (seed characters, no merges). Unigram and WordPiece
//! have no trainer here; the pipeline reports them as unsupported.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use crate::config::TokenizerConfig;
use crate::error::{Result, TokenizerError};
use crate::model::END_OF_WORD;
use crate::normalize::Normalizer;
use crate::vocab::Vocab;

fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TokenizerError::InvalidParameter {
            param: name.to_string(),
            value: "0".to_string(),
            constraint: "must be positive".to_string(),
        });
    }
    Ok(())
}

/// Count words across normalized corpus lines. `BTreeMap` keeps every later
/// step deterministic across runs and platforms.
fn count_words(
    corpus: &[&str],
    normalizer: &Normalizer,
) -> Result<BTreeMap<String, usize>> {
    if corpus.is_empty() {
        return Err(TokenizerError::EmptyCorpus);
    }
    let mut counts = BTreeMap::new();
    for line in corpus {
        let normalized = normalizer.normalize(line);
        for word in normalized.split_whitespace() {
            *counts.entry(word.to_string()).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        return Err(TokenizerError::EmptyCorpus);
    }
    Ok(counts)
}

fn seed_specials(config: &TokenizerConfig, vocab: &mut Vocab) {
    for (role, text) in config.special_token_texts() {
        vocab.mark_special(text, role);
    }
}

/// Learns a BPE vocabulary and merge-rule list from a corpus.
///
/// # Examples
///
/// ```
/// use segmentar::config::TokenizerConfig;
/// use segmentar::normalize::Normalizer;
/// use segmentar::train::BpeTrainer;
/// use segmentar::vocab::Vocab;
///
/// let config = TokenizerConfig {
///     vocab_size: 40,
///     min_frequency: 1,
///     ..TokenizerConfig::default()
/// };
/// let trainer = BpeTrainer::from_config(&config).expect("valid config");
/// let normalizer = Normalizer::from_config(&config);
/// let mut vocab = Vocab::new();
/// let merges = trainer
///     .train(&["low lower lowest"], &config, &normalizer, &mut vocab)
///     .expect("training should succeed");
/// assert!(!merges.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BpeTrainer {
    vocab_size: usize,
    min_frequency: usize,
}

impl BpeTrainer {
    /// Validate the training parameters.
    ///
    /// # Errors
    ///
    /// [`TokenizerError::InvalidParameter`] for a zero vocabulary size or
    /// zero minimum frequency.
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        check_positive("vocab_size", config.vocab_size)?;
        check_positive("min_frequency", config.min_frequency)?;
        check_positive("max_tokens", config.max_tokens)?;
        Ok(Self {
            // max_tokens is the hard ceiling on what a trainer may emit.
            vocab_size: config.vocab_size.min(config.max_tokens),
            min_frequency: config.min_frequency,
        })
    }

    /// Train on a line corpus, seeding `vocab` and returning the ordered
    /// merge-rule list.
    ///
    /// Words are split to single-character symbols with [`END_OF_WORD`]
    /// glued onto the final one — the same convention the encoder applies,
    /// so learned merges actually fire at inference. Each iteration tallies
    /// adjacent symbol pairs weighted by word count and merges the most
    /// frequent pair everywhere; frequency ties resolve to the
    /// lexicographically smaller merged string so training is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// [`TokenizerError::EmptyCorpus`] when no words survive normalization.
    pub fn train(
        &self,
        corpus: &[&str],
        config: &TokenizerConfig,
        normalizer: &Normalizer,
        vocab: &mut Vocab,
    ) -> Result<Vec<(String, String)>> {
        let word_counts = count_words(corpus, normalizer)?;

        // Per-word symbol sequences, in deterministic word order.
        let mut splits: Vec<(Vec<String>, usize)> = word_counts
            .iter()
            .map(|(word, &count)| {
                let mut symbols: Vec<String> =
                    word.chars().map(|c| c.to_string()).collect();
                if let Some(last) = symbols.last_mut() {
                    last.push_str(END_OF_WORD);
                }
                (symbols, count)
            })
            .collect();

        seed_specials(config, vocab);

        let mut symbol_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (symbols, count) in &splits {
            for symbol in symbols {
                *symbol_counts.entry(symbol).or_insert(0) += count;
            }
        }
        for (symbol, count) in symbol_counts {
            if count >= self.min_frequency {
                vocab.add(symbol);
            }
        }

        let mut merges: Vec<(String, String)> = Vec::new();
        while vocab.len() < self.vocab_size {
            let Some((left, right)) = best_pair(&splits) else {
                break;
            };
            let merged = format!("{left}{right}");
            trace!(
                "merge {}: ({left:?}, {right:?}) -> {merged:?}",
                merges.len()
            );

            vocab.add(&merged);
            for (symbols, _) in &mut splits {
                let mut i = 0;
                while i + 1 < symbols.len() {
                    if symbols[i] == left && symbols[i + 1] == right {
                        merged.clone_into(&mut symbols[i]);
                        symbols.remove(i + 1);
                    } else {
                        i += 1;
                    }
                }
            }
            merges.push((left, right));
        }

        debug!(
            "bpe training finished: {} tokens, {} merges",
            vocab.len(),
            merges.len()
        );
        Ok(merges)
    }
}

/// Most frequent adjacent pair across all splits. Ties resolve to the
/// lexicographically smaller merged string, then the smaller left symbol.
fn best_pair(splits: &[(Vec<String>, usize)]) -> Option<(String, String)> {
    let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
    for (symbols, count) in splits {
        for window in symbols.windows(2) {
            *pair_counts
                .entry((window[0].as_str(), window[1].as_str()))
                .or_insert(0) += count;
        }
    }

    let mut best: Option<((&str, &str), usize, String)> = None;
    for (&(left, right), &count) in &pair_counts {
        let merged = format!("{left}{right}");
        let better = match &best {
            None => true,
            Some((best_key, best_count, best_merged)) => {
                count > *best_count
                    || (count == *best_count
                        && (merged < *best_merged
                            || (merged == *best_merged && left < best_key.0)))
            }
        };
        if better {
            best = Some(((left, right), count, merged));
        }
    }
    best.map(|((left, right), _, _)| (left.to_string(), right.to_string()))
}

/// Character-level training: seed specials plus every corpus character with
/// count at or above the minimum frequency, in sorted order, up to the
/// target vocabulary size.
pub fn train_char_level(
    corpus: &[&str],
    config: &TokenizerConfig,
    normalizer: &Normalizer,
    vocab: &mut Vocab,
) -> Result<()> {
    check_positive("vocab_size", config.vocab_size)?;
    check_positive("min_frequency", config.min_frequency)?;
    if corpus.is_empty() {
        return Err(TokenizerError::EmptyCorpus);
    }

    let mut char_counts: BTreeMap<char, usize> = BTreeMap::new();
    for line in corpus {
        for c in normalizer.normalize(line).chars() {
            *char_counts.entry(c).or_insert(0) += 1;
        }
    }
    if char_counts.is_empty() {
        return Err(TokenizerError::EmptyCorpus);
    }

    seed_specials(config, vocab);
    let target = config.vocab_size.min(config.max_tokens);
    for (c, count) in char_counts {
        if vocab.len() >= target {
            break;
        }
        if count >= config.min_frequency {
            vocab.add(&c.to_string());
        }
    }
    debug!("char-level training finished: {} tokens", vocab.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::SpecialTokenType;

    fn spec_config(vocab_size: usize) -> TokenizerConfig {
        TokenizerConfig {
            vocab_size,
            min_frequency: 1,
            lowercase: false,
            unk_token: "[UNK]".to_string(),
            pad_token: String::new(),
            bos_token: String::new(),
            eos_token: String::new(),
            mask_token: String::new(),
            sep_token: String::new(),
            cls_token: String::new(),
            ..TokenizerConfig::default()
        }
    }

    #[test]
    fn test_first_merges_on_reference_corpus() {
        let corpus = [
            "low low low low low",
            "lower lower",
            "newest newest newest newest newest newest",
            "widest widest widest",
        ];
        let config = spec_config(20);
        let trainer = BpeTrainer::from_config(&config).expect("config");
        let normalizer = Normalizer::from_config(&config);
        let mut vocab = Vocab::new();
        let merges = trainer
            .train(&corpus, &config, &normalizer, &mut vocab)
            .expect("train");

        assert_eq!(merges[0], ("e".to_string(), "s".to_string()));
        assert_eq!(merges[1], ("es".to_string(), "t</w>".to_string()));
        assert_eq!(merges[2], ("l".to_string(), "o".to_string()));
        assert_eq!(vocab.len(), 20);
    }

    #[test]
    fn test_empty_corpus() {
        let config = spec_config(20);
        let trainer = BpeTrainer::from_config(&config).expect("config");
        let normalizer = Normalizer::from_config(&config);
        let mut vocab = Vocab::new();
        let err = trainer
            .train(&[], &config, &normalizer, &mut vocab)
            .expect_err("empty corpus");
        assert!(matches!(err, TokenizerError::EmptyCorpus));

        let err = trainer
            .train(&["   ", ""], &config, &normalizer, &mut vocab)
            .expect_err("blank corpus");
        assert!(matches!(err, TokenizerError::EmptyCorpus));
    }

    #[test]
    fn test_zero_parameters_rejected() {
        let config = TokenizerConfig {
            vocab_size: 0,
            ..TokenizerConfig::default()
        };
        assert!(matches!(
            BpeTrainer::from_config(&config),
            Err(TokenizerError::InvalidParameter { .. })
        ));

        let config = TokenizerConfig {
            min_frequency: 0,
            ..TokenizerConfig::default()
        };
        assert!(matches!(
            BpeTrainer::from_config(&config),
            Err(TokenizerError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_vocab_grows_by_one_per_merge() {
        let config = spec_config(30);
        let trainer = BpeTrainer::from_config(&config).expect("config");
        let normalizer = Normalizer::from_config(&config);
        let mut vocab = Vocab::new();

        let corpus = ["aa ab aa ab ba"];
        let merges = trainer
            .train(&corpus, &config, &normalizer, &mut vocab)
            .expect("train");
        let seeded = vocab.len() - merges.len();
        assert!(seeded >= 3); // [UNK] + at least a, b variants
        assert_eq!(vocab.len(), seeded + merges.len());
    }

    #[test]
    fn test_min_frequency_filters_seed_chars() {
        let config = TokenizerConfig {
            min_frequency: 3,
            ..spec_config(50)
        };
        let trainer = BpeTrainer::from_config(&config).expect("config");
        let normalizer = Normalizer::from_config(&config);
        let mut vocab = Vocab::new();
        trainer
            .train(&["aaa aaa aaa z"], &config, &normalizer, &mut vocab)
            .expect("train");
        // 'z' appears once and stays out of the seed vocabulary.
        assert!(!vocab.contains("z</w>"));
    }

    #[test]
    fn test_training_is_deterministic() {
        let corpus = ["the quick brown fox", "the lazy dog", "the end"];
        let config = spec_config(40);
        let normalizer = Normalizer::from_config(&config);
        let trainer = BpeTrainer::from_config(&config).expect("config");

        let mut first_vocab = Vocab::new();
        let first = trainer
            .train(&corpus, &config, &normalizer, &mut first_vocab)
            .expect("train");
        let mut second_vocab = Vocab::new();
        let second = trainer
            .train(&corpus, &config, &normalizer, &mut second_vocab)
            .expect("train");

        assert_eq!(first, second);
        assert_eq!(first_vocab.entries_by_id(), second_vocab.entries_by_id());
    }

    #[test]
    fn test_char_level_training() {
        let config = spec_config(50);
        let normalizer = Normalizer::from_config(&config);
        let mut vocab = Vocab::new();
        train_char_level(&["abc cba"], &config, &normalizer, &mut vocab)
            .expect("train");
        assert!(vocab.contains("a"));
        assert!(vocab.contains("b"));
        assert!(vocab.contains("c"));
        assert_eq!(vocab.special_id(SpecialTokenType::Unk), 0);
    }
}

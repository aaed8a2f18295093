//! Text normalization ahead of pre-tokenization.
//!
//! Steps run in a fixed order, each independently togglable: Unicode form,
//! custom transformations in insertion order, accent stripping, lowercasing,
//! control-character removal and whitespace collapsing. The composition is
//! idempotent: `normalize(normalize(x)) == normalize(x)`.

use rayon::prelude::*;

use crate::config::{NormalizationForm, TokenizerConfig};
use crate::unicode;

/// Batch size beyond which batch normalization fans out across threads.
pub(crate) const PARALLEL_BATCH_THRESHOLD: usize = 1000;

/// Custom string transformation run between the Unicode form and accent
/// stripping.
pub type Transform = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Configurable normalizer applied to every input before pre-tokenization.
///
/// # Examples
///
/// ```
/// use segmentar::config::TokenizerConfig;
/// use segmentar::normalize::Normalizer;
///
/// let config = TokenizerConfig {
///     lowercase: true,
///     strip_accents: true,
///     ..TokenizerConfig::default()
/// };
/// let normalizer = Normalizer::from_config(&config);
/// assert_eq!(normalizer.normalize("  Déjà   Vu  "), "deja vu");
/// ```
pub struct Normalizer {
    form: NormalizationForm,
    lowercase: bool,
    strip_accents: bool,
    normalize_whitespace: bool,
    remove_control_chars: bool,
    transforms: Vec<Transform>,
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("form", &self.form)
            .field("lowercase", &self.lowercase)
            .field("strip_accents", &self.strip_accents)
            .field("normalize_whitespace", &self.normalize_whitespace)
            .field("remove_control_chars", &self.remove_control_chars)
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

impl Normalizer {
    #[must_use]
    pub fn from_config(config: &TokenizerConfig) -> Self {
        Self {
            form: config.normalization_form,
            lowercase: config.lowercase,
            strip_accents: config.strip_accents,
            normalize_whitespace: config.normalize_whitespace,
            remove_control_chars: config.remove_control_chars,
            transforms: Vec::new(),
        }
    }

    /// Append a custom transformation. Transformations run after the Unicode
    /// form and before accent stripping, in insertion order.
    pub fn add_transform(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    /// Normalize one string. Empty input maps to empty output.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut out = unicode::apply_form(text, self.form);
        for transform in &self.transforms {
            out = transform(&out);
        }
        if self.strip_accents {
            out = unicode::strip_accents(&out);
        }
        if self.lowercase {
            out = unicode::lowercase(&out);
        }
        if self.remove_control_chars {
            // Whitespace controls (\n, \t) survive until the whitespace pass
            // so they keep separating words.
            out.retain(|c| !c.is_control() || c.is_whitespace());
        }
        if self.normalize_whitespace {
            out = out.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        out
    }

    /// Normalize a batch. Equivalent to mapping [`normalize`](Self::normalize)
    /// over the inputs; batches past [`PARALLEL_BATCH_THRESHOLD`] fan out
    /// across worker threads with output order preserved.
    #[must_use]
    pub fn normalize_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<String> {
        if texts.len() > PARALLEL_BATCH_THRESHOLD {
            texts
                .par_iter()
                .map(|text| self.normalize(text.as_ref()))
                .collect()
        } else {
            texts
                .iter()
                .map(|text| self.normalize(text.as_ref()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(config: TokenizerConfig) -> Normalizer {
        Normalizer::from_config(&config)
    }

    #[test]
    fn test_empty_input() {
        let n = normalizer(TokenizerConfig::default());
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn test_whitespace_collapse() {
        let n = normalizer(TokenizerConfig::default());
        assert_eq!(n.normalize("a  b\t\tc\nd"), "a b c d");
        assert_eq!(n.normalize("  padded  "), "padded");
    }

    #[test]
    fn test_control_chars_removed() {
        let n = normalizer(TokenizerConfig::default());
        assert_eq!(n.normalize("a\u{0000}b\u{0007}c"), "abc");
        // Whitespace controls still separate words.
        assert_eq!(n.normalize("a\nb"), "a b");
    }

    #[test]
    fn test_lowercase_and_accents() {
        let n = normalizer(TokenizerConfig {
            lowercase: true,
            strip_accents: true,
            ..TokenizerConfig::default()
        });
        assert_eq!(n.normalize("Crème BRÛLÉE"), "creme brulee");
    }

    #[test]
    fn test_nfc_composes_before_accent_logic() {
        let n = normalizer(TokenizerConfig::default());
        // NFD input composes to the single-scalar form.
        assert_eq!(n.normalize("e\u{0301}"), "é");
    }

    #[test]
    fn test_custom_transforms_run_in_insertion_order() {
        let mut n = normalizer(TokenizerConfig::default());
        n.add_transform(Box::new(|s: &str| s.replace('x', "y")));
        n.add_transform(Box::new(|s: &str| s.replace('y', "z")));
        assert_eq!(n.normalize("xyx"), "zzz");
    }

    #[test]
    fn test_idempotence() {
        let n = normalizer(TokenizerConfig {
            lowercase: true,
            strip_accents: true,
            ..TokenizerConfig::default()
        });
        for input in ["Déjà   Vu", "  MIXED case\ttabs  ", "世界 hello", ""] {
            let once = n.normalize(input);
            assert_eq!(n.normalize(&once), once);
        }
    }

    #[test]
    fn test_batch_matches_single() {
        let n = normalizer(TokenizerConfig {
            lowercase: true,
            ..TokenizerConfig::default()
        });
        let inputs = vec!["One", "  TWO  ", "thrée"];
        let batch = n.normalize_batch(&inputs);
        for (input, output) in inputs.iter().zip(&batch) {
            assert_eq!(output, &n.normalize(input));
        }
    }

    #[test]
    fn test_large_batch_preserves_order() {
        let n = normalizer(TokenizerConfig::default());
        let inputs: Vec<String> = (0..1500).map(|i| format!("  item {i}  ")).collect();
        let batch = n.normalize_batch(&inputs);
        assert_eq!(batch.len(), inputs.len());
        for (i, output) in batch.iter().enumerate() {
            assert_eq!(output, &format!("item {i}"));
        }
    }
}

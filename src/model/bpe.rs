//! Byte-pair encoding: apply an ordered merge-rule list to a word.

use std::collections::HashMap;

/// End-of-word marker shared by the trainer and the encoder. The two must
/// agree: merges learned against the marker never fire if the encoder omits
/// it.
pub const END_OF_WORD: &str = "</w>";

/// BPE segmentation state: the ordered merge list and its rank table.
///
/// The rank table maps `"left right"` (space-joined) to the rule's position
/// in the list; lower rank wins.
///
/// # Examples
///
/// ```
/// use segmentar::model::BpeModel;
///
/// let model = BpeModel::new(vec![
///     ("l".to_string(), "o".to_string()),
///     ("lo".to_string(), "w</w>".to_string()),
/// ]);
/// assert_eq!(model.segment("low"), vec!["low</w>"]);
/// assert_eq!(model.segment("lox"), vec!["lo", "x</w>"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BpeModel {
    merges: Vec<(String, String)>,
    merge_ranks: HashMap<String, usize>,
}

impl BpeModel {
    #[must_use]
    pub fn new(merges: Vec<(String, String)>) -> Self {
        let merge_ranks = merges
            .iter()
            .enumerate()
            .map(|(rank, (left, right))| (format!("{left} {right}"), rank))
            .collect();
        Self {
            merges,
            merge_ranks,
        }
    }

    /// The ordered merge-rule list.
    #[must_use]
    pub fn merges(&self) -> &[(String, String)] {
        &self.merges
    }

    /// Segment one pre-tokenized word into subword strings.
    ///
    /// The word is split into single-character symbols with [`END_OF_WORD`]
    /// glued onto the final one, then the lowest-ranked adjacent pair is
    /// merged repeatedly — leftmost occurrence first — until no adjacent
    /// pair is a rule.
    #[must_use]
    pub fn segment(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        let mut symbols: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        if let Some(last) = symbols.last_mut() {
            last.push_str(END_OF_WORD);
        }

        while symbols.len() > 1 {
            let mut best: Option<(usize, usize)> = None;
            for i in 0..symbols.len() - 1 {
                let key = format!("{} {}", symbols[i], symbols[i + 1]);
                if let Some(&rank) = self.merge_ranks.get(&key) {
                    if best.map_or(true, |(best_rank, _)| rank < best_rank) {
                        best = Some((rank, i));
                    }
                }
            }
            let Some((_, i)) = best else { break };
            let merged = format!("{}{}", symbols[i], symbols[i + 1]);
            symbols.splice(i..=i + 1, std::iter::once(merged));
        }
        symbols
    }

    /// Inverse of segmentation composition: strip the end-of-word marker and
    /// turn it back into a single space, with none after the final token.
    #[must_use]
    pub fn join(&self, pieces: &[String]) -> String {
        let mut out = String::new();
        for piece in pieces {
            match piece.strip_suffix(END_OF_WORD) {
                Some(stem) => {
                    out.push_str(stem);
                    out.push(' ');
                }
                None => out.push_str(piece),
            }
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

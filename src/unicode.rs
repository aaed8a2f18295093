//! Unicode services: normalization forms, accent stripping, case folding,
//! character classification and word-break segmentation.
//!
//! Everything here is a pure function over immutable data; the URL/e-mail
//! regexes are compiled once into process-wide `OnceLock`s and are safe to
//! consult from any thread.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::NormalizationForm;

/// Apply a Unicode normalization form. `None` returns the input unchanged.
#[must_use]
pub fn apply_form(text: &str, form: NormalizationForm) -> String {
    match form {
        NormalizationForm::None => text.to_string(),
        NormalizationForm::Nfc => text.nfc().collect(),
        NormalizationForm::Nfd => text.nfd().collect(),
        NormalizationForm::Nfkc => text.nfkc().collect(),
        NormalizationForm::Nfkd => text.nfkd().collect(),
    }
}

/// Remove combining marks: decompose to NFD, drop nonspacing marks, and
/// recompose to NFC.
///
/// # Examples
///
/// ```
/// assert_eq!(segmentar::unicode::strip_accents("café"), "cafe");
/// assert_eq!(segmentar::unicode::strip_accents("naïve"), "naive");
/// ```
#[must_use]
pub fn strip_accents(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .nfc()
        .collect()
}

/// Full locale-independent Unicode lowercasing.
#[must_use]
pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// CJK ideograph check, covering the unified blocks, their extensions and
/// the compatibility blocks.
#[must_use]
pub fn is_cjk(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp)
        || (0x3400..=0x4DBF).contains(&cp)
        || (0x20000..=0x2A6DF).contains(&cp)
        || (0x2A700..=0x2B73F).contains(&cp)
        || (0x2B740..=0x2B81F).contains(&cp)
        || (0x2B820..=0x2CEAF).contains(&cp)
        || (0xF900..=0xFAFF).contains(&cp)
        || (0x2F800..=0x2FA1F).contains(&cp)
}

/// Punctuation check: ASCII punctuation plus the general-punctuation,
/// CJK-symbol and fullwidth-form blocks.
#[must_use]
pub fn is_punctuation(c: char) -> bool {
    if c.is_ascii_punctuation() {
        return true;
    }
    let cp = c as u32;
    (0x2000..=0x206F).contains(&cp)
        || (0x3000..=0x303F).contains(&cp)
        || (0xFF01..=0xFF0F).contains(&cp)
        || (0xFF1A..=0xFF20).contains(&cp)
        || (0xFF3B..=0xFF40).contains(&cp)
        || (0xFF5B..=0xFF65).contains(&cp)
}

#[must_use]
pub fn is_whitespace(c: char) -> bool {
    c.is_whitespace()
}

fn url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r"^(http|https)://[A-Za-z0-9./\-_?=&%#~:+]+$")
            .unwrap_or_else(|_| unreachable!("url pattern is a valid regex"))
    })
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|_| unreachable!("email pattern is a valid regex"))
    })
}

/// Whole-string URL check (anchored).
#[must_use]
pub fn is_url(text: &str) -> bool {
    url_regex().is_match(text)
}

/// Whole-string e-mail check (anchored).
#[must_use]
pub fn is_email(text: &str) -> bool {
    email_regex().is_match(text)
}

/// Word-break iteration with byte offsets into `text`.
///
/// Runs of non-whitespace, non-punctuation, non-CJK characters form words;
/// each CJK ideograph and each punctuation character is its own segment;
/// whitespace separates and is dropped.
///
/// # Examples
///
/// ```
/// let words = segmentar::unicode::segment_words("don't stop, 世界");
/// let texts: Vec<&str> = words.iter().map(|(w, _, _)| w.as_str()).collect();
/// assert_eq!(texts, vec!["don't", "stop", ",", "世", "界"]);
/// ```
#[must_use]
pub fn segment_words(text: &str) -> Vec<(String, usize, usize)> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_start = 0;

    let mut flush = |current: &mut String, start: usize, end: usize, out: &mut Vec<_>| {
        if !current.is_empty() {
            out.push((std::mem::take(current), start, end));
        }
    };

    for (pos, c) in text.char_indices() {
        if is_whitespace(c) {
            flush(&mut current, current_start, pos, &mut segments);
        } else if is_cjk(c) || (is_punctuation(c) && c != '\'') {
            flush(&mut current, current_start, pos, &mut segments);
            segments.push((c.to_string(), pos, pos + c.len_utf8()));
        } else {
            if current.is_empty() {
                current_start = pos;
            }
            current.push(c);
        }
    }
    flush(&mut current, current_start, text.len(), &mut segments);
    segments
}

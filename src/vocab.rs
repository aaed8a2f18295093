//! Bidirectional token/id vocabulary with special-token tagging.
//!
//! The vocabulary owns the only token↔id mapping in the pipeline. Models and
//! post-processors borrow it immutably during a call; nothing mutates it
//! while encoding. Ids are non-negative; [`UNKNOWN_ID`] (-1) is the reserved
//! out-of-vocabulary sentinel.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenizerError};
use crate::serialize;

/// Reserved id for out-of-vocabulary lookups.
pub const UNKNOWN_ID: i32 = -1;

/// Structural roles a token can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialTokenType {
    Unk,
    Pad,
    Bos,
    Eos,
    Mask,
    Sep,
    Cls,
    Blank,
    Custom,
}

impl SpecialTokenType {
    /// All roles, in tag order.
    pub const ALL: [Self; 9] = [
        Self::Unk,
        Self::Pad,
        Self::Bos,
        Self::Eos,
        Self::Mask,
        Self::Sep,
        Self::Cls,
        Self::Blank,
        Self::Custom,
    ];

    /// Stable one-byte tag used in the model file.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Unk => 0,
            Self::Pad => 1,
            Self::Bos => 2,
            Self::Eos => 3,
            Self::Mask => 4,
            Self::Sep => 5,
            Self::Cls => 6,
            Self::Blank => 7,
            Self::Custom => 8,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.tag() == tag)
    }
}

/// Token text to id mapping and its inverse, plus the special-token
/// bookkeeping: a role table and a set of all ids tagged special.
///
/// # Examples
///
/// ```
/// use segmentar::vocab::{SpecialTokenType, Vocab};
///
/// let mut vocab = Vocab::new();
/// let unk = vocab.mark_special("[UNK]", SpecialTokenType::Unk);
/// let hello = vocab.add("hello");
///
/// assert_eq!(vocab.id_of("hello"), hello);
/// assert_eq!(vocab.text_of(hello), "hello");
/// assert!(vocab.is_special_id(unk));
/// assert!(!vocab.is_special_id(hello));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    token_to_id: HashMap<String, i32>,
    id_to_token: HashMap<i32, String>,
    role_ids: HashMap<SpecialTokenType, i32>,
    special_ids: HashSet<i32>,
    next_id: i32,
}

impl Vocab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }

    /// Add a token, assigning the next free id. Adding a text that is
    /// already present is a no-op and returns the existing id. Empty text is
    /// rejected with [`UNKNOWN_ID`].
    pub fn add(&mut self, text: &str) -> i32 {
        if text.is_empty() {
            return UNKNOWN_ID;
        }
        if let Some(&id) = self.token_to_id.get(text) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.token_to_id.insert(text.to_string(), id);
        self.id_to_token.insert(id, text.to_string());
        id
    }

    /// Add a token under a caller-chosen id.
    ///
    /// A text already present keeps its existing id (no-op). An id already
    /// owned by a different text is a [`TokenizerError::DuplicateId`].
    /// `next_id` advances past the inserted id.
    pub fn add_with_id(&mut self, text: &str, id: i32) -> Result<i32> {
        if text.is_empty() || id < 0 {
            return Err(TokenizerError::InvalidParameter {
                param: "token".to_string(),
                value: format!("{text:?}/{id}"),
                constraint: "text must be non-empty and id non-negative".to_string(),
            });
        }
        if let Some(&existing) = self.token_to_id.get(text) {
            return Ok(existing);
        }
        if let Some(existing) = self.id_to_token.get(&id) {
            return Err(TokenizerError::DuplicateId {
                id,
                existing: existing.clone(),
            });
        }
        self.token_to_id.insert(text.to_string(), id);
        self.id_to_token.insert(id, text.to_string());
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        Ok(id)
    }

    /// Id for a token text, [`UNKNOWN_ID`] when absent.
    #[must_use]
    pub fn id_of(&self, text: &str) -> i32 {
        self.token_to_id.get(text).copied().unwrap_or(UNKNOWN_ID)
    }

    /// Token text for an id, empty string when absent.
    #[must_use]
    pub fn text_of(&self, id: i32) -> &str {
        self.id_to_token.get(&id).map_or("", String::as_str)
    }

    /// Option-flavored lookup.
    #[must_use]
    pub fn get(&self, text: &str) -> Option<i32> {
        self.token_to_id.get(text).copied()
    }

    /// Option-flavored reverse lookup.
    #[must_use]
    pub fn token(&self, id: i32) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.token_to_id.contains_key(text)
    }

    /// Register `text` under a structural role, adding it first if needed.
    /// Returns the token's id.
    pub fn mark_special(&mut self, text: &str, role: SpecialTokenType) -> i32 {
        let id = self.add(text);
        if id >= 0 {
            self.role_ids.insert(role, id);
            self.special_ids.insert(id);
        }
        id
    }

    /// Register `text` as a special under a fixed id (used for added
    /// tokens installed at load time).
    pub fn mark_special_with_id(
        &mut self,
        text: &str,
        id: i32,
        role: SpecialTokenType,
    ) -> Result<i32> {
        let id = self.add_with_id(text, id)?;
        self.role_ids.insert(role, id);
        self.special_ids.insert(id);
        Ok(id)
    }

    /// O(1) check whether an id is tagged special.
    #[must_use]
    pub fn is_special_id(&self, id: i32) -> bool {
        self.special_ids.contains(&id)
    }

    #[must_use]
    pub fn is_special_token(&self, text: &str) -> bool {
        self.get(text).is_some_and(|id| self.is_special_id(id))
    }

    /// Id assigned to a role, [`UNKNOWN_ID`] when the role is unset.
    #[must_use]
    pub fn special_id(&self, role: SpecialTokenType) -> i32 {
        self.role_ids.get(&role).copied().unwrap_or(UNKNOWN_ID)
    }

    /// Text assigned to a role, empty string when the role is unset.
    #[must_use]
    pub fn special_text(&self, role: SpecialTokenType) -> &str {
        self.text_of(self.special_id(role))
    }

    /// All special-token texts, ordered by id.
    #[must_use]
    pub fn special_tokens(&self) -> Vec<String> {
        let mut ids: Vec<i32> = self.special_ids.iter().copied().collect();
        ids.sort_unstable();
        ids.iter().map(|&id| self.text_of(id).to_string()).collect()
    }

    /// All `(id, text)` entries sorted by id.
    #[must_use]
    pub fn entries_by_id(&self) -> Vec<(i32, &str)> {
        let mut entries: Vec<(i32, &str)> = self
            .id_to_token
            .iter()
            .map(|(&id, text)| (id, text.as_str()))
            .collect();
        entries.sort_unstable_by_key(|&(id, _)| id);
        entries
    }

    #[must_use]
    pub fn next_id(&self) -> i32 {
        self.next_id
    }

    /// Write the vocabulary block: `size` records of
    /// `{text_len, text_bytes, id}`, then the role table, then the specials
    /// set. Records are id-ordered so the stream is deterministic.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let entries = self.entries_by_id();
        serialize::write_u64(out, entries.len() as u64)?;
        for (id, text) in entries {
            serialize::write_string(out, text)?;
            serialize::write_i32(out, id)?;
        }

        let mut roles: Vec<(u8, i32)> = self
            .role_ids
            .iter()
            .map(|(role, &id)| (role.tag(), id))
            .collect();
        roles.sort_unstable();
        serialize::write_u64(out, roles.len() as u64)?;
        for (tag, id) in roles {
            serialize::write_u8(out, tag)?;
            serialize::write_i32(out, id)?;
        }

        let mut specials: Vec<i32> = self.special_ids.iter().copied().collect();
        specials.sort_unstable();
        serialize::write_u64(out, specials.len() as u64)?;
        for id in specials {
            serialize::write_i32(out, id)?;
        }
        Ok(())
    }

    /// Read a vocabulary block written by [`write_to`](Self::write_to).
    /// `next_id` is restored to `1 + max(id)`.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut vocab = Self::new();
        let size = serialize::read_u64(input, "vocab size")?;
        for _ in 0..size {
            let text = serialize::read_string(input, "vocab record")?;
            let id = serialize::read_i32(input, "vocab record id")?;
            if id < 0 {
                return Err(TokenizerError::MalformedModelFile(format!(
                    "negative id {id} for token {text:?}"
                )));
            }
            vocab.add_with_id(&text, id)?;
        }

        let role_count = serialize::read_u64(input, "role table size")?;
        for _ in 0..role_count {
            let tag = serialize::read_u8(input, "role tag")?;
            let id = serialize::read_i32(input, "role id")?;
            let role = SpecialTokenType::from_tag(tag).ok_or_else(|| {
                TokenizerError::MalformedModelFile(format!("unknown role tag {tag}"))
            })?;
            vocab.role_ids.insert(role, id);
        }

        let special_count = serialize::read_u64(input, "specials set size")?;
        for _ in 0..special_count {
            let id = serialize::read_i32(input, "special id")?;
            vocab.special_ids.insert(id);
        }
        Ok(vocab)
    }
}

//! Vocabulary loading and the vocabulary -> pictogram index.
//!
//! `VocabIndexBuilder` runs once at startup. It canonicalizes every
//! vocabulary key into a synset id (`VocabularyIndex`) and records which ids
//! have a pictogram in the catalog (`ValidTokenSet`). Both are immutable
//! afterwards and are shared by every prediction.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read};
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::catalog::PictogramCatalog;
use crate::errors::{PictoError, Result};
use crate::synset::{Canonicalize, Resolution, SynsetId};

/// Tokenizer vocabulary: key <-> id over a contiguous `[0, V)` range.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: AHashMap<String, u32>,
}

#[derive(Deserialize)]
struct TokenizerFile {
    model: TokenizerModel,
    #[serde(default)]
    added_tokens: Vec<AddedToken>,
}

#[derive(Deserialize)]
struct TokenizerModel {
    vocab: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
struct AddedToken {
    id: u32,
    content: String,
}

impl Vocabulary {
    /// Build from `(key, id)` pairs. Ids must cover `[0, V)` exactly once.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        let pairs: Vec<(String, u32)> = pairs.into_iter().map(|(k, id)| (k.into(), id)).collect();
        if pairs.is_empty() {
            return Err(PictoError::EmptyVocabulary);
        }

        let size = pairs.len();
        let mut slots: Vec<Option<String>> = vec![None; size];
        let mut ids = AHashMap::with_capacity(size);
        for (key, id) in pairs {
            let slot = slots.get_mut(id as usize).ok_or_else(|| {
                PictoError::InvalidVocabulary(format!(
                    "id {} for {:?} is outside [0, {})",
                    id, key, size
                ))
            })?;
            if let Some(existing) = slot {
                return Err(PictoError::InvalidVocabulary(format!(
                    "id {} assigned to both {:?} and {:?}",
                    id, existing, key
                )));
            }
            if ids.insert(key.clone(), id).is_some() {
                return Err(PictoError::InvalidVocabulary(format!(
                    "key {:?} appears more than once",
                    key
                )));
            }
            *slot = Some(key);
        }

        // every slot is filled: `size` distinct ids all below `size`
        let tokens = slots.into_iter().flatten().collect();
        Ok(Self { tokens, ids })
    }

    /// Build from keys in id order (`tokens[i]` has id `i`).
    pub fn from_tokens<I, K>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::from_pairs(
            tokens
                .into_iter()
                .enumerate()
                .map(|(i, k)| (k.into(), i as u32)),
        )
    }

    /// Read the `model.vocab` map of a Hugging Face `tokenizer.json`,
    /// plus any `added_tokens` not already in it.
    pub fn from_tokenizer_json<R: Read>(reader: R) -> Result<Self> {
        let file: TokenizerFile = serde_json::from_reader(reader)?;
        let mut vocab = file.model.vocab;
        let mut taken: ahash::AHashSet<u32> = vocab.values().copied().collect();
        for added in file.added_tokens {
            if !vocab.contains_key(&added.content) && taken.insert(added.id) {
                vocab.insert(added.content, added.id);
            }
        }
        Self::from_pairs(vocab)
    }

    /// Read a one-key-per-line `vocab.txt`; the line number is the id.
    pub fn from_vocab_txt<R: BufRead>(reader: R) -> Result<Self> {
        let mut tokens = Vec::new();
        for line in reader.lines() {
            let line = line?;
            tokens.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        Self::from_tokens(tokens)
    }

    /// Load a vocabulary file: `.json` is a tokenizer file, anything else is `vocab.txt`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PictoError::InvalidVocabulary(format!("open {}: {}", path.display(), e))
        })?;
        let vocab = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_tokenizer_json(BufReader::new(f))?,
            _ => Self::from_vocab_txt(BufReader::new(f))?,
        };
        tracing::info!(path = %path.display(), size = vocab.len(), "loaded vocabulary");
        Ok(vocab)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    /// `(id, key)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (i as u32, t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// One position of the vocabulary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexEntry {
    Synset(SynsetId),
    /// Raw key kept because it did not canonicalize.
    Raw(String),
}

impl IndexEntry {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Synset(id) => id.as_str(),
            Self::Raw(raw) => raw,
        }
    }

    pub fn synset(&self) -> Option<&SynsetId> {
        match self {
            Self::Synset(id) => Some(id),
            Self::Raw(_) => None,
        }
    }
}

impl From<Resolution> for IndexEntry {
    fn from(r: Resolution) -> Self {
        match r {
            Resolution::Resolved(id) => Self::Synset(id),
            Resolution::Unresolved(raw) => Self::Raw(raw),
        }
    }
}

/// Vocabulary id -> synset id (or raw fallback). Length equals the vocabulary size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyIndex {
    entries: Vec<IndexEntry>,
}

impl VocabularyIndex {
    pub fn get(&self, id: u32) -> Option<&IndexEntry> {
        self.entries.get(id as usize)
    }

    pub fn synset(&self, id: u32) -> Option<&SynsetId> {
        self.get(id).and_then(IndexEntry::synset)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of positions that fell back to the raw key.
    pub fn unresolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.synset().is_none()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strictly ascending vocabulary ids that map to a catalogued synset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidTokenSet {
    ids: Vec<u32>,
}

impl ValidTokenSet {
    pub fn contains(&self, id: u32) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The startup product: index plus the eligible ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltIndex {
    pub index: VocabularyIndex,
    pub valid: ValidTokenSet,
}

impl BuiltIndex {
    /// Check the structural invariants: valid ids ascending, unique, in range,
    /// and pointing at synset entries.
    pub fn validate(&self) -> Result<()> {
        let size = self.index.len();
        if size == 0 {
            return Err(PictoError::EmptyVocabulary);
        }
        let ids = self.valid.as_slice();
        if ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PictoError::InvalidVocabulary(
                "valid token ids are not strictly ascending".into(),
            ));
        }
        for &id in ids {
            if self.index.synset(id).is_none() {
                return Err(PictoError::InvalidVocabulary(format!(
                    "valid token id {} does not map to a synset in an index of size {}",
                    id, size
                )));
            }
        }
        Ok(())
    }

    /// Serialized form; identical inputs give identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Load a snapshot written by `save_bincode`, re-checking its invariants.
    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let built: Self = bincode::deserialize_from(reader)?;
        built.validate()?;
        Ok(built)
    }
}

/// Builds the vocabulary index from a vocabulary and a catalog.
pub struct VocabIndexBuilder<'a, C: ?Sized> {
    canonicalizer: &'a C,
}

impl<'a, C: Canonicalize + ?Sized> VocabIndexBuilder<'a, C> {
    pub fn new(canonicalizer: &'a C) -> Self {
        Self { canonicalizer }
    }

    /// Canonicalize every key, then keep the ids whose synset is catalogued.
    ///
    /// Unresolvable keys stay in the index as raw fallbacks; only an empty
    /// vocabulary is an error.
    pub fn build(&self, vocab: &Vocabulary, catalog: &PictogramCatalog) -> Result<BuiltIndex> {
        if vocab.is_empty() {
            return Err(PictoError::EmptyVocabulary);
        }

        let entries: Vec<IndexEntry> = vocab
            .iter()
            .map(|(_, key)| self.canonicalizer.canonicalize(key).into())
            .collect();

        let known = catalog.synsets();
        let mut ids: Vec<u32> = entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match entry {
                IndexEntry::Synset(id) if known.contains(id.as_str()) => Some(i as u32),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let built = BuiltIndex {
            index: VocabularyIndex { entries },
            valid: ValidTokenSet { ids },
        };
        tracing::info!(
            valid = built.valid.len(),
            vocab = built.index.len(),
            unresolved = built.index.unresolved_count(),
            "found {} valid pictogram tokens out of {} vocabulary tokens",
            built.valid.len(),
            built.index.len()
        );
        Ok(built)
    }
}

//! WordNet sense-key canonicalization.
//!
//! A tokenizer vocabulary for the pictogram model is made of WordNet lexical
//! sense keys (`girl%1:18:02::`) plus a handful of special markers. Every key
//! is resolved to the synset it belongs to, written as `OOOOOOOO-p`
//! (`10129825-n`), which is the identifier the pictogram catalog is keyed by.
//!
//! Offsets come from the WordNet `index.sense` file. The index is held as an
//! `fst::Map` from sense key to synset offset; it can be built from the plain
//! text file or loaded from a precompiled `.fst` (see `tools compile-senses`).
//!
//! Public API:
//! - `SynsetId` / `PartOfSpeech` - the canonical identifier
//! - `SenseIndex` - sense key -> offset lookups
//! - `Canonicalize` / `SynsetCanonicalizer` - raw key -> `Resolution`

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use fst::{Map, MapBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::{PictoError, Result};

/// Largest offset that still fits the 8-digit canonical form.
const MAX_OFFSET: u64 = 99_999_999;

/// WordNet part of speech, as encoded by the `ss_type` digit of a sense key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    AdjectiveSatellite,
}

impl PartOfSpeech {
    /// Decode the `ss_type` field (`1..=5`).
    pub fn from_ss_type(ss_type: u8) -> Option<Self> {
        match ss_type {
            1 => Some(Self::Noun),
            2 => Some(Self::Verb),
            3 => Some(Self::Adjective),
            4 => Some(Self::Adverb),
            5 => Some(Self::AdjectiveSatellite),
            _ => None,
        }
    }

    /// Single-character tag used in synset ids.
    pub fn tag(self) -> char {
        match self {
            Self::Noun => 'n',
            Self::Verb => 'v',
            Self::Adjective => 'a',
            Self::Adverb => 'r',
            Self::AdjectiveSatellite => 's',
        }
    }

    fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'n' => Some(Self::Noun),
            'v' => Some(Self::Verb),
            'a' => Some(Self::Adjective),
            'r' => Some(Self::Adverb),
            's' => Some(Self::AdjectiveSatellite),
            _ => None,
        }
    }
}

/// Canonical synset identifier: 8-digit zero-padded offset, `-`, POS tag.
///
/// Values can only be built from an offset and a part of speech (or parsed
/// from an already canonical string), so every `SynsetId` is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SynsetId(String);

impl SynsetId {
    /// Build an id from a synset offset. Returns `None` for offsets that do
    /// not fit in eight digits.
    pub fn new(offset: u64, pos: PartOfSpeech) -> Option<Self> {
        if offset > MAX_OFFSET {
            return None;
        }
        Some(Self(format!("{:08}-{}", offset, pos.tag())))
    }

    /// Parse a string that is already in canonical `OOOOOOOO-p` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (digits, tag) = s.split_once('-')?;
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut tag_chars = tag.chars();
        let pos = PartOfSpeech::from_tag(tag_chars.next()?)?;
        if tag_chars.next().is_some() {
            return None;
        }
        let offset = digits.parse::<u64>().ok()?;
        Self::new(offset, pos)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synset offset (the numeric part).
    pub fn offset(&self) -> u64 {
        self.0[..8].parse().unwrap_or_default()
    }

    pub fn pos(&self) -> PartOfSpeech {
        self.0
            .chars()
            .last()
            .and_then(PartOfSpeech::from_tag)
            .unwrap_or(PartOfSpeech::Noun)
    }
}

impl fmt::Display for SynsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SynsetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SynsetId {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("not a canonical synset id: {s:?}"))
    }
}

impl From<SynsetId> for String {
    fn from(id: SynsetId) -> Self {
        id.0
    }
}

/// A lexical sense key split into the parts canonicalization needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseKey {
    /// Lower-cased full key, as stored in `index.sense`.
    pub key: String,
    pub lemma: String,
    pub pos: PartOfSpeech,
}

impl SenseKey {
    /// Parse `lemma%ss_type:lex_filenum:lex_id:head_word:head_id`.
    ///
    /// Special tokens (`[MASK]`, `[PAD]`, `.`) and anything else without that
    /// shape return `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.to_lowercase();
        let mut halves = key.split('%');
        let lemma = halves.next()?;
        let lex_sense = halves.next()?;
        if halves.next().is_some() {
            return None;
        }

        let fields: Vec<&str> = lex_sense.split(':').collect();
        if fields.len() != 5 {
            return None;
        }
        let ss_type = fields[0].parse::<u8>().ok()?;
        let pos = PartOfSpeech::from_ss_type(ss_type)?;

        Some(Self {
            lemma: lemma.to_string(),
            key,
            pos,
        })
    }
}

/// Sense key -> synset offset index backed by an FST.
#[derive(Debug, Clone)]
pub struct SenseIndex {
    map: Map<Vec<u8>>,
}

impl SenseIndex {
    /// Build an index from `(sense_key, offset)` pairs in any order.
    ///
    /// Keys are lower-cased; if a key repeats, the first offset wins.
    pub fn from_entries<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        let mut sorted: BTreeMap<String, u64> = BTreeMap::new();
        for (key, offset) in entries {
            sorted
                .entry(key.as_ref().to_lowercase())
                .or_insert(offset);
        }

        let mut builder = MapBuilder::new(Vec::new())?;
        for (key, offset) in &sorted {
            builder.insert(key, *offset)?;
        }
        let bytes = builder.into_inner()?;
        let map = Map::new(bytes)?;
        Ok(Self { map })
    }

    /// Parse WordNet `index.sense` lines: `sense_key offset sense_number tag_cnt`.
    ///
    /// Blank or unparsable lines are skipped. An index with no usable lines
    /// is an error.
    pub fn from_index_sense<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let (Some(key), Some(offset)) = (parts.next(), parts.next()) else {
                if !line.trim().is_empty() {
                    skipped += 1;
                }
                continue;
            };
            match offset.parse::<u64>() {
                Ok(offset) => entries.push((key.to_string(), offset)),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "skipped malformed index.sense lines");
        }
        if entries.is_empty() {
            return Err(PictoError::SenseIndex("index.sense has no entries".into()));
        }
        Self::from_entries(entries)
    }

    /// Load the plain-text WordNet `index.sense` file.
    pub fn load_index_sense<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PictoError::SenseIndex(format!("open {}: {}", path.display(), e))
        })?;
        Self::from_index_sense(BufReader::new(f))
    }

    /// Load a precompiled FST produced by `save_fst`.
    pub fn load_fst<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut f = File::open(path).map_err(|e| {
            PictoError::SenseIndex(format!("open {}: {}", path.display(), e))
        })?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        let map = Map::new(buf)?;
        if map.is_empty() {
            return Err(PictoError::SenseIndex(format!(
                "{} has no entries",
                path.display()
            )));
        }
        Ok(Self { map })
    }

    /// Load either form, picking by file extension (`.fst` or text).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("fst") => Self::load_fst(path),
            _ => Self::load_index_sense(path),
        }
    }

    /// Write the index as a raw FST.
    pub fn save_fst<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.map.as_fst().as_bytes())?;
        Ok(())
    }

    /// Offset of the synset a (lower-cased) sense key belongs to.
    pub fn offset(&self, key: &str) -> Option<u64> {
        self.map.get(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Outcome of canonicalizing one vocabulary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(SynsetId),
    /// The key is not a resolvable sense key; carries the raw key unchanged.
    Unresolved(String),
}

impl Resolution {
    pub fn synset(&self) -> Option<&SynsetId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Unresolved(_) => None,
        }
    }
}

/// Turns raw vocabulary keys into synset ids.
pub trait Canonicalize {
    fn canonicalize(&self, raw_key: &str) -> Resolution;
}

/// WordNet-backed canonicalizer.
#[derive(Debug, Clone)]
pub struct SynsetCanonicalizer {
    senses: SenseIndex,
}

impl SynsetCanonicalizer {
    pub fn new(senses: SenseIndex) -> Self {
        Self { senses }
    }

    pub fn sense_index(&self) -> &SenseIndex {
        &self.senses
    }
}

impl Canonicalize for SynsetCanonicalizer {
    fn canonicalize(&self, raw_key: &str) -> Resolution {
        let resolved = SenseKey::parse(raw_key).and_then(|sense| {
            let offset = self.senses.offset(&sense.key)?;
            SynsetId::new(offset, sense.pos)
        });
        match resolved {
            Some(id) => Resolution::Resolved(id),
            None => Resolution::Unresolved(raw_key.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_SENSE: &str = "\
abandon%2:31:00:: 00614057 5 3
dog%1:05:00:: 02084071 1 42
girl%1:18:02:: 10129825 2 5
happy%3:00:00:: 01148283 1 28
quickly%4:02:00:: 00085811 1 12
";

    fn canonicalizer() -> SynsetCanonicalizer {
        let senses = SenseIndex::from_index_sense(INDEX_SENSE.as_bytes()).unwrap();
        SynsetCanonicalizer::new(senses)
    }

    #[test]
    fn resolves_sense_keys_to_canonical_ids() {
        let c = canonicalizer();
        assert_eq!(
            c.canonicalize("girl%1:18:02::"),
            Resolution::Resolved(SynsetId::parse("10129825-n").unwrap())
        );
        assert_eq!(
            c.canonicalize("abandon%2:31:00::").synset().map(|s| s.as_str()),
            Some("00614057-v")
        );
        assert_eq!(
            c.canonicalize("quickly%4:02:00::").synset().map(|s| s.as_str()),
            Some("00085811-r")
        );
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let c = canonicalizer();
        assert_eq!(
            c.canonicalize("Dog%1:05:00::").synset().map(|s| s.as_str()),
            Some("02084071-n")
        );
    }

    #[test]
    fn special_tokens_are_unresolved() {
        let c = canonicalizer();
        for raw in ["[MASK]", "[PAD]", "[SEP]", ".", "", "%%", "dog%9:05:00::"] {
            assert_eq!(c.canonicalize(raw), Resolution::Unresolved(raw.to_string()));
        }
    }

    #[test]
    fn unknown_sense_key_is_unresolved() {
        let c = canonicalizer();
        assert_eq!(
            c.canonicalize("cat%1:05:00::"),
            Resolution::Unresolved("cat%1:05:00::".to_string())
        );
    }

    #[test]
    fn sense_key_needs_five_fields() {
        assert!(SenseKey::parse("dog%1:05:00").is_none());
        assert!(SenseKey::parse("dog%1:05:00:::").is_none());
        let key = SenseKey::parse("Hot_Dog%1:13:01::").unwrap();
        assert_eq!(key.key, "hot_dog%1:13:01::");
        assert_eq!(key.lemma, "hot_dog");
        assert_eq!(key.pos, PartOfSpeech::Noun);
    }

    #[test]
    fn synset_id_format() {
        let id = SynsetId::new(85811, PartOfSpeech::AdjectiveSatellite).unwrap();
        assert_eq!(id.as_str(), "00085811-s");
        assert_eq!(id.offset(), 85811);
        assert_eq!(id.pos(), PartOfSpeech::AdjectiveSatellite);
        assert!(SynsetId::new(100_000_000, PartOfSpeech::Noun).is_none());
        assert!(SynsetId::parse("1234567-n").is_none());
        assert!(SynsetId::parse("12345678-x").is_none());
        assert!(SynsetId::parse("12345678-nn").is_none());
    }

    #[test]
    fn fst_roundtrip_preserves_offsets() {
        let tmp = std::env::temp_dir().join(format!(
            "pictobert_sense_index_{}.fst",
            std::process::id()
        ));
        let index = SenseIndex::from_index_sense(INDEX_SENSE.as_bytes()).unwrap();
        index.save_fst(&tmp).unwrap();
        let loaded = SenseIndex::load(&tmp).unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.offset("happy%3:00:00::"), Some(1148283));
        let _ = std::fs::remove_file(tmp);
    }

    #[test]
    fn empty_index_sense_is_an_error() {
        let err = SenseIndex::from_index_sense("\n\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PictoError::SenseIndex(_)));
    }
}

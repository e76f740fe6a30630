//! Word-level tokenizer over a sense-key vocabulary.
//!
//! The pictogram model's vocabulary is whole sense keys, so tokenization is a
//! whitespace split followed by an exact vocabulary lookup, wrapped in
//! `[CLS] ... [SEP]` when those markers exist.

use crate::errors::{PictoError, Result};
use crate::vocab::Vocabulary;
use crate::Config;

/// Token ids plus the attention mask the model expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl Encoding {
    pub fn from_ids(ids: Vec<u32>) -> Self {
        let attention_mask = vec![1; ids.len()];
        Self {
            ids,
            attention_mask,
        }
    }

    /// Every position holding `id`.
    pub fn positions_of(&self, id: u32) -> Vec<usize> {
        self.ids
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t == id)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct WordLevelTokenizer {
    vocab: Vocabulary,
    unk_id: Option<u32>,
    cls_id: Option<u32>,
    sep_id: Option<u32>,
    add_special_tokens: bool,
}

impl WordLevelTokenizer {
    /// Special-token markers are taken from `config`; markers missing from
    /// the vocabulary are simply not used.
    pub fn new(vocab: Vocabulary, config: &Config) -> Self {
        Self {
            unk_id: vocab.id(&config.unk_token),
            cls_id: vocab.id(&config.cls_token),
            sep_id: vocab.id(&config.sep_token),
            add_special_tokens: config.add_special_tokens,
            vocab,
        }
    }

    pub fn encode(&self, text: &str) -> Result<Encoding> {
        let mut ids = Vec::new();
        if self.add_special_tokens {
            ids.extend(self.cls_id);
        }
        for word in text.split_whitespace() {
            let id = match (self.vocab.id(word), self.unk_id) {
                (Some(id), _) => id,
                (None, Some(unk)) => unk,
                (None, None) => return Err(PictoError::UnknownToken(word.to_string())),
            };
            ids.push(id);
        }
        if self.add_special_tokens {
            ids.extend(self.sep_id);
        }
        Ok(Encoding::from_ids(ids))
    }

    /// Whether `word` encodes to something, either itself or the unknown token.
    pub fn can_encode(&self, word: &str) -> bool {
        self.vocab.id(word).is_some() || self.unk_id.is_some()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab.token(id)
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(add_special_tokens: bool) -> WordLevelTokenizer {
        let vocab = Vocabulary::from_tokens([
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", ".", "girl%1:18:02::",
        ])
        .unwrap();
        let config = Config {
            add_special_tokens,
            ..Config::default()
        };
        WordLevelTokenizer::new(vocab, &config)
    }

    #[test]
    fn wraps_with_cls_and_sep() {
        let enc = tokenizer(true).encode("girl%1:18:02:: [MASK] .").unwrap();
        assert_eq!(enc.ids, vec![2, 6, 4, 5, 3]);
        assert_eq!(enc.attention_mask, vec![1; 5]);
    }

    #[test]
    fn unknown_words_map_to_unk() {
        let enc = tokenizer(false).encode("boy%1:18:00:: [MASK]").unwrap();
        assert_eq!(enc.ids, vec![1, 4]);
        assert_eq!(enc.positions_of(4), vec![1]);
    }

    #[test]
    fn unknown_without_unk_is_an_error() {
        let vocab = Vocabulary::from_tokens(["[MASK]", "."]).unwrap();
        let tok = WordLevelTokenizer::new(vocab, &Config::default());
        let err = tok.encode("boy%1:18:00:: [MASK] .").unwrap_err();
        assert!(matches!(err, PictoError::UnknownToken(w) if w == "boy%1:18:00::"));
        assert!(tok.can_encode("."));
        assert!(!tok.can_encode("boy%1:18:00::"));
        assert!(tokenizer(false).can_encode("boy%1:18:00::"));
    }
}

//! pictobert-core
//!
//! Next-pictogram prediction core: canonicalizes a sense-key vocabulary into
//! WordNet synset ids, decides which vocabulary entries have pictograms, and
//! turns a masked language model's distribution into a ranked, catalog-joined
//! prediction list.
//!
//! Startup artifacts use FST for the sense index and bincode for the built
//! vocabulary index snapshot.
//!
//! Public API:
//! - `SynsetCanonicalizer` - Sense key -> synset id resolution
//! - `PictogramCatalog` - Synset id -> pictogram records
//! - `VocabIndexBuilder` - Vocabulary index and valid-token set construction
//! - `InferenceContext` / `predict` - Per-request prediction
//! - `Predictor` - Readiness-gated wrapper used by the service
//! - `Config` - Marker tokens and inference settings
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod errors;
pub use errors::{PictoError, Result};

pub mod synset;
pub use synset::{Canonicalize, PartOfSpeech, Resolution, SenseIndex, SenseKey, SynsetCanonicalizer, SynsetId};

pub mod catalog;
pub use catalog::{PictogramCatalog, PictogramRecord};

pub mod vocab;
pub use vocab::{BuiltIndex, IndexEntry, ValidTokenSet, VocabIndexBuilder, Vocabulary, VocabularyIndex};

pub mod tokenizer;
pub use tokenizer::{Encoding, WordLevelTokenizer};

pub mod model;
pub use model::{BoundedModel, MaskScores, MaskedLanguageModel};

pub mod prediction;
pub use prediction::{PredictResponse, PredictionRecord};

pub mod pipeline;
pub use pipeline::{predict, rank_valid, InferenceContext, ScoredToken};

pub mod predictor;
pub use predictor::{Predictor, Status};

/// Prediction configuration.
///
/// Marker tokens must match the model's tokenizer. Only `mask_token` is
/// required to exist in the vocabulary; the others are skipped when absent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Marker whose position carries the predictive distribution
    pub mask_token: String,
    /// Appended after the mask to close the sentence
    pub terminator_token: String,
    pub cls_token: String,
    pub sep_token: String,
    /// Substituted for words the vocabulary does not know
    pub unk_token: String,
    /// Wrap encodings in `cls_token ... sep_token`
    pub add_special_tokens: bool,

    /// Upper bound on one model invocation, in milliseconds
    pub inference_timeout_ms: u64,
    /// Cap on returned predictions; `None` returns the full ranked list
    pub max_predictions: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mask_token: "[MASK]".to_string(),
            terminator_token: ".".to_string(),
            cls_token: "[CLS]".to_string(),
            sep_token: "[SEP]".to_string(),
            unk_token: "[UNK]".to_string(),
            add_special_tokens: true,
            inference_timeout_ms: 10_000,
            max_predictions: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("inference_timeout_ms = 250\nmax_predictions = 12\n").unwrap();
        assert_eq!(config.inference_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_predictions, Some(12));
        assert_eq!(config.mask_token, "[MASK]");
        assert!(config.add_special_tokens);
    }

    #[test]
    fn toml_file_round_trip() {
        let path = std::env::temp_dir().join(format!("pictobert_config_{}.toml", std::process::id()));
        let config = Config {
            terminator_token: "!".to_string(),
            add_special_tokens: false,
            ..Config::default()
        };
        config.save_toml(&path).unwrap();
        let loaded = Config::load_toml(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn normalize_trims_and_composes() {
        assert_eq!(utils::normalize("  dog%1:05:00:: "), "dog%1:05:00::");
        assert_eq!(utils::normalize("cafe\u{301}"), "caf\u{e9}");
    }
}

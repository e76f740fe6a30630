//! Error types for pictobert-core.
//!
//! Startup failures (vocabulary, catalog, sense index) keep the service from
//! becoming ready. Request failures abort a single `predict` call; nothing is
//! retried.

use std::path::PathBuf;

/// Errors from pictobert-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PictoError {
    /// `predict` was called before the inference context was installed.
    #[error("predictor is not ready: startup construction has not completed")]
    NotReady,

    /// The tokenized request did not contain exactly one mask marker.
    #[error("malformed input: expected exactly one mask token, found {found}")]
    MalformedInput {
        /// Number of mask markers found after tokenization.
        found: usize,
    },

    /// Inference did not complete within the configured deadline.
    #[error("model unavailable: inference exceeded {timeout_ms} ms")]
    ServiceUnavailable {
        /// The deadline that expired.
        timeout_ms: u64,
    },

    /// Too many inference workers are still running; the request was not attempted.
    #[error("model busy: {in_flight} inference workers still running")]
    ModelBusy {
        /// Workers in flight when the request was refused.
        in_flight: usize,
    },

    /// Startup construction was attempted on an already started service.
    #[error("already started")]
    AlreadyStarted,

    /// A required setting is missing or unusable.
    #[error("configuration: {0}")]
    Config(String),

    /// The vocabulary has no entries.
    #[error("vocabulary is empty")]
    EmptyVocabulary,

    /// Vocabulary ids are not a contiguous, duplicate-free `[0, V)` range.
    #[error("invalid vocabulary: {0}")]
    InvalidVocabulary(String),

    /// A special-token marker required by the pipeline is not in the vocabulary.
    #[error("special token {0:?} is not in the vocabulary")]
    MissingSpecialToken(String),

    /// A request word is not in the vocabulary and there is no unknown-token fallback.
    #[error("token {0:?} is not in the vocabulary and no unknown token is configured")]
    UnknownToken(String),

    /// The pictogram catalog source does not exist.
    #[error("pictogram catalog not found at {}", .0.display())]
    CatalogMissing(PathBuf),

    /// The pictogram catalog has no rows.
    #[error("pictogram catalog is empty")]
    EmptyCatalog,

    /// A catalog row could not be parsed.
    #[error("pictogram catalog row {row}: {message}")]
    CatalogFormat {
        /// 1-based data row number.
        row: usize,
        /// What was wrong with it.
        message: String,
    },

    /// The WordNet sense index could not be loaded.
    #[error("sense index: {0}")]
    SenseIndex(String),

    /// The model collaborator failed or returned an unusable distribution.
    #[error("model error: {0}")]
    Model(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error (tokenizer files, model protocol).
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// CSV error from the catalog reader.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// FST error from the compiled sense index.
    #[error(transparent)]
    Fst(#[from] fst::Error),

    /// Bincode error from index snapshots.
    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    /// TOML parse error.
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

/// Result type for pictobert-core operations.
pub type Result<T, E = PictoError> = std::result::Result<T, E>;

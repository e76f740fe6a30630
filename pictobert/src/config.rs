//! Service configuration that extends the base `Config` from core.
//!
//! This configuration includes:
//! - All prediction options from `pictobert_core::Config` (flattened via serde)
//! - Data directory layout (tokenizer, pictogram mapping, WordNet sense index)
//! - The remote inference endpoint and pictogram image host
//!
//! # Example
//!
//! ```rust
//! use pictobert::ServiceConfig;
//!
//! let config = ServiceConfig::from_toml_str("data_dir = \"/srv/pictobert\"\n").unwrap();
//! assert_eq!(config.tokenizer_path().file_name().unwrap(), "childes_all_new.json");
//! ```

use std::path::{Path, PathBuf};

use pictobert_core::prediction::ARASAAC_IMAGE_BASE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Marker tokens, timeout and result cap
    #[serde(flatten)]
    pub base: pictobert_core::Config,

    /// Directory holding the files below
    pub data_dir: PathBuf,
    /// Hugging Face tokenizer file (or a one-key-per-line vocab.txt)
    pub tokenizer_file: String,
    /// ARASAAC synset -> pictogram CSV
    pub mapping_file: String,
    /// WordNet `index.sense`; a `.fst` compiled by the tools crate also works
    pub sense_index_file: String,

    /// Inference server URL; without it the service cannot become ready
    pub model_endpoint: Option<String>,
    pub image_base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base: pictobert_core::Config::default(),
            data_dir: PathBuf::from("data"),
            tokenizer_file: "childes_all_new.json".to_string(),
            mapping_file: "arasaac_mapping.csv".to_string(),
            sense_index_file: "index.sense".to_string(),
            model_endpoint: None,
            image_base_url: ARASAAC_IMAGE_BASE.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Default layout rooted at `data_dir`.
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> pictobert_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.data_dir.join(&self.tokenizer_file)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.data_dir.join(&self.mapping_file)
    }

    pub fn sense_index_path(&self) -> PathBuf {
        self.data_dir.join(&self.sense_index_file)
    }

    /// Get a reference to the base config
    pub fn base(&self) -> &pictobert_core::Config {
        &self.base
    }

    /// Convert into the base config for `InferenceContext`
    pub fn into_base(self) -> pictobert_core::Config {
        self.base
    }
}

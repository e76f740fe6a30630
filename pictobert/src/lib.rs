//! pictobert
//!
//! Next-pictogram prediction service. Wires the data directory (tokenizer,
//! ARASAAC mapping, WordNet sense index) and a model collaborator into a
//! `pictobert_core::Predictor`.
//!
//! Public API:
//! - `Service` - Startup loading, readiness and request handling
//! - `ServiceConfig` - Data layout and endpoint configuration
//! - `RemoteModel` - HTTP inference server collaborator

pub mod config;
pub use config::ServiceConfig;

pub mod logging;

pub mod remote;
pub use remote::RemoteModel;

use std::path::Path;

use pictobert_core::prediction::{dedup_by_pictogram, PredictResponse};
use pictobert_core::{
    InferenceContext, MaskedLanguageModel, PictoError, PictogramCatalog, PredictionRecord,
    Predictor, Result, SenseIndex, Status, SynsetCanonicalizer, Vocabulary,
};

/// Build the inference context from the files named in `config`.
///
/// Every file is required: a missing tokenizer, mapping or sense index keeps
/// the service from becoming ready.
pub fn load_context(
    config: &ServiceConfig,
    model: Box<dyn MaskedLanguageModel>,
) -> Result<InferenceContext> {
    let vocab = Vocabulary::load(config.tokenizer_path())?;
    let catalog = PictogramCatalog::load_csv(config.mapping_path())?;

    let sense_path = config.sense_index_path();
    let senses = SenseIndex::load(&sense_path)?;
    tracing::info!(path = %sense_path.display(), senses = senses.len(), "loaded sense index");

    let canonicalizer = SynsetCanonicalizer::new(senses);
    InferenceContext::build(config.base().clone(), vocab, catalog, &canonicalizer, model)
}

/// The remote model named by `config.model_endpoint`.
pub fn remote_model(config: &ServiceConfig) -> Result<RemoteModel> {
    let endpoint = config
        .model_endpoint
        .as_deref()
        .ok_or_else(|| PictoError::Config("no model endpoint configured".into()))?;
    RemoteModel::new(endpoint, config.base().inference_timeout())
}

/// A prediction service. Created not-ready; `start` loads the data and
/// makes it ready.
pub struct Service {
    config: ServiceConfig,
    predictor: Predictor,
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            predictor: Predictor::new(),
        }
    }

    /// Load from `data_dir` with default file names and start immediately.
    pub fn from_data_dir<P: AsRef<Path>>(
        data_dir: P,
        model: Box<dyn MaskedLanguageModel>,
    ) -> Result<Self> {
        let service = Self::new(ServiceConfig::with_data_dir(data_dir.as_ref()));
        service.start(model)?;
        Ok(service)
    }

    /// Run startup construction and install the result. Starting twice is
    /// an error and leaves the first context in place.
    pub fn start(&self, model: Box<dyn MaskedLanguageModel>) -> Result<()> {
        let context = load_context(&self.config, model)?;
        self.predictor
            .install(context)
            .map_err(|_| PictoError::AlreadyStarted)
    }

    /// Start with the configured remote model.
    pub fn start_remote(&self) -> Result<()> {
        let model = remote_model(&self.config)?;
        self.start(Box::new(model))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.is_ready()
    }

    pub fn health(&self) -> Status {
        self.predictor.status()
    }

    /// Handle one request. `limit` falls back to the configured cap.
    pub fn predict<S: AsRef<str>>(
        &self,
        prior_senses: &[S],
        limit: Option<usize>,
    ) -> Result<PredictResponse> {
        let predictions = self.predictor.predict_top(prior_senses, limit)?;
        Ok(PredictResponse { predictions })
    }

    /// Like `predict`, but one entry per pictogram id, best first.
    pub fn predict_unique<S: AsRef<str>>(
        &self,
        prior_senses: &[S],
        limit: Option<usize>,
    ) -> Result<PredictResponse> {
        let mut predictions = dedup_by_pictogram(self.predictor.predict(prior_senses)?);
        if let Some(limit) = limit.or(self.config.base().max_predictions) {
            predictions.truncate(limit);
        }
        Ok(PredictResponse { predictions })
    }

    pub fn image_url(&self, record: &PredictionRecord) -> String {
        record.image_url(&self.config.image_base_url)
    }
}

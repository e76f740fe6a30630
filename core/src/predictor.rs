//! Readiness-gated front door to the pipeline.
//!
//! A `Predictor` exists before startup finishes (so a server can accept
//! health checks) and answers `NotReady` until an `InferenceContext` has been
//! installed. The context can be installed exactly once.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::errors::{PictoError, Result};
use crate::pipeline::{self, InferenceContext};
use crate::prediction::PredictionRecord;

/// Readiness report, the service's health payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub ready: bool,
    pub vocab_size: usize,
    pub valid_tokens: usize,
    pub catalog_synsets: usize,
}

#[derive(Default)]
pub struct Predictor {
    context: OnceCell<InferenceContext>,
}

impl Predictor {
    /// A predictor with no context yet; every prediction fails with `NotReady`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A predictor that is ready immediately.
    pub fn with_context(context: InferenceContext) -> Self {
        Self {
            context: OnceCell::with_value(context),
        }
    }

    /// Install the startup product. A second install hands the context back.
    pub fn install(&self, context: InferenceContext) -> Result<(), InferenceContext> {
        self.context.set(context)?;
        tracing::info!("predictor ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.context.get().is_some()
    }

    pub fn context(&self) -> Result<&InferenceContext> {
        self.context.get().ok_or(PictoError::NotReady)
    }

    /// Full ranked prediction list.
    pub fn predict<S: AsRef<str>>(&self, prior_senses: &[S]) -> Result<Vec<PredictionRecord>> {
        pipeline::predict(self.context()?, prior_senses)
    }

    /// Ranked predictions capped at `limit`, or at the configured
    /// `max_predictions` when `limit` is `None`.
    pub fn predict_top<S: AsRef<str>>(
        &self,
        prior_senses: &[S],
        limit: Option<usize>,
    ) -> Result<Vec<PredictionRecord>> {
        let ctx = self.context()?;
        let mut predictions = pipeline::predict(ctx, prior_senses)?;
        if let Some(limit) = limit.or(ctx.config().max_predictions) {
            predictions.truncate(limit);
        }
        Ok(predictions)
    }

    pub fn status(&self) -> Status {
        match self.context.get() {
            Some(ctx) => Status {
                ready: true,
                vocab_size: ctx.index().index.len(),
                valid_tokens: ctx.index().valid.len(),
                catalog_synsets: ctx.catalog().synset_count(),
            },
            None => Status::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_before_install() {
        let predictor = Predictor::new();
        assert!(!predictor.is_ready());
        let err = predictor.predict::<&str>(&[]).unwrap_err();
        assert!(matches!(err, PictoError::NotReady));
        assert!(matches!(
            predictor.predict_top(&["dog%1:05:00::"], Some(3)),
            Err(PictoError::NotReady)
        ));
        assert_eq!(predictor.status(), Status::default());
    }
}

//! The masked language model, seen from the pipeline.
//!
//! The model is a black box: token ids plus attention mask in, one score per
//! vocabulary id out for the requested position. Backends that only expose
//! raw logits report `MaskScores::Logits` and the pipeline applies a softmax
//! over the full vocabulary.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PictoError, Result};
use crate::tokenizer::Encoding;

/// Model output at the mask position, one value per vocabulary id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum MaskScores {
    Probabilities(Vec<f32>),
    Logits(Vec<f32>),
}

impl MaskScores {
    pub fn len(&self) -> usize {
        match self {
            Self::Probabilities(v) | Self::Logits(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_probabilities(self) -> Vec<f32> {
        match self {
            Self::Probabilities(p) => p,
            Self::Logits(l) => softmax(&l),
        }
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return exps;
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// A masked language model collaborator.
///
/// Implementations must be shareable across request threads.
pub trait MaskedLanguageModel: Send + Sync {
    /// Scores over the whole vocabulary at `position` of `encoding`.
    fn mask_scores(&self, encoding: &Encoding, position: usize) -> Result<MaskScores>;
}

impl<M: MaskedLanguageModel + ?Sized> MaskedLanguageModel for Arc<M> {
    fn mask_scores(&self, encoding: &Encoding, position: usize) -> Result<MaskScores> {
        (**self).mask_scores(encoding, position)
    }
}

impl<M: MaskedLanguageModel + ?Sized> MaskedLanguageModel for Box<M> {
    fn mask_scores(&self, encoding: &Encoding, position: usize) -> Result<MaskScores> {
        (**self).mask_scores(encoding, position)
    }
}

/// Default cap on inference workers alive at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Runs an in-process model on a worker thread and gives up after `timeout`.
///
/// A timed-out worker is detached, not killed; its result is dropped when it
/// eventually finishes. Detached workers still count against
/// `max_in_flight`, and once the cap is reached requests fail with
/// `ModelBusy` instead of spawning more threads.
pub struct BoundedModel<M: ?Sized> {
    inner: Arc<M>,
    timeout: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Releases one in-flight slot when the worker is done (or never started).
struct InFlightSlot(Arc<AtomicUsize>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

impl<M: MaskedLanguageModel + ?Sized + 'static> BoundedModel<M> {
    pub fn new(inner: Arc<M>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cap on concurrently running workers, timed-out ones included. At least one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Workers currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(AtomicOrdering::SeqCst)
    }

    fn reserve(&self) -> Result<InFlightSlot> {
        let max = self.max_in_flight;
        self.in_flight
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .map_err(|in_flight| {
                tracing::warn!(in_flight, "inference workers exhausted");
                PictoError::ModelBusy { in_flight }
            })?;
        Ok(InFlightSlot(Arc::clone(&self.in_flight)))
    }
}

impl<M: MaskedLanguageModel + ?Sized + 'static> MaskedLanguageModel for BoundedModel<M> {
    fn mask_scores(&self, encoding: &Encoding, position: usize) -> Result<MaskScores> {
        let slot = self.reserve()?;
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let encoding = encoding.clone();
        thread::Builder::new()
            .name("pictobert-inference".into())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(inner.mask_scores(&encoding, position));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::warn!(timeout_ms, "inference timed out");
                Err(PictoError::ServiceUnavailable { timeout_ms })
            }
            Err(RecvTimeoutError::Disconnected) => Err(PictoError::Model(
                "inference worker exited without a result".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy(Duration);

    impl MaskedLanguageModel for Sleepy {
        fn mask_scores(&self, _: &Encoding, _: usize) -> Result<MaskScores> {
            thread::sleep(self.0);
            Ok(MaskScores::Probabilities(vec![1.0]))
        }
    }

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(p[0] < p[1] && p[1] < p[2]);
    }

    #[test]
    fn probabilities_pass_through_unchanged() {
        let scores = MaskScores::Probabilities(vec![0.2, 0.7, 0.1]);
        assert_eq!(scores.into_probabilities(), vec![0.2, 0.7, 0.1]);
    }

    #[test]
    fn scores_json_shape() {
        let json = r#"{"kind":"logits","values":[0.0,0.0]}"#;
        let scores: MaskScores = serde_json::from_str(json).unwrap();
        assert_eq!(scores, MaskScores::Logits(vec![0.0, 0.0]));
        assert_eq!(scores.into_probabilities(), vec![0.5, 0.5]);
    }

    #[test]
    fn bounded_model_returns_fast_results() {
        let model = BoundedModel::new(Arc::new(Sleepy(Duration::ZERO)), Duration::from_secs(5));
        let out = model.mask_scores(&Encoding::from_ids(vec![0]), 0).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn bounded_model_times_out() {
        let model = BoundedModel::new(
            Arc::new(Sleepy(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        let err = model.mask_scores(&Encoding::from_ids(vec![0]), 0).unwrap_err();
        assert!(matches!(err, PictoError::ServiceUnavailable { timeout_ms: 20 }));
    }

    #[test]
    fn hung_workers_are_capped() {
        let model = BoundedModel::new(
            Arc::new(Sleepy(Duration::from_millis(400))),
            Duration::from_millis(20),
        )
        .with_max_in_flight(1);
        let enc = Encoding::from_ids(vec![0]);

        let err = model.mask_scores(&enc, 0).unwrap_err();
        assert!(matches!(err, PictoError::ServiceUnavailable { .. }));
        assert_eq!(model.in_flight(), 1);

        // the timed-out worker still holds the only slot
        let err = model.mask_scores(&enc, 0).unwrap_err();
        assert!(matches!(err, PictoError::ModelBusy { in_flight: 1 }));
        assert_eq!(model.in_flight(), 1);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while model.in_flight() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(model.in_flight(), 0);
    }

    #[test]
    fn finished_workers_release_their_slot() {
        let model = BoundedModel::new(Arc::new(Sleepy(Duration::ZERO)), Duration::from_secs(5))
            .with_max_in_flight(1);
        let enc = Encoding::from_ids(vec![0]);
        for _ in 0..3 {
            assert!(model.mask_scores(&enc, 0).is_ok());
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while model.in_flight() > 0 && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(model.in_flight(), 0);
    }
}

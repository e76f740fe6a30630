//! Per-request prediction over an immutable inference context.
//!
//! `InferenceContext` bundles everything built at startup: tokenizer,
//! vocabulary index, valid-token set, catalog and the model collaborator.
//! `predict` only reads it, so one context serves any number of concurrent
//! requests without locking.
//!
//! Pipeline for one request:
//! 1. Append the mask marker and the terminator marker to the prior senses
//!    and tokenize
//! 2. Require exactly one mask position
//! 3. Ask the model for the distribution at that position and check it
//! 4. Restrict to valid tokens (no renormalization)
//! 5. Sort by probability descending, ties by ascending vocabulary id
//! 6. Join with the catalog's first record per synset, skipping misses

use std::cmp::Ordering;

use crate::catalog::PictogramCatalog;
use crate::errors::{PictoError, Result};
use crate::model::MaskedLanguageModel;
use crate::prediction::PredictionRecord;
use crate::synset::Canonicalize;
use crate::tokenizer::WordLevelTokenizer;
use crate::vocab::{BuiltIndex, ValidTokenSet, VocabIndexBuilder, Vocabulary};
use crate::{utils, Config};

/// A valid vocabulary id with its model probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredToken {
    pub id: u32,
    pub probability: f32,
}

/// Everything a prediction needs, built once at startup.
pub struct InferenceContext {
    config: Config,
    tokenizer: WordLevelTokenizer,
    built: BuiltIndex,
    catalog: PictogramCatalog,
    model: Box<dyn MaskedLanguageModel>,
    mask_id: u32,
}

impl InferenceContext {
    /// Assemble a context from already-built parts.
    ///
    /// Fails if the index was built for a different vocabulary size or the
    /// mask marker is not in the vocabulary.
    pub fn new(
        config: Config,
        tokenizer: WordLevelTokenizer,
        built: BuiltIndex,
        catalog: PictogramCatalog,
        model: Box<dyn MaskedLanguageModel>,
    ) -> Result<Self> {
        built.validate()?;
        if built.index.len() != tokenizer.vocab_size() {
            return Err(PictoError::InvalidVocabulary(format!(
                "index has {} entries but the vocabulary has {}",
                built.index.len(),
                tokenizer.vocab_size()
            )));
        }
        let mask_id = tokenizer
            .token_to_id(&config.mask_token)
            .ok_or_else(|| PictoError::MissingSpecialToken(config.mask_token.clone()))?;

        Ok(Self {
            config,
            tokenizer,
            built,
            catalog,
            model,
            mask_id,
        })
    }

    /// Startup path: canonicalize the vocabulary, build the index, assemble.
    pub fn build<C: Canonicalize + ?Sized>(
        config: Config,
        vocab: Vocabulary,
        catalog: PictogramCatalog,
        canonicalizer: &C,
        model: Box<dyn MaskedLanguageModel>,
    ) -> Result<Self> {
        let built = VocabIndexBuilder::new(canonicalizer).build(&vocab, &catalog)?;
        let tokenizer = WordLevelTokenizer::new(vocab, &config);
        Self::new(config, tokenizer, built, catalog, model)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokenizer(&self) -> &WordLevelTokenizer {
        &self.tokenizer
    }

    pub fn index(&self) -> &BuiltIndex {
        &self.built
    }

    pub fn catalog(&self) -> &PictogramCatalog {
        &self.catalog
    }

    pub fn mask_id(&self) -> u32 {
        self.mask_id
    }
}

/// Restrict `probabilities` to `valid` ids and rank them.
///
/// Order is probability descending, then vocabulary id ascending, so equal
/// scores always come out the same way.
pub fn rank_valid(probabilities: &[f32], valid: &ValidTokenSet) -> Vec<ScoredToken> {
    let mut scored: Vec<ScoredToken> = valid
        .iter()
        .filter_map(|id| {
            probabilities.get(id as usize).map(|&probability| ScoredToken { id, probability })
        })
        .collect();
    scored.sort_by(|a, b| match b.probability.total_cmp(&a.probability) {
        Ordering::Equal => a.id.cmp(&b.id),
        ordering => ordering,
    });
    scored
}

/// Predict the next pictograms after `prior_senses`.
///
/// The request is the prior senses, the mask marker and the terminator. The
/// terminator is dropped only when it can not be encoded at all (neither in
/// the vocabulary nor covered by an unknown-token fallback).
///
/// Catalog misses are skipped; an empty result is not an error. A
/// distribution value outside `[0, 1]` (NaN included) is a model error.
pub fn predict<S: AsRef<str>>(
    ctx: &InferenceContext,
    prior_senses: &[S],
) -> Result<Vec<PredictionRecord>> {
    let mut words: Vec<String> = prior_senses
        .iter()
        .map(|s| utils::normalize(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect();
    words.push(ctx.config.mask_token.clone());
    if ctx.tokenizer.can_encode(&ctx.config.terminator_token) {
        words.push(ctx.config.terminator_token.clone());
    }
    let text = words.join(" ");

    let encoding = ctx.tokenizer.encode(&text)?;
    let positions = encoding.positions_of(ctx.mask_id);
    let &[position] = positions.as_slice() else {
        return Err(PictoError::MalformedInput {
            found: positions.len(),
        });
    };
    tracing::debug!(input = %text, ids = ?encoding.ids, position, "encoded request");

    let probabilities = ctx.model.mask_scores(&encoding, position)?.into_probabilities();
    let vocab_size = ctx.built.index.len();
    if probabilities.len() != vocab_size {
        return Err(PictoError::Model(format!(
            "distribution has {} values, vocabulary has {}",
            probabilities.len(),
            vocab_size
        )));
    }
    if let Some((id, value)) = probabilities
        .iter()
        .enumerate()
        .find(|&(_, &p)| !(0.0..=1.0).contains(&p))
    {
        return Err(PictoError::Model(format!(
            "distribution value {} at id {} is not a probability",
            value, id
        )));
    }

    let ranked = rank_valid(&probabilities, &ctx.built.valid);
    let mut predictions = Vec::with_capacity(ranked.len());
    for scored in ranked {
        let Some(synset) = ctx.built.index.synset(scored.id) else {
            continue;
        };
        match ctx.catalog.first(synset.as_str()) {
            Some(record) => predictions.push(PredictionRecord {
                word_sense: record.word_sense.clone(),
                word: record.word.clone(),
                probability: scored.probability,
                pictogram_id: record.pictogram_id,
            }),
            None => tracing::warn!(synset = %synset, "no pictogram mapping for synset"),
        }
    }

    tracing::debug!(count = predictions.len(), "ranked predictions");
    Ok(predictions)
}

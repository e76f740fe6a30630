use anyhow::{Context, Result};
use pictobert::ServiceConfig;
use pictobert_core::{
    IndexEntry, PictogramCatalog, SenseIndex, SynsetCanonicalizer, VocabIndexBuilder, Vocabulary,
};
use serde_json::json;
use std::path::Path;

/// Build the vocabulary index from a data directory and report what it found.
///
/// With `snapshot`, also writes the built index as bincode.
pub fn run(config: &ServiceConfig, snapshot: Option<&Path>, show: usize) -> Result<serde_json::Value> {
    let vocab = Vocabulary::load(config.tokenizer_path())
        .with_context(|| format!("vocabulary {}", config.tokenizer_path().display()))?;
    let catalog = PictogramCatalog::load_csv(config.mapping_path())?;
    let senses = SenseIndex::load(config.sense_index_path())
        .with_context(|| format!("sense index {}", config.sense_index_path().display()))?;
    let canonicalizer = SynsetCanonicalizer::new(senses);
    let built = VocabIndexBuilder::new(&canonicalizer).build(&vocab, &catalog)?;

    // resolved synsets the mapping has no pictogram for
    let uncatalogued: Vec<&str> = built
        .index
        .entries()
        .iter()
        .filter_map(|e| match e {
            IndexEntry::Synset(id) if !catalog.contains(id.as_str()) => Some(id.as_str()),
            _ => None,
        })
        .collect();

    let sample: Vec<_> = built
        .valid
        .iter()
        .take(show)
        .filter_map(|id| {
            let synset = built.index.synset(id)?;
            let record = catalog.first(synset.as_str())?;
            Some(json!({
                "id": id,
                "token": vocab.token(id),
                "synset": synset.as_str(),
                "pictogram_id": record.pictogram_id,
                "word": record.word,
            }))
        })
        .collect();

    if let Some(path) = snapshot {
        built
            .save_bincode(path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
    }

    Ok(json!({
        "vocab_size": built.index.len(),
        "valid_tokens": built.valid.len(),
        "unresolved": built.index.unresolved_count(),
        "uncatalogued_synsets": uncatalogued.len(),
        "catalog_records": catalog.len(),
        "catalog_synsets": catalog.synset_count(),
        "sample": sample,
    }))
}

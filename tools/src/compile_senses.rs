use anyhow::{Context, Result};
use pictobert_core::SenseIndex;
use std::path::Path;

/// Compile a WordNet `index.sense` into the FST the service loads at startup.
pub fn run(input: &Path, out_fst: &Path) -> Result<usize> {
    let senses = SenseIndex::load_index_sense(input)
        .with_context(|| format!("reading {}", input.display()))?;
    senses
        .save_fst(out_fst)
        .with_context(|| format!("writing {}", out_fst.display()))?;

    // read back so a truncated write fails here rather than at service startup
    let compiled = SenseIndex::load_fst(out_fst)?;
    anyhow::ensure!(
        compiled.len() == senses.len(),
        "compiled index has {} keys, expected {}",
        compiled.len(),
        senses.len()
    );
    Ok(compiled.len())
}

//! Pictogram catalog: synset id -> pictogram records.
//!
//! The catalog is the ARASAAC mapping table, one CSV row per (synset,
//! pictogram) pair. A synset may carry several pictograms; rows sharing an id
//! are kept in file order and the first one is the representative used by the
//! prediction pipeline.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::{PictoError, Result};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictogramRecord {
    pub synset_id: String,
    pub pictogram_id: u32,
    pub word: String,
    pub word_sense: String,
}

impl PictogramRecord {
    pub fn new<S, W, K>(synset_id: S, pictogram_id: u32, word: W, word_sense: K) -> Self
    where
        S: Into<String>,
        W: Into<String>,
        K: Into<String>,
    {
        Self {
            synset_id: synset_id.into(),
            pictogram_id,
            word: word.into(),
            word_sense: word_sense.into(),
        }
    }
}

/// CSV row shape. Unknown columns (the unnamed index column pandas writes) are ignored.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    synset: String,
    pictogram_id: u32,
    word: String,
    #[serde(alias = "word_sense")]
    word_senses: String,
}

/// Immutable synset -> records index.
#[derive(Debug, Clone)]
pub struct PictogramCatalog {
    records: Vec<PictogramRecord>,
    // synset id -> indices into `records`, in load order
    by_synset: AHashMap<String, Vec<usize>>,
}

impl PictogramCatalog {
    /// Build a catalog from records in load order. An empty input is an error.
    pub fn from_records(records: Vec<PictogramRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(PictoError::EmptyCatalog);
        }
        let mut by_synset: AHashMap<String, Vec<usize>> = AHashMap::new();
        for (i, record) in records.iter().enumerate() {
            by_synset.entry(record.synset_id.clone()).or_default().push(i);
        }
        Ok(Self { records, by_synset })
    }

    /// Parse a CSV catalog with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (i, row) in rdr.deserialize::<CatalogRow>().enumerate() {
            let row = row.map_err(|e| PictoError::CatalogFormat {
                row: i + 1,
                message: e.to_string(),
            })?;
            if row.synset.is_empty() {
                return Err(PictoError::CatalogFormat {
                    row: i + 1,
                    message: "empty synset".into(),
                });
            }
            records.push(PictogramRecord {
                synset_id: row.synset,
                pictogram_id: row.pictogram_id,
                word: row.word,
                word_sense: row.word_senses,
            });
        }
        Self::from_records(records)
    }

    /// Load the catalog file. Missing, unreadable or empty files are fatal.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PictoError::CatalogMissing(path.to_path_buf()));
        }
        let f = File::open(path)?;
        let catalog = Self::from_csv_reader(f)?;
        tracing::info!(
            path = %path.display(),
            records = catalog.len(),
            synsets = catalog.synset_count(),
            "loaded pictogram catalog"
        );
        Ok(catalog)
    }

    /// All records for a synset, in load order. A miss is empty.
    pub fn lookup(&self, synset: &str) -> Vec<&PictogramRecord> {
        self.by_synset
            .get(synset)
            .map(|idx| idx.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// The representative record for a synset: the first one loaded.
    pub fn first(&self, synset: &str) -> Option<&PictogramRecord> {
        self.by_synset
            .get(synset)
            .and_then(|idx| idx.first())
            .map(|&i| &self.records[i])
    }

    pub fn contains(&self, synset: &str) -> bool {
        self.by_synset.contains_key(synset)
    }

    /// Distinct synset ids present in the catalog.
    pub fn synsets(&self) -> AHashSet<&str> {
        self.by_synset.keys().map(String::as_str).collect()
    }

    pub fn synset_count(&self) -> usize {
        self.by_synset.len()
    }

    pub fn records(&self) -> &[PictogramRecord] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING_CSV: &str = "\
,synset,pictogram_id,word,word_senses
0,10129825-n,2451,girl,girl%1:18:02::
1,02084071-n,7202,dog,dog%1:05:00::
2,10129825-n,9999,lass,lass%1:18:00::
";

    #[test]
    fn loads_rows_and_groups_by_synset() {
        let cat = PictogramCatalog::from_csv_reader(MAPPING_CSV.as_bytes()).unwrap();
        assert_eq!(cat.len(), 3);
        assert_eq!(cat.synset_count(), 2);
        let girls = cat.lookup("10129825-n");
        assert_eq!(girls.len(), 2);
        assert_eq!(girls[0].pictogram_id, 2451);
        assert_eq!(girls[1].pictogram_id, 9999);
    }

    #[test]
    fn first_loaded_row_is_representative() {
        let cat = PictogramCatalog::from_csv_reader(MAPPING_CSV.as_bytes()).unwrap();
        for _ in 0..3 {
            let rec = cat.first("10129825-n").unwrap();
            assert_eq!(rec.pictogram_id, 2451);
            assert_eq!(rec.word, "girl");
            assert_eq!(rec.word_sense, "girl%1:18:02::");
        }
    }

    #[test]
    fn miss_is_empty_not_error() {
        let cat = PictogramCatalog::from_csv_reader(MAPPING_CSV.as_bytes()).unwrap();
        assert!(cat.lookup("00000000-n").is_empty());
        assert!(cat.first("00000000-n").is_none());
        assert!(!cat.contains("00000000-n"));
    }

    #[test]
    fn accepts_word_sense_header_alias() {
        let csv = "synset,pictogram_id,word,word_sense\n02084071-n,7202,dog,dog%1:05:00::\n";
        let cat = PictogramCatalog::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(cat.first("02084071-n").unwrap().word_sense, "dog%1:05:00::");
    }

    #[test]
    fn header_only_catalog_is_empty_error() {
        let csv = ",synset,pictogram_id,word,word_senses\n";
        let err = PictogramCatalog::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PictoError::EmptyCatalog));
    }

    #[test]
    fn bad_pictogram_id_reports_row() {
        let csv = "synset,pictogram_id,word,word_senses\n02084071-n,7202,dog,dog%1:05:00::\n02084071-n,abc,dog,dog%1:05:00::\n";
        let err = PictogramCatalog::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PictoError::CatalogFormat { row: 2, .. }));
    }

    #[test]
    fn missing_file_is_catalog_missing() {
        let path = std::env::temp_dir().join("pictobert_no_such_mapping.csv");
        let err = PictogramCatalog::load_csv(&path).unwrap_err();
        assert!(matches!(err, PictoError::CatalogMissing(_)));
    }
}

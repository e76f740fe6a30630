//! Prediction output records and presentation helpers.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Default ARASAAC static image host.
pub const ARASAAC_IMAGE_BASE: &str = "https://static.arasaac.org/pictograms";

/// One ranked pictogram prediction.
///
/// `probability` is the raw model probability at the mask position. It is
/// not renormalized over the pictogram-eligible subset, so scores across a
/// response do not sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub word_sense: String,
    pub word: String,
    pub probability: f32,
    pub pictogram_id: u32,
}

impl PredictionRecord {
    pub fn label(&self) -> String {
        label_for_word_sense(&self.word_sense)
    }

    pub fn image_url(&self, base: &str) -> String {
        pictogram_image_url(base, self.pictogram_id)
    }
}

/// Response body shape: `{"predictions": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<PredictionRecord>,
}

/// Display label for a sense key: the lemma with underscores as spaces.
///
/// `ice_cream%1:13:00::` -> `ice cream`
pub fn label_for_word_sense(word_sense: &str) -> String {
    word_sense
        .split('%')
        .next()
        .unwrap_or_default()
        .replace('_', " ")
}

/// 500px PNG location for a pictogram id under `base`.
pub fn pictogram_image_url(base: &str, pictogram_id: u32) -> String {
    format!(
        "{}/{}/{}_500.png",
        base.trim_end_matches('/'),
        pictogram_id,
        pictogram_id
    )
}

/// Keep the first prediction for each pictogram id, preserving order.
///
/// The pipeline never does this itself; it is for callers that show one
/// tile per pictogram.
pub fn dedup_by_pictogram(predictions: Vec<PredictionRecord>) -> Vec<PredictionRecord> {
    let mut seen = AHashSet::new();
    predictions
        .into_iter()
        .filter(|p| seen.insert(p.pictogram_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(sense: &str, id: u32, p: f32) -> PredictionRecord {
        PredictionRecord {
            word_sense: sense.to_string(),
            word: label_for_word_sense(sense),
            probability: p,
            pictogram_id: id,
        }
    }

    #[test]
    fn labels_strip_sense_and_underscores() {
        assert_eq!(label_for_word_sense("girl%1:18:02::"), "girl");
        assert_eq!(label_for_word_sense("ice_cream%1:13:00::"), "ice cream");
        assert_eq!(label_for_word_sense("plain"), "plain");
    }

    #[test]
    fn image_url_layout() {
        assert_eq!(
            pictogram_image_url(ARASAAC_IMAGE_BASE, 2451),
            "https://static.arasaac.org/pictograms/2451/2451_500.png"
        );
        assert_eq!(pictogram_image_url("http://x/", 7), "http://x/7/7_500.png");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let out = dedup_by_pictogram(vec![
            rec("lass%1:18:00::", 10, 0.5),
            rec("dog%1:05:00::", 20, 0.3),
            rec("girl%1:18:02::", 10, 0.1),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].word_sense, "lass%1:18:00::");
        assert_eq!(out[1].pictogram_id, 20);
    }

    #[test]
    fn response_serializes_with_predictions_key() {
        let body = PredictResponse {
            predictions: vec![rec("dog%1:05:00::", 20, 0.25)],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["predictions"][0]["pictogram_id"], 20);
        assert_eq!(json["predictions"][0]["probability"], 0.25);
    }
}

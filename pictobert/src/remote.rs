//! Remote masked-language-model collaborator.
//!
//! The model runs in a separate inference server. Each request is one
//! blocking JSON POST with a client-side timeout:
//!
//! Request:  `{"input_ids": [...], "attention_mask": [...], "position": 3}`
//! Response: `{"kind": "probabilities" | "logits", "values": [...]}`
//!
//! Uses `reqwest` blocking client, so the service needs no async runtime.

use std::time::Duration;

use pictobert_core::{Encoding, MaskScores, MaskedLanguageModel, PictoError, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct MaskRequest<'a> {
    input_ids: &'a [u32],
    attention_mask: &'a [u32],
    position: usize,
}

/// HTTP client for an inference server.
pub struct RemoteModel {
    client: reqwest::blocking::Client,
    endpoint: String,
    timeout_ms: u64,
}

impl RemoteModel {
    /// Create a client for `endpoint`. A request that takes longer than
    /// `timeout` fails with `ServiceUnavailable`.
    pub fn new<S: Into<String>>(endpoint: S, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PictoError::Model(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn map_err(&self, e: reqwest::Error) -> PictoError {
        if e.is_timeout() {
            tracing::warn!(endpoint = %self.endpoint, timeout_ms = self.timeout_ms, "inference timed out");
            PictoError::ServiceUnavailable {
                timeout_ms: self.timeout_ms,
            }
        } else {
            PictoError::Model(format!("{}: {}", self.endpoint, e))
        }
    }
}

impl MaskedLanguageModel for RemoteModel {
    fn mask_scores(&self, encoding: &Encoding, position: usize) -> Result<MaskScores> {
        let body = MaskRequest {
            input_ids: &encoding.ids,
            attention_mask: &encoding.attention_mask,
            position,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.map_err(e))?;

        response.json::<MaskScores>().map_err(|e| self.map_err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let enc = Encoding::from_ids(vec![2, 7, 4, 5, 3]);
        let body = MaskRequest {
            input_ids: &enc.ids,
            attention_mask: &enc.attention_mask,
            position: 2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "input_ids": [2, 7, 4, 5, 3],
                "attention_mask": [1, 1, 1, 1, 1],
                "position": 2
            })
        );
    }

    #[test]
    fn new_keeps_settings() {
        let model = RemoteModel::new("http://127.0.0.1:8000/mask", Duration::from_millis(750)).unwrap();
        assert_eq!(model.endpoint(), "http://127.0.0.1:8000/mask");
        assert_eq!(model.timeout_ms(), 750);
    }

    // Requires a running inference server
    #[test]
    #[ignore]
    fn query_real_server() {
        let model = RemoteModel::new("http://127.0.0.1:8000/mask", Duration::from_secs(10)).unwrap();
        let scores = model
            .mask_scores(&Encoding::from_ids(vec![2, 4, 5, 3]), 1)
            .unwrap();
        assert!(!scores.is_empty());
    }
}

// ============================================================
// Layer 5 — llama.cpp Server Client
// ============================================================
// Talks to a local llama.cpp-compatible `/completion` endpoint.
//
//   GenerationRequest ─► per row: strip left padding
//                     ─► POST /completion (token ids, greedy)
//                     ─► row + generated tokens
//
// Rows of a group go out one blocking request after another, in
// row order. The group is still one `generate` call to the
// runner: any failed row fails the whole group.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::error::InferenceError;
use crate::domain::traits::{GenerationRequest, InferenceService};

/// Blocking client for a llama.cpp-compatible `/completion` endpoint.
///
/// The server accepts a prompt as raw token ids, so the prompt the
/// model sees is exactly the one built here. Each row is its own
/// sequential request.
pub struct LlamaServerClient {
    base_url:     String,
    client:       reqwest::blocking::Client,
    timeout_secs: u64,
}

impl LlamaServerClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn complete(
        &self,
        prompt:         &[u32],
        max_new_tokens: usize,
        do_sample:      bool,
    ) -> Result<Vec<u32>, InferenceError> {
        let url  = format!("{}/completion", self.base_url);
        let body = CompletionRequest {
            prompt,
            n_predict:     max_new_tokens,
            temperature:   if do_sample { 0.8 } else { 0.0 },
            top_k:         if do_sample { 40 } else { 1 },
            cache_prompt:  false,
            return_tokens: true,
            stream:        false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::Http(format!("Request timed out after {}s", self.timeout_secs))
                } else {
                    InferenceError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Server { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        parsed.tokens.ok_or_else(|| {
            InferenceError::ResponseParsing(
                "response has no `tokens` field; server must support return_tokens".to_string(),
            )
        })
    }
}

/// Request body for `/completion`
#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt:        &'a [u32],
    n_predict:     usize,
    temperature:   f32,
    top_k:         u32,
    cache_prompt:  bool,
    return_tokens: bool,
    stream:        bool,
}

/// Response body from `/completion`
#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    tokens: Option<Vec<u32>>,
}

impl InferenceService for LlamaServerClient {
    fn generate(&mut self, request: &GenerationRequest<'_>)
        -> Result<Vec<Vec<u32>>, InferenceError>
    {
        request
            .input_ids
            .iter()
            .zip(request.attention_mask.iter())
            .map(|(row, mask)| -> Result<Vec<u32>, InferenceError> {
                // Left padding is only there to align the batch; the
                // server gets the real tokens
                let pad = mask.iter().take_while(|&&m| m == 0).count();
                let new_tokens =
                    self.complete(&row[pad..], request.max_new_tokens, request.do_sample)?;

                let mut out = row.clone();
                out.extend(new_tokens);
                Ok(out)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialises_token_prompt() {
        let prompt = [5u32, 6, 7];
        let body = CompletionRequest {
            prompt:        &prompt,
            n_predict:     2048,
            temperature:   0.0,
            top_k:         1,
            cache_prompt:  false,
            return_tokens: true,
            stream:        false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["prompt"], serde_json::json!([5, 6, 7]));
        assert_eq!(json["n_predict"], 2048);
        assert_eq!(json["return_tokens"], true);
    }

    #[test]
    fn test_response_without_tokens_parses_to_none() {
        let r: CompletionResponse = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert!(r.tokens.is_none());
        let r: CompletionResponse = serde_json::from_str(r#"{"content":"hi","tokens":[1,2]}"#).unwrap();
        assert_eq!(r.tokens, Some(vec![1, 2]));
    }

    #[test]
    fn test_unreachable_server_is_an_inference_error() {
        // Bind an ephemeral port, then free it so nothing listens there
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url        = format!("http://127.0.0.1:{port}/");
        let mut client = LlamaServerClient::new(&url, 2).unwrap();
        let ids  = vec![vec![3u32, 4]];
        let mask = vec![vec![1u32, 1]];
        let req  = GenerationRequest {
            input_ids:      &ids,
            attention_mask: &mask,
            max_new_tokens: 4,
            do_sample:      false,
            pad_token_id:   0,
        };
        assert!(client.generate(&req).is_err());
    }
}

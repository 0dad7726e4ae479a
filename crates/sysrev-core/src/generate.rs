//! Generation client for an external text-generation service.
//!
//! The backend trait mirrors the rest of the crate's seams: a named remote
//! service queried through a shared `reqwest::Client` with a bounded timeout.
//! Callers wrap [`GenerationBackend::generate`] in a [`RetryPolicy`] via
//! [`generate_with_retry`]; exhausted retries are terminal for the one
//! section being generated, never for the whole run.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Error, Debug, Clone)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty completion")]
    Empty,
}

/// One generation call: instruction/prompt parts plus generation options.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// A text-generation service that can produce a prose fragment per prompt.
pub trait GenerationBackend: Send + Sync {
    /// The canonical name of this service (e.g., "Gemini").
    fn name(&self) -> &str;

    /// Generate text for the given request. Determinism is not guaranteed;
    /// the contract only bounds failure behavior.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>>;
}

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    pub api_key: String,
    pub model: String,
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
                self.model,
                urlencoding::encode(&self.api_key)
            );

            let body = json!({
                "system_instruction": {"parts": [{"text": request.system}]},
                "contents": [{"parts": [{"text": request.prompt}]}],
                "generationConfig": {
                    "temperature": request.temperature,
                    "maxOutputTokens": request.max_output_tokens,
                },
            });

            let resp = client
                .post(&url)
                .json(&body)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| GenerateError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(GenerateError::Status(status.as_u16()));
            }

            let data: Value = resp
                .json()
                .await
                .map_err(|e| GenerateError::Malformed(e.to_string()))?;

            let text = data["candidates"][0]["content"]["parts"]
                .as_array()
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p["text"].as_str())
                        .collect::<Vec<_>>()
                        .join("")
                })
                .ok_or_else(|| GenerateError::Malformed("no candidates".into()))?;

            if text.trim().is_empty() {
                return Err(GenerateError::Empty);
            }
            Ok(text)
        })
    }
}

/// Generate with bounded retry/backoff. Any error from the call — transient
/// network failures, rate limiting, malformed responses — is retried until
/// the policy is exhausted, then propagated.
pub async fn generate_with_retry(
    backend: &dyn GenerationBackend,
    request: &GenerationRequest,
    client: &reqwest::Client,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<String, GenerateError> {
    policy
        .run(|| backend.generate(request, client, timeout))
        .await
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted mock backend for tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A mock that returns responses in order, repeating the last one when
    /// the sequence is exhausted. Counts calls.
    pub struct MockBackend {
        responses: Mutex<Vec<Result<String, GenerateError>>>,
        fallback: Result<String, GenerateError>,
        call_count: AtomicUsize,
    }

    impl MockBackend {
        pub fn always(response: Result<String, GenerateError>) -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                fallback: response,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn with_sequence(mut responses: Vec<Result<String, GenerateError>>) -> Self {
            assert!(!responses.is_empty(), "sequence must not be empty");
            let fallback = responses.last().cloned().unwrap();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                fallback,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl GenerationBackend for MockBackend {
        fn name(&self) -> &str {
            "Mock"
        }

        fn generate<'a>(
            &'a self,
            _request: &'a GenerationRequest,
            _client: &'a reqwest::Client,
            _timeout: Duration,
        ) -> Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>> {
            Box::pin(async move {
                self.call_count.fetch_add(1, Ordering::SeqCst);
                let next = self.responses.lock().unwrap().pop();
                next.unwrap_or_else(|| self.fallback.clone())
            })
        }
    }
}

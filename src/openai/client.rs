use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{
    error_message, ChatCompletionRequest, ChatCompletionResponse, TranscriptionResponse,
};
use super::{TextGenerator, Transcriber};
use crate::config::{OpenAiConfig, RequestConfig};
use crate::error::{HttpError, HttpResult, ServiceError, ServiceResult};
use crate::validation::AudioUpload;

/// Client for the transcription and chat completion endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    transcription_model: String,
    chat_model: String,
    request_config: RequestConfig,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: &OpenAiConfig, request_config: RequestConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(HttpError::Reqwest)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            transcription_model: config.transcription_model.clone(),
            chat_model: config.chat_model.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run `attempt` until it succeeds or the retry budget is spent.
    ///
    /// Delays double after each failure starting at `retry_delay_ms`.
    async fn with_retry<T, F, Fut>(&self, operation: &str, attempt: F) -> HttpResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = HttpResult<T>>,
    {
        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    operation = operation,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying service request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match attempt().await {
                Ok(response) => {
                    info!(
                        operation = operation,
                        latency_ms = start.elapsed().as_millis(),
                        "Service call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        operation = operation,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Service call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        // Without retries the original error is more useful than a wrapper.
        match last_error {
            Some(e) if self.request_config.max_retries == 0 => Err(e),
            other => Err(HttpError::Unavailable {
                message: other
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Unknown error".to_string()),
                retries: retries.saturating_sub(1),
            }),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout {
                timeout_ms: self.request_config.timeout_ms,
            }
        } else {
            HttpError::Reqwest(e)
        }
    }

    /// Turn non-2xx statuses into [`HttpError::Api`].
    async fn check_status(response: Response) -> HttpResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(HttpError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    /// Send one audio file to `/v1/audio/transcriptions`.
    pub async fn transcribe_audio(&self, upload: &AudioUpload) -> HttpResult<String> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);

        let text = self
            .with_retry("transcription", || self.execute_transcription(&url, upload))
            .await?;

        if text.trim().is_empty() {
            return Err(HttpError::InvalidResponse {
                message: "Transcription returned no text".to_string(),
            });
        }
        Ok(text)
    }

    async fn execute_transcription(&self, url: &str, upload: &AudioUpload) -> HttpResult<String> {
        debug!(
            file_name = %upload.file_name,
            size_bytes = upload.size(),
            model = %self.transcription_model,
            "Calling transcription service"
        );

        // Multipart bodies are consumed on send, so each attempt builds its own.
        let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;

        let parsed: TranscriptionResponse =
            response
                .json()
                .await
                .map_err(|e| HttpError::InvalidResponse {
                    message: format!("Failed to parse transcription response: {}", e),
                })?;

        Ok(parsed.text)
    }

    /// Send one prompt to `/v1/chat/completions` and return the first choice.
    pub async fn complete(&self, request: ChatCompletionRequest) -> HttpResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .with_retry("generation", || self.execute_completion(&url, &request))
            .await?;

        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Err(HttpError::InvalidResponse {
                message: "Completion contained no content".to_string(),
            }),
        }
    }

    async fn execute_completion(
        &self,
        url: &str,
        request: &ChatCompletionRequest,
    ) -> HttpResult<ChatCompletionResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            prompt_chars = request.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Calling chat completion service"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| HttpError::InvalidResponse {
                message: format!("Failed to parse completion response: {}", e),
            })
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, upload: &AudioUpload) -> ServiceResult<String> {
        self.transcribe_audio(upload)
            .await
            .map_err(|e| ServiceError::Transcription {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> ServiceResult<String> {
        let request = ChatCompletionRequest::new(self.chat_model.clone(), prompt);
        self.complete(request)
            .await
            .map_err(|e| ServiceError::Generation {
                message: e.to_string(),
            })
    }
}

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{StatusCode, header};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::api::error::ApiError;
use crate::api::fragment::Fragment;
use crate::api::provider::{CompletionRequest, FragmentStream, Provider};
use crate::api::sse::{SseEvent, parse_sse_stream};

use super::types::{OpenAIMessage, OpenAIRequest, OpenAIStreamErrorBody, OpenAITool};
use super::{DEFAULT_API_URL, PROVIDER_NAME};

/// Streaming client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: reqwest::Client,
    url: String,
    model: String,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ApiError::Configuration("API key contains invalid characters".into()))?;
        headers.insert(header::AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: crate::api::util::normalize_chat_url(base_url, DEFAULT_API_URL),
            model: model.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: CompletionRequest) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .into_iter()
                .map(OpenAIMessage::from)
                .collect(),
            temperature: request.temperature,
            stream: true,
            tools: request
                .tools
                .map(|tools| tools.into_iter().map(OpenAITool::from).collect()),
            tool_choice: request.tool_choice,
        }
    }

    fn status_error(status: StatusCode, body: String) -> ApiError {
        let provider = PROVIDER_NAME.to_string();
        match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                provider,
                details: body,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationFailed {
                provider,
                details: body,
            },
            _ => ApiError::ServerError {
                provider,
                status_code: status.as_u16(),
                details: body,
            },
        }
    }

    fn convert_openai_stream(
        mut sse_stream: impl futures::Stream<Item = Result<SseEvent, ApiError>> + Unpin + Send + 'static,
        token: CancellationToken,
    ) -> impl futures::Stream<Item = Result<Fragment, ApiError>> + Send + 'static {
        async_stream::stream! {
            loop {
                if token.is_cancelled() {
                    yield Err(ApiError::Cancelled { provider: PROVIDER_NAME.to_string() });
                    break;
                }

                let event_result = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        yield Err(ApiError::Cancelled { provider: PROVIDER_NAME.to_string() });
                        break;
                    }
                    event = sse_stream.next() => event
                };

                let Some(event_result) = event_result else {
                    break;
                };

                let event = match event_result {
                    Ok(e) => e,
                    Err(e) => {
                        error!(target: "sluice::openai::stream", "SSE stream failed: {}", e);
                        yield Err(e);
                        break;
                    }
                };

                if event.data == "[DONE]" {
                    break;
                }

                if let Ok(body) = serde_json::from_str::<OpenAIStreamErrorBody>(&event.data) {
                    let details = body.error.message();
                    error!(target: "sluice::openai::stream", "In-band stream error: {}", details);
                    yield Err(ApiError::StreamError {
                        provider: PROVIDER_NAME.to_string(),
                        details,
                    });
                    break;
                }

                match serde_json::from_str::<Fragment>(&event.data) {
                    Ok(fragment) => yield Ok(fragment),
                    Err(e) => {
                        debug!(target: "sluice::openai::stream", "Failed to parse chunk: {} data: {}", e, event.data);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAIClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> Result<FragmentStream, ApiError> {
        let body = self.build_request(request);
        debug!(
            target: "sluice::openai",
            "Requesting completion model={} messages={} tools={}",
            body.model,
            body.messages.len(),
            body.tools.as_ref().map_or(0, Vec::len)
        );

        let send = self.http_client.post(&self.url).json(&body).send();
        let response = tokio::select! {
            () = token.cancelled() => {
                return Err(ApiError::Cancelled { provider: PROVIDER_NAME.to_string() });
            }
            response = send => response.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout { provider: PROVIDER_NAME.to_string() }
                } else {
                    ApiError::Network(e)
                }
            })?
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                target: "sluice::openai",
                "API error status={} body={}", status, body
            );
            return Err(Self::status_error(status, body));
        }

        let sse_stream = parse_sse_stream(response.bytes_stream());
        Ok(Box::pin(Self::convert_openai_stream(sse_stream, token)))
    }
}

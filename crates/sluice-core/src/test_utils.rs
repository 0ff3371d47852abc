//! Test utilities for sluice-core
//!
//! Shared by unit tests and the integration tests under `tests/`.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::api::fragment::Fragment;
use crate::api::provider::{CompletionRequest, FragmentStream, Provider};

enum Script {
    Stream(Vec<Result<Fragment, ApiError>>),
    Fail(ApiError),
}

/// A [`Provider`] that replays one scripted response per request and
/// records every request it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response that streams `fragments` and then ends normally.
    #[must_use]
    pub fn then_fragments(self, fragments: Vec<Fragment>) -> Self {
        self.then_stream(fragments.into_iter().map(Ok).collect())
    }

    /// Queue a response whose stream may fail part way through.
    #[must_use]
    pub fn then_stream(self, items: Vec<Result<Fragment, ApiError>>) -> Self {
        lock(&self.scripts).push_back(Script::Stream(items));
        self
    }

    /// Queue a request that fails before any fragment arrives.
    #[must_use]
    pub fn then_fail(self, error: ApiError) -> Self {
        lock(&self.scripts).push_back(Script::Fail(error));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        _token: CancellationToken,
    ) -> Result<FragmentStream, ApiError> {
        lock(&self.requests).push(request);
        match lock(&self.scripts).pop_front() {
            Some(Script::Stream(items)) => Ok(Box::pin(stream::iter(items))),
            Some(Script::Fail(error)) => Err(error),
            None => Err(ApiError::Configuration(
                "scripted provider has no response left".to_string(),
            )),
        }
    }
}

/// Split `text` into fragments of at most `chunk` characters.
pub fn text_fragments(text: &str, chunk: usize) -> Vec<Fragment> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk.max(1))
        .map(|part| Fragment::text(part.iter().collect::<String>()))
        .collect()
}

/// One tool call streamed the way OpenAI-compatible servers do: id and
/// name first, then the arguments in pieces of `chunk` characters.
pub fn tool_call_fragments(
    index: usize,
    id: &str,
    name: &str,
    arguments: &str,
    chunk: usize,
) -> Vec<Fragment> {
    let mut fragments = vec![Fragment::tool_call(index, Some(id), Some(name), Some(""))];
    let chars: Vec<char> = arguments.chars().collect();
    fragments.extend(chars.chunks(chunk.max(1)).map(|part| {
        let part: String = part.iter().collect();
        Fragment::tool_call(index, None, None, Some(part.as_str()))
    }));
    fragments
}

pub fn stream_error(details: &str) -> ApiError {
    ApiError::StreamError {
        provider: "scripted".to_string(),
        details: details.to_string(),
    }
}

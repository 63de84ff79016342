use std::time::Duration;

use bon::Builder;
use futures_util::stream::BoxStream;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::{
    error::{self, AssistantsError},
    event::RunEvent,
    request::CreateThreadAndRunRequest,
    streaming::RunEventReader,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Value of the `OpenAI-Beta` header selecting the Assistants API generation
pub const DEFAULT_BETA_HEADER: &str = "assistants=v2";

const BETA_HEADER_NAME: &str = "OpenAI-Beta";

/// Assistants API client
#[derive(Debug, Clone, Builder)]
pub struct Assistants {
    /// API key for authentication
    #[builder(into)]
    api_key: String,

    /// Base URL for the API (allows for custom endpoints)
    #[builder(default = DEFAULT_BASE_URL.to_string(), into)]
    pub base_url: String,

    /// `OpenAI-Beta` header value
    #[builder(default = DEFAULT_BETA_HEADER.to_string(), into)]
    pub beta_header: String,

    /// HTTP client for making requests
    #[builder(default)]
    client: reqwest::Client,

    /// Bound on waiting for the response headers
    pub response_timeout: Option<Duration>,

    /// Bound on the gap between two chunks of the event stream
    pub idle_timeout: Option<Duration>,
}

impl Assistants {
    /// Create a new client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder().api_key(api_key).build()
    }

    /// HTTP client with a connect timeout and no overall request timeout,
    /// since a streamed run may legitimately last for minutes
    pub fn http_client(connect_timeout: Duration) -> Result<reqwest::Client, AssistantsError> {
        Ok(reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?)
    }

    /// Create a thread and a streamed run on it in a single request
    ///
    /// Returns once the response headers arrived with a success status; the
    /// body is then read lazily through the returned reader. Exactly one
    /// request is made, there are no retries.
    pub async fn create_thread_and_run_stream(
        &self,
        request: &CreateThreadAndRunRequest,
    ) -> Result<RunEventReader, AssistantsError> {
        if self.api_key.is_empty() {
            return Err(AssistantsError::MissingApiKey);
        }

        let url = format!("{}/threads/runs", self.base_url.trim_end_matches('/'));
        debug!(%url, messages = request.messages().len(), "creating streamed run");

        let pending = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(BETA_HEADER_NAME, &self.beta_header)
            .json(request)
            .send();

        let response = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| AssistantsError::Timeout(limit))??,
            None => pending.await?,
        };

        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            let error = error::parse_error_response(status, &bytes);
            warn!(status = status.as_u16(), %error, "run request rejected");
            return Err(error);
        }

        Ok(RunEventReader::new(response).with_idle_timeout(self.idle_timeout))
    }

    /// Same as [`Self::create_thread_and_run_stream`], as a stream of events
    pub fn stream(
        &self,
        request: &CreateThreadAndRunRequest,
    ) -> BoxStream<'static, Result<RunEvent, AssistantsError>> {
        use async_stream::try_stream;
        use futures_util::StreamExt;

        let client = self.clone();
        let request = request.clone();

        Box::pin(try_stream! {
            let mut events = client.create_thread_and_run_stream(&request).await?.into_stream();
            while let Some(event) = events.next().await {
                yield event?;
            }
        })
    }
}

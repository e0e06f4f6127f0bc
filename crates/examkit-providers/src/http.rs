//! HTTP backends for question content and result persistence.
//!
//! Content: `GET {base_url}/questions?subject=..&test_type=..&count=..`
//! returning `{"subject": "..", "questions": [..]}`.
//! Results: `POST {base_url}/results` with the attempt record as JSON. The
//! session id is sent as `Idempotency-Key` so a retried submission can be
//! deduplicated by the server.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use examkit_core::model::{QuestionSet, TestSelection};
use examkit_core::report::AttemptRecord;
use examkit_core::traits::{ContentProvider, ResultStore};

use crate::error::{from_reqwest, from_status, ProviderError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Shared client state for both HTTP backends.
struct HttpBackend {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    fn new(base_url: &str, api_token: Option<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| from_reqwest(e, DEFAULT_TIMEOUT_SECS))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(from_status(status, body));
        }
        Ok(response)
    }
}

/// Fetches question sets from a remote content service.
pub struct HttpContentProvider {
    backend: HttpBackend,
}

impl HttpContentProvider {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            backend: HttpBackend::new(base_url, api_token)?,
        })
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, selection), fields(subject = %selection.subject))]
    async fn fetch_question_set(
        &self,
        selection: &TestSelection,
    ) -> Result<QuestionSet, ProviderError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/questions", self.backend.base_url),
            &[
                ("subject", selection.subject.clone()),
                ("test_type", selection.config.test_type.to_string()),
                ("count", selection.config.question_count.to_string()),
            ],
        )
        .map_err(|e| ProviderError::InvalidContent(format!("invalid content URL: {e}")))?;

        let response = self.backend.send(self.backend.client.get(url)).await?;
        let set: QuestionSet = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidContent(format!("failed to parse response: {e}")))?;

        debug!(questions = set.len(), "question set received");
        Ok(set)
    }
}

/// Posts attempt records to a remote result service.
pub struct HttpResultStore {
    backend: HttpBackend,
}

impl HttpResultStore {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            backend: HttpBackend::new(base_url, api_token)?,
        })
    }
}

#[async_trait]
impl ResultStore for HttpResultStore {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, record), fields(session = %record.id))]
    async fn persist(&self, record: &AttemptRecord) -> Result<(), ProviderError> {
        let req = self
            .backend
            .client
            .post(format!("{}/results", self.backend.base_url))
            .header("Idempotency-Key", record.id.to_string())
            .json(record);

        self.backend.send(req).await?;
        debug!("attempt stored");
        Ok(())
    }
}

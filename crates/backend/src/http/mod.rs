use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use practice_core::model::{
    AccessStatus, Subject, SubjectId, SubmissionPayload, SubmitResponse, TestConfig, TestSession,
    TestSessionId, TopicPage,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::client::{ApiError, PracticeBackend};

mod wire;

use wire::{
    AccessStatusDto, ErrorBody, StartTestRequest, SubjectsResponse, SubmitRequest,
    SubmitResponseDto, TestSessionDto, TopicsResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HttpConfigError {
    #[error("PRACTICE_API_BASE_URL is not set")]
    MissingBaseUrl,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    base_url: Url,
    api_token: Option<String>,
}

impl HttpBackendConfig {
    /// # Errors
    ///
    /// Returns `HttpConfigError::InvalidBaseUrl` if `base_url` does not parse.
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, HttpConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url =
            Url::parse(trimmed).map_err(|_| HttpConfigError::InvalidBaseUrl(base_url.into()))?;
        let api_token = api_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Ok(Self {
            base_url,
            api_token,
        })
    }

    /// Read `PRACTICE_API_BASE_URL` and the optional `PRACTICE_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `HttpConfigError` when the base URL is missing or invalid.
    pub fn from_env() -> Result<Self, HttpConfigError> {
        let base_url =
            env::var("PRACTICE_API_BASE_URL").map_err(|_| HttpConfigError::MissingBaseUrl)?;
        Self::new(&base_url, env::var("PRACTICE_API_TOKEN").ok())
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// `PracticeBackend` over the REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be constructed.
    pub fn new(config: HttpBackendConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.config.endpoint(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(self.config.endpoint(path)))
    }

    async fn send(request: RequestBuilder, call: Call) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        debug!(status = status.as_u16(), ?call, %message, "practice api call failed");
        Err(map_status(status, call, message))
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Which call a status code came from; some codes mean different things per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    ListSubjects,
    GetTopics,
    GenerateTopics,
    StartTest,
    AccessStatus,
    SubmitTest,
    DownloadPdf,
}

pub(crate) fn map_status(status: StatusCode, call: Call, message: String) -> ApiError {
    match status {
        StatusCode::PAYMENT_REQUIRED => ApiError::PaymentRequired,
        StatusCode::FORBIDDEN if call == Call::DownloadPdf => ApiError::PaymentRequired,
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        StatusCode::GONE => ApiError::SessionExpired,
        StatusCode::NOT_FOUND if call == Call::SubmitTest => ApiError::SessionExpired,
        StatusCode::NOT_FOUND if call == Call::StartTest => ApiError::NoQuestionsAvailable,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => ApiError::Unavailable,
        other => ApiError::Status {
            status: other.as_u16(),
            message,
        },
    }
}

fn join_ids(ids: &BTreeSet<SubjectId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl PracticeBackend for HttpBackend {
    async fn list_subjects(&self) -> Result<Vec<Subject>, ApiError> {
        let response = Self::send(self.get("subjects"), Call::ListSubjects).await?;
        let body: SubjectsResponse = response.json().await.map_err(transport_error)?;
        Ok(body.subjects.into_iter().map(Subject::from).collect())
    }

    async fn get_topics(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        page: u32,
        page_size: u32,
    ) -> Result<BTreeMap<SubjectId, TopicPage>, ApiError> {
        if subject_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let request = self.get("topics").query(&[
            ("subjectIds", join_ids(subject_ids)),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ]);
        let response = Self::send(request, Call::GetTopics).await?;
        let body: TopicsResponse = response.json().await.map_err(transport_error)?;
        body.into_pages(page_size)
    }

    async fn generate_more_topics(&self, subject_id: SubjectId) -> Result<(), ApiError> {
        let path = format!("subjects/{subject_id}/topics/generate");
        Self::send(self.post(&path), Call::GenerateTopics).await?;
        Ok(())
    }

    async fn start_test(&self, config: &TestConfig) -> Result<TestSession, ApiError> {
        let request = self.post("tests").json(&StartTestRequest::from(config));
        let response = Self::send(request, Call::StartTest).await?;
        let body: TestSessionDto = response.json().await.map_err(transport_error)?;
        body.into_session()
    }

    async fn get_access_status(&self) -> Result<AccessStatus, ApiError> {
        let response = Self::send(self.get("access-status"), Call::AccessStatus).await?;
        let body: AccessStatusDto = response.json().await.map_err(transport_error)?;
        Ok(body.into())
    }

    async fn submit_test(&self, payload: &SubmissionPayload) -> Result<SubmitResponse, ApiError> {
        let path = format!("tests/{}/submit", payload.session_id);
        let request = self.post(&path).json(&SubmitRequest::from(payload));
        let response = Self::send(request, Call::SubmitTest).await?;
        let body: SubmitResponseDto = response.json().await.map_err(transport_error)?;
        Ok(body.into())
    }

    async fn download_test_pdf(&self, test_id: TestSessionId) -> Result<Vec<u8>, ApiError> {
        let path = format!("tests/{test_id}/pdf");
        let response = Self::send(self.get(&path), Call::DownloadPdf).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

use std::time::Duration;

use bytes::Bytes;
use feed_logging::feed_debug;
use serde::de::DeserializeOwned;

use crate::{ApiError, JobId, JobKind, JobPayload, StartJobResponse};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// REST calls the job tracker issues. Failures are returned to the caller;
/// nothing here retries.
#[async_trait::async_trait]
pub trait JobsApi: Send + Sync {
    /// Starts a job, or reports the one already running.
    async fn start_job(&self, kind: JobKind) -> Result<StartJobResponse, ApiError>;

    async fn job_status(&self, kind: JobKind, job_id: JobId) -> Result<JobPayload, ApiError>;

    /// Acknowledgment only; the outcome arrives as a push event.
    async fn cancel_job(&self, kind: JobKind, job_id: JobId) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestJobsApi {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestJobsApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        reqwest::Url::parse(&settings.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        let raw = format!("{}/{}", self.base_url, path);
        reqwest::Url::parse(&raw).map_err(|err| ApiError::InvalidUrl(format!("{raw}: {err}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Bytes, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        response.bytes().await.map_err(map_reqwest_error)
    }

    async fn send_json<T: DeserializeOwned + Send>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait::async_trait]
impl JobsApi for ReqwestJobsApi {
    async fn start_job(&self, kind: JobKind) -> Result<StartJobResponse, ApiError> {
        let url = self.endpoint(&format!("jobs/{}", kind.path_segment()))?;
        feed_debug!("POST {}", url);
        self.send_json(self.client.post(url)).await
    }

    async fn job_status(&self, kind: JobKind, job_id: JobId) -> Result<JobPayload, ApiError> {
        let url = self.endpoint(&format!("jobs/{}/{job_id}", kind.path_segment()))?;
        feed_debug!("GET {}", url);
        let mut payload: JobPayload = self.send_json(self.client.get(url)).await?;
        // Bodies may omit what the path already names.
        payload.job_id.get_or_insert(job_id);
        payload.job_type.get_or_insert(kind);
        Ok(payload)
    }

    async fn cancel_job(&self, kind: JobKind, job_id: JobId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("jobs/{}/{job_id}/cancel", kind.path_segment()))?;
        feed_debug!("POST {}", url);
        self.send(self.client.post(url)).await.map(|_| ())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}

//! HTTP implementation of the conversion service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{multipart, Client, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::converter::EndpointDescriptor;
use crate::download::DownloadError;
use crate::file::{JobId, JobStatusSnapshot};

use super::error::{ServiceError, SubmitError, TransportError};
use super::traits::ConversionService;
use super::types::{extract_error_message, extract_job_id, FetchedBody, StatusResponse, UploadRequest};

/// Talks to the hosted conversion service over HTTP.
pub struct HttpConversionService {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpConversionService {
    /// Create a client for the configured service.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let parsed = Url::parse(&config.base_url).map_err(|e| ServiceError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ServiceError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// The API key is only sent back to the service's own origin.
    fn is_service_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(e.to_string())
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(
        &self,
        endpoint: &EndpointDescriptor,
        upload: UploadRequest,
    ) -> Result<JobId, SubmitError> {
        let url = self.url(endpoint.submit_path);
        let size = upload.payload.len() as u64;

        let part = multipart::Part::bytes(upload.payload.to_vec())
            .file_name(upload.file_name.clone());
        let mut form = multipart::Form::new().part(endpoint.file_field, part);
        for (name, value) in upload.fields {
            form = form.text(name, value);
        }

        debug!(url = %url, file = %upload.file_name, size, "Submitting conversion job");

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(transport_error(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Conversion service rejected submission");
            return Err(SubmitError::rejected(
                status.as_u16(),
                extract_error_message(&body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::Transport(transport_error(e).to_string()))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| SubmitError::MalformedResponse(e.to_string()))?;

        extract_job_id(&value, endpoint.job_id_field).ok_or_else(|| {
            SubmitError::MalformedResponse(format!("missing {}", endpoint.job_id_field))
        })
    }

    async fn poll_status(
        &self,
        endpoint: &EndpointDescriptor,
        job_id: &JobId,
    ) -> Result<JobStatusSnapshot, TransportError> {
        let url = self.url(&endpoint.status_path_for(job_id));

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: StatusResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Parse(e.to_string()))?;

        parsed.into_snapshot()
    }

    async fn download(&self, url: &Url) -> Result<FetchedBody, DownloadError> {
        let mut request = self.client.get(url.clone());
        if self.is_service_origin(url) {
            request = self.authorize(request);
        } else {
            debug!(host = ?url.host_str(), "Fetching artifact from foreign origin without credentials");
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Fetch(e.to_string()))?;

        Ok(FetchedBody {
            bytes,
            content_type,
        })
    }
}

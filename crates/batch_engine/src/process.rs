use std::time::Duration;

use batch_logging::{batch_debug, batch_warn};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

use crate::{FailureKind, ProcessError, ProcessedOutput, WorkItem};

/// Message shown when the endpoint gives no usable reason.
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to process";

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_response_bytes: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/api/image/process".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_response_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Performs exactly one processing attempt for one item.
#[async_trait::async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        item: &WorkItem,
        fields: &[(String, String)],
    ) -> Result<ProcessedOutput, ProcessError>;
}

/// Posts each item as multipart form data to the processing endpoint.
#[derive(Debug, Clone)]
pub struct ReqwestProcessor {
    settings: ProcessorSettings,
    endpoint: reqwest::Url,
    client: reqwest::Client,
}

impl ReqwestProcessor {
    pub fn new(settings: ProcessorSettings) -> Result<Self, ProcessError> {
        let endpoint = reqwest::Url::parse(&settings.endpoint)
            .map_err(|err| ProcessError::new(FailureKind::InvalidEndpoint, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ProcessError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            endpoint,
            client,
        })
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    fn build_form(item: &WorkItem, fields: &[(String, String)]) -> Form {
        let part = Part::bytes(item.bytes.to_vec()).file_name(item.file_name.clone());
        let part = match part.mime_str(&item.media_type) {
            Ok(part) => part,
            Err(err) => {
                batch_warn!(
                    "ignoring media type {:?} for {}: {}",
                    item.media_type,
                    item.file_name,
                    err
                );
                Part::bytes(item.bytes.to_vec()).file_name(item.file_name.clone())
            }
        };
        fields
            .iter()
            .fold(Form::new().part("file", part), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            })
    }
}

#[async_trait::async_trait]
impl Processor for ReqwestProcessor {
    async fn process(
        &self,
        item: &WorkItem,
        fields: &[(String, String)],
    ) -> Result<ProcessedOutput, ProcessError> {
        let form = Self::build_form(item, fields);
        batch_debug!(
            "posting {} ({} bytes, {} fields) to {}",
            item.file_name,
            item.bytes.len(),
            fields.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ProcessError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_message_from_body(&body),
            ));
        }

        let max_bytes = self.settings.max_response_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(too_large(max_bytes, content_len));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(max_bytes, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(ProcessedOutput {
            bytes: bytes.into(),
            content_type,
        })
    }
}

/// Pulls `error` out of a `{ "error": "..." }` body, or falls back to a generic message.
pub fn error_message_from_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
}

fn too_large(max_bytes: u64, actual: u64) -> ProcessError {
    ProcessError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> ProcessError {
    if err.is_timeout() {
        return ProcessError::new(FailureKind::Timeout, err.to_string());
    }
    ProcessError::new(FailureKind::Network, err.to_string())
}

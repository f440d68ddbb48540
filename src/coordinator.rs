use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::ClientError;
use crate::model::{
    AudioFile, DownloadRequest, DownloadResult, Operation, Outcome, Payload, Prediction,
    ResultData, SaveResult,
};

/// Anything that can turn an operation and its payload into an outcome
#[async_trait(?Send)]
pub trait FingerprintBackend {
    async fn perform(&self, operation: Operation, payload: Payload) -> Outcome;
}

#[derive(Deserialize)]
struct FindResponse {
    prediction: Prediction,
}

/// HTTP client for the fingerprinting service
///
/// Holds only configuration. Every call builds its own client, sends exactly
/// one request and never retries.
pub struct RequestCoordinator {
    base_url: String,
    timeout: Duration,
}

impl RequestCoordinator {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn endpoint_url(&self, operation: Operation) -> String {
        format!("{}{}", self.base_url, operation.endpoint())
    }

    async fn send(
        &self,
        operation: Operation,
        payload: Payload,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let request = client.post(self.endpoint_url(operation));

        let request = match payload {
            Payload::Audio(file) => request.multipart(multipart_form(file)?),
            Payload::SourceUrl(url) => request.json(&DownloadRequest { spotify_url: &url }),
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

fn multipart_form(file: AudioFile) -> Result<reqwest::multipart::Form, reqwest::Error> {
    let filename = file.filename().to_string();
    let mime_type = file.mime_type().to_string();
    let part = reqwest::multipart::Part::bytes(file.into_bytes())
        .file_name(filename)
        .mime_str(&mime_type)?;
    Ok(reqwest::multipart::Form::new().part("file", part))
}

#[async_trait(?Send)]
impl FingerprintBackend for RequestCoordinator {
    async fn perform(&self, operation: Operation, payload: Payload) -> Outcome {
        tracing::info!("POST {}", self.endpoint_url(operation));

        match self.send(operation, payload).await {
            Ok((status, body)) => {
                tracing::debug!("{:?} answered {} ({} bytes)", operation, status, body.len());
                interpret(operation, status, &body)
            }
            Err(e) => {
                tracing::warn!("{:?} request failed: {}", operation, e);
                Outcome::Failure(ClientError::TransportFailure {
                    operation,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Normalize a response into an outcome
///
/// A non-success status or `"status": "error"` is an application failure,
/// carrying the string `detail` when the body has one.
pub(crate) fn interpret(operation: Operation, status: StatusCode, body: &str) -> Outcome {
    let json: Option<Value> = serde_json::from_str(body).ok();
    let signals_error = json
        .as_ref()
        .and_then(|v| v.get("status"))
        .and_then(Value::as_str)
        == Some("error");

    if !status.is_success() || signals_error {
        let detail = json
            .as_ref()
            .and_then(|v| v.get("detail"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        return Outcome::Failure(ClientError::ApplicationFailure { operation, detail });
    }

    let Some(json) = json else {
        return Outcome::Failure(ClientError::MalformedResponse(
            "response body is not JSON".to_string(),
        ));
    };

    match parse_result(operation, json) {
        Ok(data) => Outcome::Success(data),
        Err(e) => Outcome::Failure(ClientError::MalformedResponse(e.to_string())),
    }
}

fn parse_result(operation: Operation, json: Value) -> Result<ResultData, serde_json::Error> {
    fn parse<T: DeserializeOwned>(json: Value) -> Result<T, serde_json::Error> {
        serde_json::from_value(json)
    }

    Ok(match operation {
        Operation::Save => ResultData::Saved(parse::<SaveResult>(json)?),
        Operation::Find => ResultData::Prediction(parse::<FindResponse>(json)?.prediction),
        Operation::DownloadFromSource => ResultData::Downloaded(parse::<DownloadResult>(json)?),
    })
}

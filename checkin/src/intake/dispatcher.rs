//! Where accepted scan attempts are sent.
//!
//! A dispatcher never fails: transport trouble and server errors come back as
//! [`ScanOutcome::Unavailable`] so the intake loop keeps running and the
//! operator sees a retry prompt.

use super::actions::ScanOutcome;
use crate::api::checkin::{CheckInRequest, CheckInResponse};
use crate::credential::Credential;
use crate::service::CheckInService;
use crate::types::{CheckInResult, DeviceId};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Operator text for outcomes that did not reach a decision
pub const RETRY_MESSAGE: &str = "Check-in service unavailable. Scan again.";

/// Sends a parsed credential to the check-in authority.
pub trait ScanDispatcher: Send + Sync {
    /// Verify one credential on behalf of `device`.
    fn dispatch(
        &self,
        credential: Credential,
        device: DeviceId,
    ) -> Pin<Box<dyn Future<Output = ScanOutcome> + Send>>;
}

/// In-process dispatcher for stations that share the server's process.
#[derive(Clone)]
pub struct LocalDispatcher {
    service: CheckInService,
}

impl LocalDispatcher {
    /// Dispatch into `service`.
    #[must_use]
    pub const fn new(service: CheckInService) -> Self {
        Self { service }
    }
}

impl ScanDispatcher for LocalDispatcher {
    fn dispatch(
        &self,
        credential: Credential,
        device: DeviceId,
    ) -> Pin<Box<dyn Future<Output = ScanOutcome> + Send>> {
        let service = self.service.clone();
        Box::pin(async move {
            match service.check_in(&credential, &device).await {
                Ok(result) => ScanOutcome::completed(result),
                Err(error) => {
                    tracing::warn!(%error, %device, "Local check-in failed");
                    ScanOutcome::Unavailable {
                        message: RETRY_MESSAGE.to_string(),
                    }
                },
            }
        })
    }
}

#[derive(Debug, Error)]
enum DispatchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unreadable response: {0}")]
    Decode(String),
}

/// Dispatcher that posts to a remote check-in server.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: Client,
    endpoint: String,
}

impl HttpDispatcher {
    /// Post to `{base_url}/api/checkin` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/checkin", base_url.trim_end_matches('/')),
        })
    }

    /// Endpoint this dispatcher posts to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        client: Client,
        endpoint: String,
        request: CheckInRequest,
    ) -> Result<CheckInResult, DispatchError> {
        let response = client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<CheckInResponse>()
                    .await
                    .map_err(|e| DispatchError::Decode(e.to_string()))?;
                body.into_result()
                    .ok_or_else(|| DispatchError::Decode("incomplete check-in response".into()))
            },
            status => {
                // Prefer the server's own message when the body is an AppError
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<serde_json::Value>(&text)
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                    .unwrap_or(text);
                Err(DispatchError::Status {
                    status: status.as_u16(),
                    message,
                })
            },
        }
    }
}

impl ScanDispatcher for HttpDispatcher {
    fn dispatch(
        &self,
        credential: Credential,
        device: DeviceId,
    ) -> Pin<Box<dyn Future<Output = ScanOutcome> + Send>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let request = CheckInRequest {
            payload: credential.to_string(),
            device_id: Some(device.as_str().to_string()),
        };

        Box::pin(async move {
            match Self::post(client, endpoint, request).await {
                Ok(result) => ScanOutcome::completed(result),
                Err(error) => {
                    tracing::warn!(%error, %device, "Remote check-in failed");
                    let message = match error {
                        DispatchError::Status { message, .. } if !message.is_empty() => message,
                        _ => RETRY_MESSAGE.to_string(),
                    };
                    ScanOutcome::Unavailable { message }
                },
            }
        })
    }
}

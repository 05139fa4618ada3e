use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;

use crate::error::{TrackingError, TrackingResult};

use super::models::{
    user_id_to_string, HistoryBody, LocationHistoryEntry, LocationUpdate, LoginBody,
    LoginRequest, LoginSuccess, MessageBody, RegisterRequest,
};

const GENERIC_FAILURE: &str = "An error occurred.";

/// Sink for location updates. Implemented by [`ApiClient`]; the reporter only
/// depends on this seam.
#[async_trait]
pub trait LocationUploader: Send + Sync {
    /// Sends one update and returns the HTTP status. Transport failures are
    /// errors; any status, including non-200, is `Ok`.
    async fn upload(&self, update: &LocationUpdate) -> Result<StatusCode>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, request: &RegisterRequest) -> TrackingResult<String> {
        let response = self
            .client
            .post(self.endpoint("/register"))
            .json(request)
            .send()
            .await
            .map_err(transport_failure("register"))?;

        let status = response.status();
        let body: MessageBody = response.json().await.unwrap_or_default();
        if status.is_success() {
            Ok(body
                .message
                .unwrap_or_else(|| "User registered successfully!".to_string()))
        } else {
            debug!("register rejected with status {status}");
            Err(TrackingError::Network(
                body.error.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ))
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> TrackingResult<LoginSuccess> {
        let response = self
            .client
            .post(self.endpoint("/login"))
            .json(request)
            .send()
            .await
            .map_err(transport_failure("login"))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body: MessageBody = response.json().await.unwrap_or_default();
            debug!("login rejected with status {status}");
            return Err(TrackingError::Network(
                body.error.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ));
        }

        let body: LoginBody = response.json().await.map_err(|err| {
            warn!("login response could not be parsed: {err}");
            TrackingError::Network(GENERIC_FAILURE.to_string())
        })?;
        let user_id = user_id_to_string(&body.user_id).ok_or_else(|| {
            warn!("login response carried no usable user_id: {}", body.user_id);
            TrackingError::Network(GENERIC_FAILURE.to_string())
        })?;

        Ok(LoginSuccess {
            message: body.message.unwrap_or_else(|| "Login successful!".to_string()),
            user_id,
        })
    }

    /// `GET /my-location`. An empty list is a valid answer; a `{error}` body or
    /// a non-200 status is a failed fetch.
    pub async fn location_history(
        &self,
        user_id: &str,
    ) -> TrackingResult<Vec<LocationHistoryEntry>> {
        let response = self
            .client
            .get(self.endpoint("/my-location"))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(transport_failure("location history"))?;

        let status = response.status();
        let body: HistoryBody = response.json().await.unwrap_or_default();

        if status != StatusCode::OK {
            debug!("location history failed with status {status}");
            return Err(TrackingError::Network(
                body.error.unwrap_or_else(|| "Something went wrong.".to_string()),
            ));
        }
        if let Some(error) = body.error {
            return Err(TrackingError::Network(error));
        }

        let rows = body
            .data
            .ok_or_else(|| TrackingError::Network("Something went wrong.".to_string()))?;
        Ok(rows.into_iter().map(LocationHistoryEntry::from).collect())
    }
}

#[async_trait]
impl LocationUploader for ApiClient {
    async fn upload(&self, update: &LocationUpdate) -> Result<StatusCode> {
        let response = self
            .client
            .post(self.endpoint("/update-location"))
            .json(update)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send location update: {}", e))?;

        Ok(response.status())
    }
}

fn transport_failure(action: &'static str) -> impl Fn(reqwest::Error) -> TrackingError {
    move |err| {
        warn!("{action} request failed: {err}");
        TrackingError::Network(GENERIC_FAILURE.to_string())
    }
}

pub mod client;
pub mod models;

pub use client::{ApiClient, LocationUploader};
pub use models::{
    LocationHistoryEntry, LocationUpdate, LoginRequest, LoginSuccess, RegisterRequest,
};

use anyhow::{Context, Result};

use crate::config::AppConfig;

/// Builds the shared client. No request timeout is set beyond reqwest's
/// defaults; a hung update only delays its own outcome.
pub fn client_from_config(config: &AppConfig) -> Result<ApiClient> {
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    Ok(ApiClient::new(http, config.api_base_url.clone()))
}

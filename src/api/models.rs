//! Request and response bodies for the tracking service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /update-location`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccess {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistoryEntry {
    pub latitude: f64,
    pub longitude: f64,
    /// Server-formatted capture time, kept verbatim.
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    #[serde(default)]
    pub message: Option<String>,
    pub user_id: Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryBody {
    #[serde(default)]
    pub data: Option<Vec<(f64, f64, Value)>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The server hands out numeric ids; the client stores them as strings.
pub(crate) fn user_id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

impl From<(f64, f64, Value)> for LocationHistoryEntry {
    fn from((latitude, longitude, timestamp): (f64, f64, Value)) -> Self {
        let timestamp = match timestamp {
            Value::String(text) => text,
            other => other.to_string(),
        };
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }
}

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::{SAMPLE_DISTANCE_M, SAMPLE_INTERVAL};

use super::LocationSample;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub interval_ms: u64,
    pub distance_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            interval_ms: SAMPLE_INTERVAL.as_millis() as u64,
            distance_m: SAMPLE_DISTANCE_M,
        }
    }
}

/// What the platform pushes into an active watch.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Sample(LocationSample),
    Error(String),
}

pub type SampleSink = mpsc::UnboundedSender<SourceEvent>;

pub type WatchId = u32;

/// The host operating system's geolocation service.
///
/// Watch callbacks may fire on platform threads with no async runtime, so
/// samples are handed over through an unbounded channel rather than a
/// callback into the controller.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn request_foreground_permission(&self) -> Result<PermissionState>;

    /// Needed for the background task variant. Only asked after the
    /// foreground grant.
    async fn request_background_permission(&self) -> Result<PermissionState>;

    fn watch_position(&self, options: WatchOptions, sink: SampleSink) -> Result<WatchId>;

    fn clear_watch(&self, id: WatchId) -> Result<()>;

    /// One-shot fix, used by the background task.
    async fn current_position(&self, options: WatchOptions) -> Result<LocationSample>;
}

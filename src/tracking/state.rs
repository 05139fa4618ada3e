use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::LocationSample;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    Stopped,
    Tracking,
}

impl Default for TrackingStatus {
    fn default() -> Self {
        TrackingStatus::Stopped
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReportStatus {
    Success,
    Failure,
}

/// Result of forwarding one sample. Lives in memory only and is replaced by
/// whichever report completes next.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutcome {
    pub status: ReportStatus,
    pub sample: LocationSample,
    pub completed_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl ReportOutcome {
    pub fn success(sample: LocationSample) -> Self {
        Self {
            status: ReportStatus::Success,
            sample,
            completed_at: Utc::now(),
            reason: None,
        }
    }

    pub fn failure(sample: LocationSample, reason: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Failure,
            sample,
            completed_at: Utc::now(),
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Success
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub status: TrackingStatus,
    pub last_sample: Option<LocationSample>,
    pub last_outcome: Option<ReportOutcome>,
    /// A start or stop is in progress; the UI disables its controls.
    pub busy: bool,
    pub reports_in_flight: u32,
    /// Bumped on every transition. Work tagged with an older generation is
    /// stale and must not touch the state.
    #[serde(skip)]
    pub generation: u64,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.status == TrackingStatus::Tracking
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.is_tracking() && self.generation == generation
    }

    /// Enters `Tracking` and returns the generation the new observers belong to.
    pub fn begin_tracking(&mut self) -> u64 {
        self.status = TrackingStatus::Tracking;
        self.generation = self.generation.wrapping_add(1);
        self.last_sample = None;
        self.last_outcome = None;
        self.reports_in_flight = 0;
        self.generation
    }

    pub fn stop(&mut self) {
        self.status = TrackingStatus::Stopped;
        self.generation = self.generation.wrapping_add(1);
        self.last_sample = None;
        self.last_outcome = None;
        self.reports_in_flight = 0;
    }

    pub fn record_sample(&mut self, sample: LocationSample, generation: u64) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.last_sample = Some(sample);
        self.reports_in_flight = self.reports_in_flight.saturating_add(1);
        true
    }

    /// Last write wins: whichever report completes last owns the slot.
    pub fn record_outcome(&mut self, outcome: ReportOutcome, generation: u64, apply: bool) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.reports_in_flight = self.reports_in_flight.saturating_sub(1);
        if apply {
            self.last_outcome = Some(outcome);
        }
        apply
    }
}

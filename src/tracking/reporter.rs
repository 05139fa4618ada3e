use log::{debug, warn};
use reqwest::StatusCode;
use std::sync::Arc;

use crate::{
    api::{LocationUpdate, LocationUploader},
    location::LocationSample,
};

use super::ReportOutcome;

/// Forwards one sample to `POST /update-location`.
///
/// Success means exactly HTTP 200. Anything else, including a transport
/// error, is a failure. Nothing is retried; the next sample is the retry.
#[derive(Clone)]
pub struct LocationReporter {
    uploader: Arc<dyn LocationUploader>,
}

impl LocationReporter {
    pub fn new(uploader: Arc<dyn LocationUploader>) -> Self {
        Self { uploader }
    }

    pub async fn report(&self, sample: &LocationSample, user_id: &str) -> ReportOutcome {
        let update = LocationUpdate {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.timestamp,
            user_id: user_id.to_string(),
        };

        match self.uploader.upload(&update).await {
            Ok(StatusCode::OK) => {
                debug!(
                    "Reported {:?} sample at {} for user {}",
                    sample.origin, sample.timestamp, user_id
                );
                ReportOutcome::success(sample.clone())
            }
            Ok(status) => {
                warn!("Location update rejected with status {status}");
                ReportOutcome::failure(sample.clone(), format!("server responded {status}"))
            }
            Err(err) => {
                warn!("Location update failed: {err:#}");
                ReportOutcome::failure(sample.clone(), err.to_string())
            }
        }
    }
}

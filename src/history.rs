use serde::Serialize;

use crate::{
    api::{ApiClient, LocationHistoryEntry},
    error::TrackingResult,
};

/// Outcome of a successful history fetch. A failed fetch is an error, so the
/// caller always sees "no history" and "fetch failed" as different things.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "entries", rename_all = "camelCase")]
pub enum LocationHistory {
    Entries(Vec<LocationHistoryEntry>),
    Empty,
}

impl LocationHistory {
    pub fn entries(&self) -> &[LocationHistoryEntry] {
        match self {
            LocationHistory::Entries(entries) => entries,
            LocationHistory::Empty => &[],
        }
    }

    /// Where a map should center: the first entry in server order.
    pub fn focus(&self) -> Option<&LocationHistoryEntry> {
        self.entries().first()
    }
}

/// Fetches recent locations for `user_id`, in the order the server returns
/// them. Never cached.
pub async fn fetch_history(api: &ApiClient, user_id: &str) -> TrackingResult<LocationHistory> {
    let entries = api.location_history(user_id).await?;
    if entries.is_empty() {
        Ok(LocationHistory::Empty)
    } else {
        Ok(LocationHistory::Entries(entries))
    }
}

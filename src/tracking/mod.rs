pub mod background;
#[cfg(feature = "app")]
pub mod commands;
pub mod controller;
pub mod reporter;
pub mod state;

pub use background::{
    BackgroundContext, BackgroundEvent, BackgroundHandler, BackgroundScheduler, BackgroundTask,
    ContextHandler, PollingScheduler, BACKGROUND_TASK_ID,
};
pub use controller::TrackingController;
pub use reporter::LocationReporter;
pub use state::{ReportOutcome, ReportStatus, TrackingState, TrackingStatus};

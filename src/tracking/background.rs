//! The background location task.
//!
//! The host runs this outside the app's normal control flow, possibly with no
//! UI mounted. It shares no memory with the tracking controller: every run
//! re-opens the persisted session and builds its own reporter, and its
//! outcomes are only logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    api,
    config::AppConfig,
    location::{LocationSample, LocationSource, WatchOptions},
    session::SessionStore,
};

use super::{LocationReporter, ReportOutcome};

pub const BACKGROUND_TASK_ID: &str = "background-location-task";

#[derive(Debug, Clone)]
pub enum BackgroundEvent {
    Locations(Vec<LocationSample>),
    Error(String),
}

/// A task body the scheduler invokes with each delivery.
#[async_trait]
pub trait BackgroundHandler: Send + Sync {
    async fn handle(&self, event: BackgroundEvent);
}

/// Host facility that runs a named background task on its own schedule.
#[async_trait]
pub trait BackgroundScheduler: Send + Sync {
    async fn is_registered(&self, task_id: &str) -> Result<bool>;

    /// Starts deliveries for `task_id`. Registering an id that is already
    /// active must not produce a second stream of deliveries.
    async fn register(&self, task_id: &str, options: WatchOptions) -> Result<()>;

    async fn unregister(&self, task_id: &str) -> Result<()>;
}

pub struct BackgroundTask {
    session: SessionStore,
    reporter: LocationReporter,
}

impl BackgroundTask {
    pub fn new(session: SessionStore, reporter: LocationReporter) -> Self {
        Self { session, reporter }
    }

    pub async fn run(&self, event: BackgroundEvent) -> Vec<ReportOutcome> {
        let locations = match event {
            BackgroundEvent::Error(message) => {
                error!("Background location task error: {message}");
                return Vec::new();
            }
            BackgroundEvent::Locations(locations) => locations,
        };

        let session = match self.session.session().await {
            Ok(session) => session,
            Err(err) => {
                error!("Background task could not read session: {err:#}");
                return Vec::new();
            }
        };

        if !session.tracking_enabled {
            debug!("Background delivery ignored; tracking is off");
            return Vec::new();
        }
        let Some(user_id) = session.user_id else {
            warn!("Background delivery ignored; no user is logged in");
            return Vec::new();
        };

        let mut outcomes = Vec::with_capacity(locations.len());
        for sample in &locations {
            let outcome = self.reporter.report(sample, &user_id).await;
            if outcome.is_success() {
                debug!("Background location sent ({})", sample.timestamp);
            } else {
                warn!(
                    "Failed to send background location: {}",
                    outcome.reason.as_deref().unwrap_or("unknown error")
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Everything a background run may rebuild its collaborators from.
#[derive(Debug, Clone)]
pub struct BackgroundContext {
    pub session_path: PathBuf,
    pub config: AppConfig,
}

/// Handler used by the app: builds a fresh [`BackgroundTask`] for every
/// delivery from the persisted context.
pub struct ContextHandler {
    context: BackgroundContext,
}

impl ContextHandler {
    pub fn new(context: BackgroundContext) -> Self {
        Self { context }
    }

    fn build_task(&self) -> Result<BackgroundTask> {
        let session = SessionStore::new(self.context.session_path.clone())?;
        let client = api::client_from_config(&self.context.config)?;
        Ok(BackgroundTask::new(
            session,
            LocationReporter::new(Arc::new(client)),
        ))
    }
}

#[async_trait]
impl BackgroundHandler for ContextHandler {
    async fn handle(&self, event: BackgroundEvent) {
        match self.build_task() {
            Ok(task) => {
                task.run(event).await;
            }
            Err(err) => error!("Failed to set up background task: {err:#}"),
        }
    }
}

struct ScheduledTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// In-process scheduler: polls the location source on the task's interval
/// and hands each fix to the handler.
pub struct PollingScheduler {
    source: Arc<dyn LocationSource>,
    handler: Arc<dyn BackgroundHandler>,
    tasks: Mutex<HashMap<String, ScheduledTask>>,
}

impl PollingScheduler {
    pub fn new(source: Arc<dyn LocationSource>, handler: Arc<dyn BackgroundHandler>) -> Self {
        Self {
            source,
            handler,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BackgroundScheduler for PollingScheduler {
    async fn is_registered(&self, task_id: &str) -> Result<bool> {
        let tasks = self.tasks.lock().await;
        Ok(tasks
            .get(task_id)
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false))
    }

    async fn register(&self, task_id: &str, options: WatchOptions) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.get(task_id) {
            if !existing.handle.is_finished() {
                debug!("Background task {task_id} already registered");
                return Ok(());
            }
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(polling_loop(
            task_id.to_string(),
            self.source.clone(),
            self.handler.clone(),
            options,
            cancel_token.clone(),
        ));

        tasks.insert(
            task_id.to_string(),
            ScheduledTask {
                cancel_token,
                handle,
            },
        );
        info!("Background task {task_id} registered");
        Ok(())
    }

    async fn unregister(&self, task_id: &str) -> Result<()> {
        let removed = self.tasks.lock().await.remove(task_id);
        let Some(task) = removed else {
            return Ok(());
        };

        task.cancel_token.cancel();
        task.handle
            .await
            .with_context(|| format!("background task {task_id} failed to join"))?;
        info!("Background task {task_id} stopped");
        Ok(())
    }
}

async fn polling_loop(
    task_id: String,
    source: Arc<dyn LocationSource>,
    handler: Arc<dyn BackgroundHandler>,
    options: WatchOptions,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(Duration::from_millis(options.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the foreground watch covers that instant.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Each delivery runs on its own task so a hung fix or report
                // never holds up the next tick or shutdown.
                let source = source.clone();
                let handler = handler.clone();
                let cancel_token = cancel_token.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = deliver(source.as_ref(), handler.as_ref(), options) => {}
                        _ = cancel_token.cancelled() => {
                            debug!("Background delivery abandoned on shutdown");
                        }
                    }
                });
            }
            _ = cancel_token.cancelled() => {
                debug!("Background task {task_id} shutting down");
                break;
            }
        }
    }
}

async fn deliver(
    source: &dyn LocationSource,
    handler: &dyn BackgroundHandler,
    options: WatchOptions,
) {
    let event = match source.current_position(options).await {
        Ok(sample) => BackgroundEvent::Locations(vec![sample]),
        Err(err) => BackgroundEvent::Error(err.to_string()),
    };
    handler.handle(event).await;
}

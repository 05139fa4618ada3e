use std::sync::Arc;

use log::{debug, info, warn};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PermissionKind, TrackingError, TrackingResult},
    location::{
        LocationSample, LocationSource, SampleThrottle, SourceEvent, WatchId, WatchOptions,
    },
    session::SessionStore,
};

use super::{
    background::{BackgroundScheduler, BACKGROUND_TASK_ID},
    LocationReporter, ReportOutcome, TrackingState,
};

struct ActiveWatch {
    id: WatchId,
    cancel_token: CancellationToken,
    pump: JoinHandle<()>,
}

/// Owns the `Stopped` / `Tracking` state machine.
///
/// Starting arms a foreground watch and the background task and persists the
/// tracking flag; stopping undoes all three. Each delivered sample is reported
/// on its own task, so a slow request never holds up the next sample.
#[derive(Clone)]
pub struct TrackingController {
    state: Arc<Mutex<TrackingState>>,
    session: SessionStore,
    source: Arc<dyn LocationSource>,
    scheduler: Arc<dyn BackgroundScheduler>,
    reporter: LocationReporter,
    transition: Arc<Mutex<()>>,
    active_watch: Arc<Mutex<Option<ActiveWatch>>>,
    updates: Arc<watch::Sender<TrackingState>>,
}

impl TrackingController {
    pub fn new(
        session: SessionStore,
        source: Arc<dyn LocationSource>,
        scheduler: Arc<dyn BackgroundScheduler>,
        reporter: LocationReporter,
    ) -> Self {
        let (updates, _) = watch::channel(TrackingState::new());
        Self {
            state: Arc::new(Mutex::new(TrackingState::new())),
            session,
            source,
            scheduler,
            reporter,
            transition: Arc::new(Mutex::new(())),
            active_watch: Arc::new(Mutex::new(None)),
            updates: Arc::new(updates),
        }
    }

    pub async fn snapshot(&self) -> TrackingState {
        self.state.lock().await.clone()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<TrackingState> {
        self.updates.subscribe()
    }

    /// Restores tracking after a relaunch when the persisted flag says so.
    /// Permissions are requested again rather than assumed.
    pub async fn initialize(&self) -> TrackingResult<TrackingState> {
        let session = self.session.session().await.map_err(TrackingError::Storage)?;
        if !session.tracking_enabled {
            return Ok(self.snapshot().await);
        }

        if session.user_id.is_none() {
            warn!("Tracking flag was set without a user; clearing it");
            self.session
                .clear_tracking_enabled()
                .await
                .map_err(TrackingError::Storage)?;
            return Ok(self.snapshot().await);
        }

        info!("Resuming location tracking from previous launch");
        self.start().await
    }

    pub async fn start(&self) -> TrackingResult<TrackingState> {
        let _transition = self.transition.lock().await;

        if self.state.lock().await.is_tracking() {
            return Ok(self.snapshot().await);
        }

        if self
            .session
            .user_id()
            .await
            .map_err(TrackingError::Storage)?
            .is_none()
        {
            return Err(TrackingError::NotLoggedIn);
        }

        self.set_busy(true).await;

        let (watch_id, receiver) = match self.arm().await {
            Ok(armed) => armed,
            Err(err) => {
                self.set_busy(false).await;
                return Err(err);
            }
        };

        let generation = {
            let mut state = self.state.lock().await;
            let generation = state.begin_tracking();
            state.busy = false;
            generation
        };

        let cancel_token = CancellationToken::new();
        let pump = tokio::spawn(pump_samples(
            self.clone(),
            receiver,
            generation,
            cancel_token.clone(),
        ));
        *self.active_watch.lock().await = Some(ActiveWatch {
            id: watch_id,
            cancel_token,
            pump,
        });

        info!("Location tracking started");
        self.publish().await;
        Ok(self.snapshot().await)
    }

    /// `confirmed` is the user's answer to the stop prompt; without it this
    /// does nothing.
    pub async fn stop(&self, confirmed: bool) -> TrackingResult<TrackingState> {
        if !confirmed {
            debug!("Stop not confirmed; tracking left as is");
            return Ok(self.snapshot().await);
        }

        let _transition = self.transition.lock().await;

        {
            let mut state = self.state.lock().await;
            if !state.is_tracking() {
                return Ok(state.clone());
            }
            state.stop();
            state.busy = true;
        }
        self.publish().await;

        // Flag first: teardown below may stall on the platform.
        let cleared = self.session.clear_tracking_enabled().await;

        let active = self.active_watch.lock().await.take();
        if let Some(active) = active {
            active.cancel_token.cancel();
            if let Err(err) = self.source.clear_watch(active.id) {
                warn!("Failed to clear location watch: {err:#}");
            }
            if let Err(err) = active.pump.await {
                warn!("Location pump failed to join: {err}");
            }
        }

        if let Err(err) = self.scheduler.unregister(BACKGROUND_TASK_ID).await {
            warn!("Failed to stop background location task: {err:#}");
        }

        self.set_busy(false).await;
        cleared.map_err(TrackingError::Storage)?;

        info!("Location tracking stopped");
        Ok(self.snapshot().await)
    }

    /// Entry point for a sample of either origin delivered to this process
    /// while tracking. Returns the outcome if it was applied to the state.
    pub async fn deliver(&self, sample: LocationSample) -> Option<ReportOutcome> {
        let generation = {
            let state = self.state.lock().await;
            if !state.is_tracking() {
                debug!("Dropping sample delivered while stopped");
                return None;
            }
            state.generation
        };
        self.handle_sample(sample, generation).await
    }

    async fn arm(&self) -> TrackingResult<(WatchId, mpsc::UnboundedReceiver<SourceEvent>)> {
        let foreground = self
            .source
            .request_foreground_permission()
            .await
            .map_err(TrackingError::Platform)?;
        if !foreground.is_granted() {
            warn!("Foreground location permission denied");
            return Err(TrackingError::PermissionDenied(PermissionKind::Foreground));
        }

        let background = self
            .source
            .request_background_permission()
            .await
            .map_err(TrackingError::Platform)?;
        if !background.is_granted() {
            warn!("Background location permission denied");
            return Err(TrackingError::PermissionDenied(PermissionKind::Background));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let watch_id = self
            .source
            .watch_position(WatchOptions::default(), sender)
            .map_err(TrackingError::Platform)?;

        if let Err(err) = self.ensure_background_task().await {
            self.release_watch(watch_id);
            return Err(TrackingError::Platform(err));
        }

        if let Err(err) = self.session.set_tracking_enabled().await {
            self.release_watch(watch_id);
            if let Err(unregister_err) = self.scheduler.unregister(BACKGROUND_TASK_ID).await {
                warn!("Failed to roll back background task: {unregister_err:#}");
            }
            return Err(TrackingError::Storage(err));
        }

        Ok((watch_id, receiver))
    }

    async fn ensure_background_task(&self) -> anyhow::Result<()> {
        if self.scheduler.is_registered(BACKGROUND_TASK_ID).await? {
            debug!("Background task {BACKGROUND_TASK_ID} already registered");
            return Ok(());
        }
        self.scheduler
            .register(BACKGROUND_TASK_ID, WatchOptions::default())
            .await
    }

    fn release_watch(&self, id: WatchId) {
        if let Err(err) = self.source.clear_watch(id) {
            warn!("Failed to roll back location watch: {err:#}");
        }
    }

    async fn handle_sample(
        &self,
        sample: LocationSample,
        generation: u64,
    ) -> Option<ReportOutcome> {
        if !self.state.lock().await.record_sample(sample.clone(), generation) {
            return None;
        }
        self.publish().await;

        let user_id = match self.session.user_id().await {
            Ok(user_id) => user_id,
            Err(err) => {
                warn!("Could not read user for location report: {err:#}");
                None
            }
        };

        let outcome = match &user_id {
            Some(user_id) => self.reporter.report(&sample, user_id).await,
            None => ReportOutcome::failure(sample, "No user is logged in."),
        };

        // The session may have changed hands while the request was in flight.
        let same_user = user_id.is_some()
            && matches!(self.session.user_id().await, Ok(current) if current == user_id);

        let applied = self
            .state
            .lock()
            .await
            .record_outcome(outcome.clone(), generation, same_user);
        self.publish().await;

        if applied {
            Some(outcome)
        } else {
            debug!("Discarding stale report outcome");
            None
        }
    }

    async fn set_busy(&self, busy: bool) {
        self.state.lock().await.busy = busy;
        self.publish().await;
    }

    async fn publish(&self) {
        let snapshot = self.state.lock().await.clone();
        self.updates.send_replace(snapshot);
    }
}

async fn pump_samples(
    controller: TrackingController,
    mut receiver: mpsc::UnboundedReceiver<SourceEvent>,
    generation: u64,
    cancel_token: CancellationToken,
) {
    let mut throttle = SampleThrottle::default();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = receiver.recv() => match event {
                Some(SourceEvent::Sample(sample)) => {
                    if !throttle.admit(&sample) {
                        continue;
                    }
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        controller.handle_sample(sample, generation).await;
                    });
                }
                Some(SourceEvent::Error(message)) => {
                    warn!("Foreground location watch error: {message}");
                }
                None => break,
            },
        }
    }

    debug!("Location pump for generation {generation} exited");
}

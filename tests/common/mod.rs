//! Shared fakes for the tracking integration tests.
//!
//! `spawn_server` runs a real HTTP listener on localhost so the reqwest client is
//! exercised end to end. The location source, background scheduler, and
//! uploader fakes let tests drive deliveries and hold reports in flight.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::Router;
use reqwest::StatusCode;
use tempfile::TempDir;
use tokio::sync::{oneshot, watch, Notify, Semaphore};

use trackme_lib::{
    api::{ApiClient, LocationUpdate, LocationUploader},
    location::{
        LocationSample, LocationSource, PermissionState, SampleOrigin, SampleSink, SourceEvent,
        WatchId, WatchOptions,
    },
    session::SessionStore,
    tracking::{
        BackgroundEvent, BackgroundHandler, BackgroundScheduler, LocationReporter,
        TrackingController, TrackingState,
    },
};

pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

pub fn api_client(base_url: &str) -> ApiClient {
    ApiClient::new(reqwest::Client::new(), base_url)
}

pub fn sample(timestamp: i64, origin: SampleOrigin) -> LocationSample {
    LocationSample::new(28.6139, 77.2090, timestamp, origin)
}

pub struct TestSession {
    pub store: SessionStore,
    _dir: TempDir,
}

impl TestSession {
    pub async fn logged_in(user_id: &str) -> Self {
        let session = Self::empty();
        session.store.set_user_id(user_id).await.unwrap();
        session
    }

    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session.json")).unwrap();
        Self { store, _dir: dir }
    }
}

pub struct FakeSource {
    foreground: PermissionState,
    background: PermissionState,
    pub foreground_requests: AtomicUsize,
    pub background_requests: AtomicUsize,
    sinks: Mutex<HashMap<WatchId, SampleSink>>,
    next_id: AtomicUsize,
    pub cleared: Mutex<Vec<WatchId>>,
}

impl FakeSource {
    pub fn new(foreground: PermissionState, background: PermissionState) -> Self {
        Self {
            foreground,
            background,
            foreground_requests: AtomicUsize::new(0),
            background_requests: AtomicUsize::new(0),
            sinks: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            cleared: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }

    pub fn active_watches(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    /// Pushes an event into every active watch, as the platform would.
    pub fn emit(&self, event: SourceEvent) {
        for sink in self.sinks.lock().unwrap().values() {
            let _ = sink.send(event.clone());
        }
    }
}

#[async_trait]
impl LocationSource for FakeSource {
    async fn request_foreground_permission(&self) -> Result<PermissionState> {
        self.foreground_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.foreground)
    }

    async fn request_background_permission(&self) -> Result<PermissionState> {
        self.background_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.background)
    }

    fn watch_position(&self, _options: WatchOptions, sink: SampleSink) -> Result<WatchId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as WatchId;
        self.sinks.lock().unwrap().insert(id, sink);
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) -> Result<()> {
        self.sinks.lock().unwrap().remove(&id);
        self.cleared.lock().unwrap().push(id);
        Ok(())
    }

    async fn current_position(&self, _options: WatchOptions) -> Result<LocationSample> {
        Ok(sample(0, SampleOrigin::Background))
    }
}

#[derive(Default)]
pub struct FakeScheduler {
    registered: Mutex<HashSet<String>>,
    pub register_calls: AtomicUsize,
    pub unregister_calls: AtomicUsize,
}

impl FakeScheduler {
    pub fn is_active(&self, task_id: &str) -> bool {
        self.registered.lock().unwrap().contains(task_id)
    }
}

#[async_trait]
impl BackgroundScheduler for FakeScheduler {
    async fn is_registered(&self, task_id: &str) -> Result<bool> {
        Ok(self.is_active(task_id))
    }

    async fn register(&self, task_id: &str, _options: WatchOptions) -> Result<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.lock().unwrap().insert(task_id.to_string());
        Ok(())
    }

    async fn unregister(&self, task_id: &str) -> Result<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.lock().unwrap().remove(task_id);
        Ok(())
    }
}

/// Background task body whose report never completes.
#[derive(Default)]
pub struct StuckHandler {
    pub entered: Notify,
}

#[async_trait]
impl BackgroundHandler for StuckHandler {
    async fn handle(&self, _event: BackgroundEvent) {
        self.entered.notify_one();
        std::future::pending::<()>().await;
    }
}

/// Answers 200 unless told otherwise. A sample timestamp can be held so its
/// upload stays in flight until the test releases it.
pub struct ScriptedUploader {
    replies: Mutex<HashMap<i64, Result<StatusCode, String>>>,
    gates: Mutex<HashMap<i64, oneshot::Receiver<()>>>,
    pub uploads: Mutex<Vec<LocationUpdate>>,
    entered: Semaphore,
}

impl Default for ScriptedUploader {
    fn default() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
            entered: Semaphore::new(0),
        }
    }
}

impl ScriptedUploader {
    /// Resolves once another upload has started.
    pub async fn wait_entered(&self) {
        self.entered
            .acquire()
            .await
            .expect("upload semaphore closed")
            .forget();
    }

    pub fn reply(&self, timestamp: i64, reply: Result<StatusCode, String>) {
        self.replies.lock().unwrap().insert(timestamp, reply);
    }

    pub fn hold(&self, timestamp: i64) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates.lock().unwrap().insert(timestamp, gate);
        release
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl LocationUploader for ScriptedUploader {
    async fn upload(&self, update: &LocationUpdate) -> Result<StatusCode> {
        self.uploads.lock().unwrap().push(update.clone());
        let gate = self.gates.lock().unwrap().remove(&update.timestamp);
        self.entered.add_permits(1);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&update.timestamp)
            .cloned()
            .unwrap_or(Ok(StatusCode::OK));
        reply.map_err(|message| anyhow!(message))
    }
}

pub struct Harness {
    pub controller: TrackingController,
    pub source: Arc<FakeSource>,
    pub scheduler: Arc<FakeScheduler>,
    pub uploader: Arc<ScriptedUploader>,
    pub session: TestSession,
}

impl Harness {
    pub async fn new(source: FakeSource) -> Self {
        Self::with_session(source, TestSession::logged_in("42").await)
    }

    pub fn with_session(source: FakeSource, session: TestSession) -> Self {
        let source = Arc::new(source);
        let scheduler = Arc::new(FakeScheduler::default());
        let uploader = Arc::new(ScriptedUploader::default());
        let controller = TrackingController::new(
            session.store.clone(),
            source.clone(),
            scheduler.clone(),
            LocationReporter::new(uploader.clone()),
        );
        Self {
            controller,
            source,
            scheduler,
            uploader,
            session,
        }
    }
}

pub async fn wait_for<F>(updates: &mut watch::Receiver<TrackingState>, mut done: F) -> TrackingState
where
    F: FnMut(&TrackingState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = updates.borrow_and_update();
                if done(&*current) {
                    return (*current).clone();
                }
            }
            updates.changed().await.expect("controller dropped");
        }
    })
    .await
    .expect("timed out waiting for tracking state")
}

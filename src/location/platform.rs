//! Host implementations of [`LocationSource`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{LocationSample, LocationSource, PermissionState, SampleSink, WatchId, WatchOptions};

/// Used where the host has no GPS (desktop builds). Permission requests are
/// answered with `Denied` so tracking never starts.
pub struct UnsupportedSource;

#[async_trait]
impl LocationSource for UnsupportedSource {
    async fn request_foreground_permission(&self) -> Result<PermissionState> {
        Ok(PermissionState::Denied)
    }

    async fn request_background_permission(&self) -> Result<PermissionState> {
        Ok(PermissionState::Denied)
    }

    fn watch_position(&self, _options: WatchOptions, _sink: SampleSink) -> Result<WatchId> {
        Err(anyhow!("location tracking is only available on Android and iOS"))
    }

    fn clear_watch(&self, _id: WatchId) -> Result<()> {
        Ok(())
    }

    async fn current_position(&self, _options: WatchOptions) -> Result<LocationSample> {
        Err(anyhow!("location tracking is only available on Android and iOS"))
    }
}

#[cfg(all(feature = "app", any(target_os = "android", target_os = "ios")))]
pub use mobile::GeolocationSource;

#[cfg(all(feature = "app", any(target_os = "android", target_os = "ios")))]
mod mobile {
    use anyhow::{anyhow, Context, Result};
    use async_trait::async_trait;
    use log::warn;
    use tauri::{plugin::PermissionState as HostPermission, AppHandle, Runtime};
    use tauri_plugin_geolocation::{
        GeolocationExt, PermissionType, Position, PositionOptions, WatchEvent,
    };

    use crate::location::{
        LocationSample, LocationSource, PermissionState, SampleOrigin, SampleSink, SourceEvent,
        WatchId, WatchOptions,
    };

    const FIX_TIMEOUT_MS: u32 = 10_000;

    /// Backed by `tauri-plugin-geolocation`. The plugin exposes a single
    /// location grant, so the background request re-checks it after the
    /// foreground prompt has been answered.
    pub struct GeolocationSource<R: Runtime> {
        app: AppHandle<R>,
    }

    impl<R: Runtime> GeolocationSource<R> {
        pub fn new(app: AppHandle<R>) -> Self {
            Self { app }
        }
    }

    fn to_plugin_options(options: WatchOptions) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: options.high_accuracy,
            timeout: FIX_TIMEOUT_MS,
            maximum_age: options.interval_ms as u32,
        }
    }

    fn to_sample(position: Position, origin: SampleOrigin) -> LocationSample {
        let mut sample = LocationSample::new(
            position.coords.latitude,
            position.coords.longitude,
            position.timestamp as i64,
            origin,
        );
        sample.accuracy = Some(position.coords.accuracy);
        sample
    }

    fn to_state(state: HostPermission) -> PermissionState {
        match state {
            HostPermission::Granted => PermissionState::Granted,
            _ => PermissionState::Denied,
        }
    }

    #[async_trait]
    impl<R: Runtime> LocationSource for GeolocationSource<R> {
        async fn request_foreground_permission(&self) -> Result<PermissionState> {
            let app = self.app.clone();
            let status = tokio::task::spawn_blocking(move || {
                app.geolocation()
                    .request_permissions(Some(vec![PermissionType::Location]))
            })
            .await
            .context("permission prompt worker join failed")?
            .map_err(|err| anyhow!("location permission request failed: {err}"))?;
            Ok(to_state(status.location))
        }

        async fn request_background_permission(&self) -> Result<PermissionState> {
            let app = self.app.clone();
            let status = tokio::task::spawn_blocking(move || app.geolocation().check_permissions())
                .await
                .context("permission check worker join failed")?
                .map_err(|err| anyhow!("location permission check failed: {err}"))?;
            Ok(to_state(status.location))
        }

        fn watch_position(&self, options: WatchOptions, sink: SampleSink) -> Result<WatchId> {
            self.app
                .geolocation()
                .watch_position(to_plugin_options(options), move |event| {
                    let forwarded = match event {
                        WatchEvent::Position(position) => {
                            SourceEvent::Sample(to_sample(position, SampleOrigin::Foreground))
                        }
                        WatchEvent::Error(message) => SourceEvent::Error(message),
                    };
                    if sink.send(forwarded).is_err() {
                        warn!("location watch fired after its receiver was dropped");
                    }
                })
                .map_err(|err| anyhow!("failed to start location watch: {err}"))
        }

        fn clear_watch(&self, id: WatchId) -> Result<()> {
            self.app
                .geolocation()
                .clear_watch(id)
                .map_err(|err| anyhow!("failed to clear location watch {id}: {err}"))
        }

        async fn current_position(&self, options: WatchOptions) -> Result<LocationSample> {
            let app = self.app.clone();
            let position = tokio::task::spawn_blocking(move || {
                app.geolocation()
                    .get_current_position(Some(to_plugin_options(options)))
            })
            .await
            .context("position worker join failed")?
            .map_err(|err| anyhow!("failed to read current position: {err}"))?;
            Ok(to_sample(position, SampleOrigin::Background))
        }
    }
}

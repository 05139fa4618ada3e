pub mod accounts;
pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod location;
pub mod session;
pub mod tracking;

#[cfg(feature = "app")]
mod account_commands;

#[cfg(feature = "app")]
pub use app::run;

#[cfg(feature = "app")]
pub(crate) use app::AppState;

#[cfg(feature = "app")]
mod app {
    use std::sync::Arc;

    use log::warn;
    use tauri::{Emitter, Manager};

    use crate::{
        account_commands::{get_session, login, logout, register},
        api::{self, ApiClient},
        config::AppConfig,
        location::LocationSource,
        session::SessionStore,
        tracking::{
            commands::{get_location_history, get_tracking_state, start_tracking, stop_tracking},
            BackgroundContext, ContextHandler, LocationReporter, PollingScheduler,
            TrackingController,
        },
    };

    pub(crate) struct AppState {
        pub(crate) api: ApiClient,
        pub(crate) session: SessionStore,
        pub(crate) tracking: TrackingController,
    }

    fn host_location_source(app: &tauri::AppHandle) -> Arc<dyn LocationSource> {
        #[cfg(any(target_os = "android", target_os = "ios"))]
        {
            Arc::new(crate::location::platform::GeolocationSource::new(app.clone()))
        }

        #[cfg(not(any(target_os = "android", target_os = "ios")))]
        {
            let _ = app;
            warn!("No location hardware on this platform; tracking is unavailable");
            Arc::new(crate::location::platform::UnsupportedSource)
        }
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let config = AppConfig::from_env();

        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(config.log_level())
            .init();

        log::info!("TrackMe starting up against {}", config.api_base_url);

        let builder = tauri::Builder::default();

        #[cfg(any(target_os = "android", target_os = "ios"))]
        let builder = builder.plugin(tauri_plugin_geolocation::init());

        builder
            .setup(move |app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let session_path = app_data_dir.join("session.json");
                    let session = SessionStore::new(session_path.clone())?;
                    let api_client = api::client_from_config(&config)?;

                    let source = host_location_source(app.handle());
                    let handler = Arc::new(ContextHandler::new(BackgroundContext {
                        session_path,
                        config: config.clone(),
                    }));
                    let scheduler = Arc::new(PollingScheduler::new(source.clone(), handler));
                    let reporter = LocationReporter::new(Arc::new(api_client.clone()));

                    let tracking =
                        TrackingController::new(session.clone(), source, scheduler, reporter);

                    // Push every state change to the webview.
                    {
                        let mut updates = tracking.subscribe();
                        let app_handle = app.handle().clone();
                        tauri::async_runtime::spawn(async move {
                            while updates.changed().await.is_ok() {
                                let snapshot = updates.borrow_and_update().clone();
                                let _ = app_handle.emit("tracking-state-changed", snapshot);
                            }
                        });
                    }

                    // Resume tracking that was on when the app last exited.
                    {
                        let tracking = tracking.clone();
                        tauri::async_runtime::spawn(async move {
                            if let Err(err) = tracking.initialize().await {
                                warn!("Could not resume location tracking: {err}");
                            }
                        });
                    }

                    app.manage(AppState {
                        api: api_client,
                        session,
                        tracking,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                register,
                login,
                logout,
                get_session,
                get_tracking_state,
                start_tracking,
                stop_tracking,
                get_location_history,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

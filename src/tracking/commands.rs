use tauri::State;

use crate::{
    history::{fetch_history, LocationHistory},
    tracking::{TrackingController, TrackingState},
    AppState,
};

fn controller_from_state(state: &State<'_, AppState>) -> TrackingController {
    state.tracking.clone()
}

#[tauri::command]
pub async fn get_tracking_state(state: State<'_, AppState>) -> Result<TrackingState, String> {
    let controller = controller_from_state(&state);
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub async fn start_tracking(state: State<'_, AppState>) -> Result<TrackingState, String> {
    let controller = controller_from_state(&state);
    controller.start().await.map_err(|e| e.to_string())
}

/// The frontend shows the "Stop Tracking?" prompt and passes the answer.
#[tauri::command]
pub async fn stop_tracking(
    state: State<'_, AppState>,
    confirmed: bool,
) -> Result<TrackingState, String> {
    let controller = controller_from_state(&state);
    controller.stop(confirmed).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_location_history(state: State<'_, AppState>) -> Result<LocationHistory, String> {
    let user_id = state
        .session
        .user_id()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "No user is logged in.".to_string())?;

    fetch_history(&state.api, &user_id)
        .await
        .map_err(|e| e.to_string())
}

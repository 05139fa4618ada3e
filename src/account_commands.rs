//! Tauri commands for register, login, and logout

use tauri::State;

use crate::{
    accounts::{self, LoginForm, RegistrationForm},
    api::LoginSuccess,
    session::Session,
    AppState,
};

#[tauri::command]
pub async fn register(
    state: State<'_, AppState>,
    form: RegistrationForm,
) -> Result<String, String> {
    accounts::register(&state.api, form)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn login(state: State<'_, AppState>, form: LoginForm) -> Result<LoginSuccess, String> {
    accounts::login(&state.api, &state.session, form)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn logout(state: State<'_, AppState>) -> Result<(), String> {
    accounts::logout(&state.tracking, &state.session)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_session(state: State<'_, AppState>) -> Result<Session, String> {
    state.session.session().await.map_err(|e| e.to_string())
}

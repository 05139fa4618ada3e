use log::info;
use serde::Deserialize;

use crate::{
    api::{ApiClient, LoginRequest, LoginSuccess, RegisterRequest},
    error::{TrackingError, TrackingResult, ValidationError},
    session::SessionStore,
    tracking::TrackingController,
};

const USERNAME_MIN: usize = 6;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Client-side checks only; the server validates again.
pub fn validate_registration(form: &RegistrationForm) -> Result<(), ValidationError> {
    if form.username.is_empty() || form.password.is_empty() || form.confirm_password.is_empty() {
        return Err(ValidationError::MissingFields);
    }

    let username_len = form.username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
        return Err(ValidationError::UsernameLength);
    }

    if form.password.chars().count() < PASSWORD_MIN {
        return Err(ValidationError::PasswordTooShort);
    }

    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }

    Ok(())
}

pub fn validate_login(form: &LoginForm) -> Result<(), ValidationError> {
    if form.username.is_empty() || form.password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    Ok(())
}

/// Returns the server's confirmation message.
pub async fn register(api: &ApiClient, form: RegistrationForm) -> TrackingResult<String> {
    validate_registration(&form)?;
    api.register(&RegisterRequest {
        username: form.username,
        password: form.password,
        confirm_password: form.confirm_password,
    })
    .await
}

/// Logs in and persists the issued `user_id`.
pub async fn login(
    api: &ApiClient,
    session: &SessionStore,
    form: LoginForm,
) -> TrackingResult<LoginSuccess> {
    validate_login(&form)?;
    let success = api
        .login(&LoginRequest {
            username: form.username,
            password: form.password,
        })
        .await?;

    session
        .set_user_id(&success.user_id)
        .await
        .map_err(TrackingError::Storage)?;
    info!("Logged in as user {}", success.user_id);
    Ok(success)
}

/// Stops tracking before forgetting the user so the tracking flag never
/// outlives the identity.
pub async fn logout(tracking: &TrackingController, session: &SessionStore) -> TrackingResult<()> {
    tracking.stop(true).await?;
    session.clear_user_id().await.map_err(TrackingError::Storage)?;
    info!("Logged out");
    Ok(())
}

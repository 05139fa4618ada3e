//! Errors surfaced to the user for a single action (a login attempt, a start
//! request, a history fetch). None of them are fatal to the app.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionKind {
    Foreground,
    Background,
}

impl std::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionKind::Foreground => f.write_str("foreground"),
            PermissionKind::Background => f.write_str("background"),
        }
    }
}

/// Client-side form checks run before the register/login request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required.")]
    MissingFields,

    #[error("Username must be between 6 and 20 characters.")]
    UsernameLength,

    #[error("Password must be at least 6 characters long.")]
    PasswordTooShort,

    #[error("Passwords do not match.")]
    PasswordMismatch,
}

#[derive(Error, Debug)]
pub enum TrackingError {
    /// Location permission refused; tracking does not start
    #[error("Permission to access {0} location was denied.")]
    PermissionDenied(PermissionKind),

    /// Non-success HTTP response or transport error
    #[error("{0}")]
    Network(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No user is logged in.")]
    NotLoggedIn,

    #[error("Local storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Location service error: {0}")]
    Platform(#[source] anyhow::Error),
}

pub type TrackingResult<T> = Result<T, TrackingError>;

use thiserror::Error;

use crate::models::Provider;

/// Failures reported by the identity backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Wrong email or password")]
    WrongCredentials,

    #[error("An account already exists for {0}")]
    EmailInUse(String),

    #[error("Sign-in with {0} is not available")]
    ProviderUnavailable(Provider),

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// Permanent failures belong next to the form field; retrying the same
    /// input will fail again.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, AuthError::Unavailable(_) | AuthError::ProviderUnavailable(_))
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to write message: {0}")]
    Write(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;

use axum::http::StatusCode;
use thiserror::Error;

/// Failures raised by the model layer.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Users must have an email address")]
    MissingEmail,
    #[error("Email already registered")]
    EmailTaken,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ModelError {
    pub fn status(&self) -> StatusCode {
        match self {
            ModelError::MissingEmail => StatusCode::BAD_REQUEST,
            ModelError::EmailTaken => StatusCode::CONFLICT,
            ModelError::PasswordHash(_) | ModelError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ModelError> for (StatusCode, String) {
    fn from(e: ModelError) -> Self {
        (e.status(), e.to_string())
    }
}

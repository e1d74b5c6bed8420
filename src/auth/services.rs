use axum::http::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::dto::{LoginRequest, RegisterRequest};
use crate::auth::repo::{UserStore, UserStoreError};
use crate::auth::repo_types::User;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already exists")]
    DuplicateUsername(String),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

impl From<UserStoreError> for AuthError {
    fn from(e: UserStoreError) -> Self {
        match e {
            UserStoreError::DuplicateUsername(u) => AuthError::DuplicateUsername(u),
            UserStoreError::Storage(e) => AuthError::Storage(e),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::DuplicateUsername(_) => StatusCode::CONFLICT,
            AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub async fn register(store: &UserStore, req: RegisterRequest) -> Result<User, AuthError> {
    if req.username.is_empty() || req.password.is_empty() || req.confirm_password.is_empty() {
        return Err(AuthError::Validation("Please fill in all fields"));
    }
    if req.password != req.confirm_password {
        warn!(username = %req.username, "password confirmation mismatch");
        return Err(AuthError::Validation("Passwords do not match"));
    }

    let user = store.create_user(&req.username, &req.password).await?;
    info!(user_id = ?user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn login(store: &UserStore, req: LoginRequest) -> Result<User, AuthError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AuthError::Validation("Please fill in all fields"));
    }

    match store.verify_user(&req.username, &req.password).await? {
        Some(user) => {
            info!(user_id = ?user.id, username = %user.username, "user logged in");
            Ok(user)
        }
        None => {
            warn!(username = %req.username, "login rejected");
            Err(AuthError::InvalidCredentials)
        }
    }
}

use axum::http::StatusCode;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{error, info, warn};

use super::password::{hash_password, verify_password};
use super::repo_types::{NewUser, User};
use crate::store::{DocumentStore, StoreError};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),

    #[error("user already exists with this username")]
    Conflict,

    #[error("no user found with this username")]
    UnknownUser,

    #[error("password is incorrect")]
    WrongPassword,

    #[error(transparent)]
    Store(StoreError),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => AuthError::Conflict,
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    pub fn into_rejection(self) -> (StatusCode, String) {
        match self {
            AuthError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::Conflict => (StatusCode::CONFLICT, self.to_string()),
            AuthError::UnknownUser | AuthError::WrongPassword => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
            }
            AuthError::Store(_) | AuthError::Hash(_) | AuthError::Token(_) => {
                error!(error = %self, "auth failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
            }
        }
    }
}

/// Usernames are matched case-insensitively by storing them lowercase.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[a-z0-9._-]{3,32}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub async fn signup(
    store: &dyn DocumentStore,
    username: &str,
    full_name: &str,
    password: &str,
) -> Result<User, AuthError> {
    let username = normalize_username(username);
    let full_name = full_name.trim();

    if !is_valid_username(&username) {
        warn!(%username, "invalid username");
        return Err(AuthError::Invalid(
            "Username must be 3-32 characters of a-z, 0-9, '.', '_' or '-'".into(),
        ));
    }
    if full_name.is_empty() {
        return Err(AuthError::Invalid("Full name is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Invalid("Password too short".into()));
    }

    let new_user = NewUser {
        username,
        full_name: full_name.to_string(),
        password_hash: hash_password(password)?,
    };
    let user = store.insert_user(&new_user).await.map_err(|e| {
        if matches!(e, StoreError::Duplicate(_)) {
            warn!(username = %new_user.username, "user already exists");
        }
        AuthError::from(e)
    })?;

    info!(username = %user.username, "user signed up");
    Ok(user)
}

pub async fn login(
    store: &dyn DocumentStore,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let username = normalize_username(username);
    let user = store.find_user(&username).await?.ok_or_else(|| {
        warn!(%username, "login for unknown user");
        AuthError::UnknownUser
    })?;

    if !verify_password(password, &user.password_hash)? {
        warn!(%username, "login with wrong password");
        return Err(AuthError::WrongPassword);
    }
    info!(%username, "user logged in");
    Ok(user)
}

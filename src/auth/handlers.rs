use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use super::{
    dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest},
    jwt::AuthUser,
    repo_types::User,
    services::{self, AuthError},
};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let user = services::signup(
        state.store.as_ref(),
        &payload.username,
        &payload.full_name,
        &payload.password,
    )
    .await
    .map_err(AuthError::into_rejection)?;
    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = services::login(state.store.as_ref(), &payload.username, &payload.password)
        .await
        .map_err(AuthError::into_rejection)?;
    Ok(Json(issue_token(&state, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    Ok(Json(load_user(&state, &username).await?.into()))
}

/// Record of an authenticated caller. A valid token for a user that no
/// longer exists is treated as unauthenticated.
pub(crate) async fn load_user(
    state: &AppState,
    username: &str,
) -> Result<User, (StatusCode, String)> {
    match state.store.find_user(username).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => Err(AuthError::from(e).into_rejection()),
    }
}

fn issue_token(state: &AppState, user: User) -> Result<AuthResponse, (StatusCode, String)> {
    let access_token = state.jwt.sign(&user.username).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AuthError::from(e).into_rejection()
    })?;
    Ok(AuthResponse {
        access_token,
        user: user.into(),
    })
}

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::{
    dto::PuzzleResponse,
    grid::{piece_tile, GRID_SIDE, PIECE_COUNT},
    month::MonthKey,
};
use crate::{
    auth::{handlers::load_user, jwt::AuthUser},
    error::Failure,
    state::AppState,
};

pub fn puzzle_routes() -> Router<AppState> {
    Router::new()
        .route("/puzzle", get(get_puzzle))
        .route("/puzzle/image", get(get_image))
        .route("/puzzle/pieces/:index", get(get_piece))
}

/// Month, prompt and the caller's progress on the current puzzle.
#[instrument(skip(state))]
pub async fn get_puzzle(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<PuzzleResponse>, (StatusCode, String)> {
    let user = load_user(&state, &username).await?;
    let image = state
        .cache
        .resolve(MonthKey::current())
        .await
        .map_err(Failure::into_rejection)?;

    let complete = user.pieces.len() == usize::from(PIECE_COUNT);
    Ok(Json(PuzzleResponse {
        month: image.month,
        prompt: image.prompt,
        content_type: image.content_type,
        grid_side: GRID_SIDE,
        pieces: user.pieces,
        complete,
    }))
}

#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    AuthUser(_username): AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let image = state
        .cache
        .resolve(MonthKey::current())
        .await
        .map_err(Failure::into_rejection)?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes))
}

/// PNG of one grid cell, only for pieces the caller has collected.
#[instrument(skip(state))]
pub async fn get_piece(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Path(index): Path<u8>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if index >= PIECE_COUNT {
        return Err((StatusCode::BAD_REQUEST, "Piece index must be 0-15".into()));
    }
    let user = load_user(&state, &username).await?;
    if !user.pieces.contains(&index) {
        warn!(%username, index, "piece requested before it was collected");
        return Err((StatusCode::FORBIDDEN, "Piece not collected yet".into()));
    }

    let image = state
        .cache
        .resolve(MonthKey::current())
        .await
        .map_err(Failure::into_rejection)?;
    let tile = tokio::task::spawn_blocking(move || piece_tile(&image.bytes, index))
        .await
        .map_err(|e| {
            error!(error = %e, "tile task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        })?
        .map_err(|e| {
            error!(error = %e, index, "cannot cut puzzle tile");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], tile))
}

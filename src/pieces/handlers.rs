use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{AwardRequest, AwardResponse, PaymentOptionsResponse},
    payment::{is_known_payment, PAYMENT_OPTIONS},
};
use crate::{auth::jwt::AuthUser, error::Failure, state::AppState};

pub fn pieces_routes() -> Router<AppState> {
    Router::new()
        .route("/pieces/award", post(award_pieces))
        .route("/pieces/payments", get(list_payments))
}

/// Grants random pieces for a completed bill payment.
#[instrument(skip(state, payload))]
pub async fn award_pieces(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
    Json(payload): Json<AwardRequest>,
) -> Result<Json<AwardResponse>, (StatusCode, String)> {
    if let Some(payment) = payload.payment.as_deref() {
        if !is_known_payment(payment) {
            warn!(%username, payment, "unknown payment option");
            return Err((StatusCode::BAD_REQUEST, "Unknown payment option".into()));
        }
        info!(%username, payment, "payment completed");
    }
    if payload.max_new == 0 {
        return Err((StatusCode::BAD_REQUEST, "max_new must be at least 1".into()));
    }

    let outcome = state
        .ledger
        .award_random_pieces(&username, payload.max_new)
        .await
        .map_err(|e| match e {
            // a valid token for a deleted user
            Failure::NotFound(_) => (StatusCode::UNAUTHORIZED, "User not found".to_string()),
            other => other.into_rejection(),
        })?;
    Ok(Json(outcome.into()))
}

pub async fn list_payments() -> Json<PaymentOptionsResponse> {
    Json(PaymentOptionsResponse {
        options: PAYMENT_OPTIONS.to_vec(),
    })
}

use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod ledger;
pub mod payment;

pub fn router() -> Router<AppState> {
    handlers::pieces_routes()
}

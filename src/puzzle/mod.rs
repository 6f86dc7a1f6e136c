use crate::state::AppState;
use axum::Router;

pub mod cache;
pub mod dto;
pub mod grid;
pub mod handlers;
pub mod month;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    handlers::puzzle_routes()
}

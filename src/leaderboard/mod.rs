use crate::state::AppState;
use axum::Router;

pub mod feed;
pub mod handlers;

pub use feed::LeaderboardFeed;

pub fn router() -> Router<AppState> {
    handlers::leaderboard_routes()
}

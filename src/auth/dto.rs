use serde::{Deserialize, Serialize};

use super::repo_types::User;
use crate::puzzle::grid::PIECE_COUNT;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PublicUser,
}

/// User profile without credentials.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub username: String,
    pub full_name: String,
    pub pieces: Vec<u8>,
    pub complete: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        let complete = user.pieces.len() == usize::from(PIECE_COUNT);
        Self {
            username: user.username,
            full_name: user.full_name,
            pieces: user.pieces,
            complete,
        }
    }
}

/// User record in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,      // lowercase, unique, immutable
    pub full_name: String,
    pub password_hash: String, // Argon2 PHC string
    pub pieces: Vec<u8>,       // sorted, each in 0..16
    pub version: i64,          // bumped on every pieces update
}

/// Fields supplied at signup; pieces start empty.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

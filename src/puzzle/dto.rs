use serde::Serialize;

use super::month::MonthKey;

#[derive(Debug, Serialize)]
pub struct PuzzleResponse {
    pub month: MonthKey,
    pub prompt: String,
    pub content_type: &'static str,
    pub grid_side: u32,
    pub pieces: Vec<u8>,
    pub complete: bool,
}

use serde::{Deserialize, Serialize};

use super::ledger::{AwardOutcome, DEFAULT_MAX_NEW};

#[derive(Debug, Default, Deserialize)]
pub struct AwardRequest {
    /// Name of the bill payment that earned the pieces.
    #[serde(default)]
    pub payment: Option<String>,
    #[serde(default = "default_max_new")]
    pub max_new: usize,
}

fn default_max_new() -> usize {
    DEFAULT_MAX_NEW
}

#[derive(Debug, Serialize)]
pub struct AwardResponse {
    pub awarded: Vec<u8>,
    pub pieces: Vec<u8>,
    pub complete: bool,
    pub message: String,
}

impl From<AwardOutcome> for AwardResponse {
    fn from(outcome: AwardOutcome) -> Self {
        let message = if outcome.complete {
            "Congrats! You completed the puzzle!".to_string()
        } else {
            match outcome.awarded.len() {
                1 => "You unlocked 1 new piece!".to_string(),
                n => format!("You unlocked {n} new pieces!"),
            }
        };
        Self {
            awarded: outcome.awarded,
            pieces: outcome.pieces,
            complete: outcome.complete,
            message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentOptionsResponse {
    pub options: Vec<&'static str>,
}

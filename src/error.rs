use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::genai::GenerationError;
use crate::store::StoreError;

/// Why a cache or ledger call produced no result.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("{0} not found")]
    NotFound(String),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Informational terminal state, nothing was changed.
    #[error("all pieces already collected")]
    AlreadyComplete,
}

impl Failure {
    pub fn status(&self) -> StatusCode {
        match self {
            Failure::NotFound(_) => StatusCode::NOT_FOUND,
            Failure::Generation(_) => StatusCode::SERVICE_UNAVAILABLE,
            Failure::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Failure::AlreadyComplete => StatusCode::CONFLICT,
        }
    }

    /// Logs at a level matching the failure kind and converts into the
    /// handler rejection shape.
    pub fn into_rejection(self) -> (StatusCode, String) {
        match &self {
            Failure::AlreadyComplete => debug!("award on a complete piece set"),
            Failure::NotFound(what) => warn!(%what, "not found"),
            Failure::Generation(e) => warn!(error = %e, "image temporarily unavailable"),
            Failure::Store(e) => error!(error = %e, "store failure"),
        }
        let message = match &self {
            Failure::AlreadyComplete => "You already have all pieces!".to_string(),
            Failure::Generation(_) => "Puzzle image is temporarily unavailable".to_string(),
            Failure::Store(_) => "Internal error".to_string(),
            Failure::NotFound(_) => self.to_string(),
        };
        (self.status(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_failure_kind() {
        assert_eq!(Failure::NotFound("user x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Failure::AlreadyComplete.status(), StatusCode::CONFLICT);
        assert_eq!(
            Failure::Generation(GenerationError::Unusable("empty".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Failure::Store(StoreError::Corrupt("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_details_are_not_leaked() {
        let (status, body) =
            Failure::Store(StoreError::Corrupt("users.pieces has 99".into())).into_rejection();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("99"));
    }
}

use thiserror::Error;

use crate::availability::WindowError;
use crate::domain::rental::RentalStatus;

/// Failure taxonomy for every booking operation. `http_status` is the
/// contract with the interface layer; the variants carry diagnostic detail.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid rental transition from {from:?} to {to:?}")]
    InvalidTransition { from: RentalStatus, to: RentalStatus },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("vehicle is unavailable: {0}")]
    Unavailable(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// Stable machine-readable code carried in error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } | Self::InvalidState(_) => "invalid_state",
            Self::Forbidden(_) => "forbidden",
            Self::Unavailable(_) => "unavailable",
            Self::Validation(_) | Self::Window(_) => "validation",
            Self::Storage(_) => "storage",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::InvalidTransition { .. }
            | Self::InvalidState(_)
            | Self::Unavailable(_)
            | Self::Validation(_)
            | Self::Window(_) => 400,
            Self::Storage(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::rental::RentalStatus;

    use super::EngineError;

    #[test]
    fn not_found_maps_to_404() {
        let error = EngineError::not_found("rental", "rent-404");
        assert_eq!(error.http_status(), 404);
        assert_eq!(error.code(), "not_found");
        assert_eq!(error.to_string(), "rental `rent-404` was not found");
    }

    #[test]
    fn forbidden_maps_to_403() {
        let error = EngineError::forbidden("only the owner may approve");
        assert_eq!(error.http_status(), 403);
        assert_eq!(error.code(), "forbidden");
    }

    #[test]
    fn transition_and_availability_failures_are_client_errors() {
        let transition = EngineError::InvalidTransition {
            from: RentalStatus::Completed,
            to: RentalStatus::OnTrip,
        };
        assert_eq!(transition.http_status(), 400);
        assert_eq!(transition.code(), "invalid_state");

        let unavailable =
            EngineError::Unavailable("vehicle veh-1 is booked for 2026-03-10..=2026-03-12".into());
        assert_eq!(unavailable.http_status(), 400);
        assert_eq!(unavailable.code(), "unavailable");
    }

    #[test]
    fn storage_failures_are_server_errors() {
        let error = EngineError::Storage("database lock timeout".into());
        assert_eq!(error.http_status(), 503);
        assert_eq!(error.code(), "storage");
    }
}

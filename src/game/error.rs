use crate::engine::hilo::{ActionError, StateError};
use crate::store::StoreError;

/// Caller-facing failure taxonomy shared by the coordinator and lobby.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GameError::Conflict(_))
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => GameError::NotFound(what),
            StoreError::Conflict(kind) => GameError::Conflict(kind.to_string()),
            other => GameError::Internal(other.to_string()),
        }
    }
}

impl From<ActionError> for GameError {
    fn from(err: ActionError) -> Self {
        if err.is_sequencing() {
            GameError::Conflict(err.to_string())
        } else {
            GameError::BadRequest(err.to_string())
        }
    }
}

impl From<StateError> for GameError {
    fn from(err: StateError) -> Self {
        GameError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::hilo::Street;
    use crate::store::ConflictKind;

    #[test]
    fn store_and_action_errors_map_to_stable_kinds() {
        let stale = GameError::from(StoreError::Conflict(ConflictKind::VersionMismatch {
            expected: 3,
            actual: Some(4),
        }));
        assert!(stale.is_conflict());
        assert!(matches!(
            GameError::from(StoreError::NotFound("table")),
            GameError::NotFound("table")
        ));
        assert!(matches!(
            GameError::from(StoreError::Unavailable("down".into())),
            GameError::Internal(_)
        ));
        assert!(GameError::from(ActionError::TurnOrder).is_conflict());
        assert!(GameError::from(ActionError::IllegalStreet(Street::Showdown)).is_conflict());
        assert!(matches!(
            GameError::from(ActionError::CannotCheck),
            GameError::BadRequest(_)
        ));
        assert!(matches!(
            GameError::from(ActionError::UnknownAction("bet".into())),
            GameError::BadRequest(_)
        ));
    }
}

use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for the feedback/policy subsystem.
///
/// Every fallback the system takes is visible in a variant here instead of
/// hidden in a blanket handler: the gateway maps `SessionNotFound` to a
/// client error, persistence failures surface to the caller, and policy
/// failures resolve to the conservative action without ever crossing the
/// serving path.
#[derive(Debug, Error)]
pub enum PeiraError {
    /// Feedback was submitted against an id that was never issued, already
    /// consumed, or expired.
    #[error("session {session_id} not found or already consumed")]
    SessionNotFound { session_id: Uuid },

    /// A durable write failed. The event was not stored; retrying is the
    /// caller's decision.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A training pass failed. The previously published policy stays live.
    #[error("policy training failed: {0}")]
    Training(String),

    /// Policy inference failed. Callers resolve this to the conservative
    /// default action rather than surfacing it.
    #[error("policy inference failed: {0}")]
    Inference(String),

    /// A black-box collaborator (embedding, generation, search) failed.
    #[error("collaborator stage '{stage}' failed: {message}")]
    Collaborator {
        stage: &'static str,
        message: String,
    },
}

impl PeiraError {
    pub fn session_not_found(session_id: Uuid) -> Self {
        Self::SessionNotFound { session_id }
    }

    pub fn collaborator(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            stage,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_session_id() {
        let id = Uuid::new_v4();
        let err = PeiraError::session_not_found(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn collaborator_names_stage() {
        let err = PeiraError::collaborator("web_search", "connection refused");
        let text = err.to_string();
        assert!(text.contains("web_search"));
        assert!(text.contains("connection refused"));
    }
}

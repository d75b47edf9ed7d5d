//! Feedback capture: derive a reward from the user's words and append the
//! event durably. Reward derivation is a pure function of the feedback
//! text alone; it never looks at training state.

use peira_core::{FeedbackEvent, PeiraError};
use std::sync::Arc;

use crate::sqlite::SqliteStore;

/// Map feedback text to a reward in {-1, 0, +1}, case-insensitively.
///
/// Positive keywords are checked first, so text matching both sets
/// ("good but incorrect") resolves to +1.
pub fn derive_reward(feedback_text: &str) -> i64 {
    let text = feedback_text.to_lowercase();
    if text.contains("good") || text.contains("helpful") {
        1
    } else if text.contains("bad") || text.contains("incorrect") {
        -1
    } else {
        0
    }
}

/// Appends feedback events to durable storage with their derived reward.
pub struct FeedbackRecorder {
    store: Arc<SqliteStore>,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Persist one feedback event. A storage failure surfaces as
    /// `Persistence`: the event was not stored and the caller decides
    /// whether to retry.
    pub async fn record(
        &self,
        user_id: &str,
        user_input: &str,
        response: &str,
        feedback_text: &str,
    ) -> Result<FeedbackEvent, PeiraError> {
        let reward = derive_reward(feedback_text);
        let timestamp = chrono::Utc::now().timestamp();

        let id = self
            .store
            .append_feedback(user_id, user_input, response, feedback_text, reward, timestamp)
            .await
            .map_err(|e| PeiraError::Persistence(e.to_string()))?;

        tracing::info!(user_id, reward, "Recorded feedback event {}", id);

        Ok(FeedbackEvent {
            id,
            user_id: user_id.to_string(),
            user_input: user_input.to_string(),
            response: response.to_string(),
            feedback_text: feedback_text.to_string(),
            reward,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_keywords() {
        assert_eq!(derive_reward("That was GOOD"), 1);
        assert_eq!(derive_reward("very helpful, thanks"), 1);
    }

    #[test]
    fn negative_keywords() {
        assert_eq!(derive_reward("bad response"), -1);
        assert_eq!(derive_reward("this is Incorrect"), -1);
    }

    #[test]
    fn neutral_otherwise() {
        assert_eq!(derive_reward("interesting"), 0);
        assert_eq!(derive_reward(""), 0);
    }

    #[test]
    fn positive_precedence_on_mixed_text() {
        assert_eq!(derive_reward("Good but incorrect"), 1);
        assert_eq!(derive_reward("helpful yet bad"), 1);
    }
}

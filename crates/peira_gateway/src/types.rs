use peira_core::ChatTurn;
use peira_engine::Explanation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub user_input: String,
}

/// Response to a chat turn, including the session id feedback must quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub response: String,
    pub explanation: Explanation,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

/// Inbound feedback on a previously delivered response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: Uuid,
    pub user_feedback: String,
}

/// Acknowledgement bodies for feedback and memory-clearing calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_parses_minimal_json() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"user_id":"alice","user_input":"hi"}"#).unwrap();
        assert_eq!(req.user_id, "alice");
        assert_eq!(req.user_input, "hi");
    }

    #[test]
    fn feedback_request_rejects_bad_uuid() {
        let result = serde_json::from_str::<FeedbackRequest>(
            r#"{"session_id":"not-a-uuid","user_feedback":"good"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn chat_response_roundtrips() {
        let response = ChatResponse {
            session_id: Uuid::new_v4(),
            response: "hello".into(),
            explanation: Explanation {
                passages_used: vec!["p".into()],
                fact_check: "confirmed".into(),
                policy_action: "positive".into(),
            },
            chat_history: vec![],
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: ChatResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.response, "hello");
        assert_eq!(back.explanation.fact_check, "confirmed");
    }
}

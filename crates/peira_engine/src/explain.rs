//! Explanation record for a delivered response: what the pipeline
//! actually used, stated plainly enough to return to the caller.

use crate::fact_check::FactCheckVerdict;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Retrieved passages that went into the prompt.
    pub passages_used: Vec<String>,
    /// Outcome of the fact-check stage.
    pub fact_check: String,
    /// The response-quality action the policy chose.
    pub policy_action: String,
}

impl Explanation {
    pub fn new(passages_used: Vec<String>, verdict: FactCheckVerdict, policy_action: &str) -> Self {
        Self {
            passages_used,
            fact_check: verdict.as_str().to_string(),
            policy_action: policy_action.to_string(),
        }
    }

    /// One-line provenance summary.
    pub fn summary(&self) -> String {
        format!(
            "Answered using {} retrieved passage(s); fact-check {}; policy chose {}.",
            self.passages_used.len(),
            self.fact_check,
            self.policy_action
        )
    }
}

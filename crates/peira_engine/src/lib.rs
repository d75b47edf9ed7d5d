pub mod engine;
pub mod explain;
pub mod fact_check;
pub mod knowledge;
pub mod llm;
pub mod preprocess;
pub mod websearch;

pub use engine::{ChatEngine, ChatTurnOutcome};
pub use explain::Explanation;
pub use fact_check::{FactCheckVerdict, NEEDS_VERIFICATION};
pub use knowledge::{HashedBowEmbedder, SqliteKnowledge};
pub use llm::GroqClient;
pub use preprocess::preprocess_query;
pub use websearch::DuckDuckGo;

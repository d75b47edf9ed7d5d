pub mod chat_log;
pub mod feedback;
pub mod session;
pub mod sqlite;

pub use chat_log::ChatMemoryStore;
pub use feedback::{derive_reward, FeedbackRecorder};
pub use session::SessionRegistry;
pub use sqlite::{KnowledgeDoc, SqliteStore};

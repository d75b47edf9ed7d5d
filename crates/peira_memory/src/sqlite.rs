//! Durable storage: feedback log, chat archive, knowledge documents, and
//! the persisted policy snapshot. One SQLite database, schema created
//! idempotently at connect time. The feedback table is append-only; at
//! this scale full-table scans are the read path.

use anyhow::{Context, Result};
use peira_core::{ChatTurn, FeedbackEvent};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;

/// A stored knowledge passage with its embedding vector.
#[derive(Debug, Clone)]
pub struct KnowledgeDoc {
    pub id: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                user_input TEXT NOT NULL,
                response TEXT NOT NULL,
                feedback TEXT NOT NULL,
                reward INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create feedback table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                response TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create chat_history table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(user_id)")
            .execute(&self.pool)
            .await
            .context("Failed to create chat_history index")?;

        // Policy snapshot (singleton - only one row)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS policy_params (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                params_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create policy_params table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create knowledge table")?;

        Ok(())
    }

    // ========================================================================
    // Feedback log (append-only)
    // ========================================================================

    /// Append one feedback event. The single INSERT is the atomicity
    /// boundary: either the whole event is durable or none of it is.
    /// Returns the assigned row id.
    pub async fn append_feedback(
        &self,
        user_id: &str,
        user_input: &str,
        response: &str,
        feedback_text: &str,
        reward: i64,
        timestamp: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO feedback (user_id, user_input, response, feedback, reward, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(user_input)
        .bind(response)
        .bind(feedback_text)
        .bind(reward)
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to append feedback event")?;

        Ok(result.last_insert_rowid())
    }

    /// Full scan of the feedback log in insertion order.
    pub async fn all_feedback(&self) -> Result<Vec<FeedbackEvent>> {
        let rows = sqlx::query(
            "SELECT id, user_id, user_input, response, feedback, reward, timestamp
             FROM feedback ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan feedback table")?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(FeedbackEvent {
                id: row.get("id"),
                user_id: row.get("user_id"),
                user_input: row.get("user_input"),
                response: row.get("response"),
                feedback_text: row.get("feedback"),
                reward: row.get("reward"),
                timestamp: row.get("timestamp"),
            });
        }
        Ok(events)
    }

    // ========================================================================
    // Chat archive
    // ========================================================================

    /// Archive a completed turn. The in-memory store serves the hot path;
    /// this table is the durable trail.
    pub async fn archive_turn(&self, turn: &ChatTurn) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_history (id, user_id, message, response, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&turn.user_id)
        .bind(&turn.message)
        .bind(&turn.response)
        .bind(turn.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to archive chat turn")?;
        Ok(())
    }

    /// Last `limit` archived turns for a user, oldest first.
    pub async fn archived_history(&self, user_id: &str, limit: i64) -> Result<Vec<ChatTurn>> {
        let rows = sqlx::query(
            "SELECT user_id, message, response, timestamp FROM chat_history
             WHERE user_id = ? ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read archived history")?;

        let mut turns: Vec<ChatTurn> = rows
            .into_iter()
            .map(|row| ChatTurn {
                user_id: row.get("user_id"),
                message: row.get("message"),
                response: row.get("response"),
                timestamp: row.get("timestamp"),
            })
            .collect();
        turns.reverse();
        Ok(turns)
    }

    /// Remove a user's archived turns. Idempotent; part of `clear_memory`.
    pub async fn delete_user_history(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_history WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete archived history")?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Policy snapshot (singleton row)
    // ========================================================================

    pub async fn save_policy_params(&self, params_json: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO policy_params (id, params_json, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET params_json = excluded.params_json,
                                           updated_at = excluded.updated_at",
        )
        .bind(params_json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to save policy params")?;
        Ok(())
    }

    pub async fn load_policy_params(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT params_json FROM policy_params WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load policy params")?;
        Ok(row.map(|r| r.get("params_json")))
    }

    // ========================================================================
    // Knowledge documents
    // ========================================================================

    pub async fn add_document(&self, text: &str, embedding: &[f32]) -> Result<i64> {
        let blob = bincode::serialize(embedding).context("Failed to serialize embedding")?;
        let result = sqlx::query("INSERT INTO knowledge (text, embedding, created_at) VALUES (?, ?, ?)")
            .bind(text)
            .bind(blob)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .context("Failed to add knowledge document")?;
        Ok(result.last_insert_rowid())
    }

    /// All stored documents. Ranking happens in the caller; the corpus is
    /// small enough that a full scan is the index.
    pub async fn all_documents(&self) -> Result<Vec<KnowledgeDoc>> {
        let rows = sqlx::query("SELECT id, text, embedding FROM knowledge ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to scan knowledge table")?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let embedding = match bincode::deserialize::<Vec<f32>>(&blob) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Skipping knowledge doc with bad embedding blob: {}", e);
                    continue;
                }
            };
            docs.push(KnowledgeDoc {
                id: row.get("id"),
                text: row.get("text"),
                embedding,
            });
        }
        Ok(docs)
    }
}

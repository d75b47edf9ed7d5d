use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PeiraConfig {
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub session: SessionConfig,
    pub training: TrainingConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
}

impl PeiraConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: PeiraConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults
    /// with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GROQ_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("PEIRA_SESSION_TTL_SECS") {
            if let Ok(n) = v.parse() {
                self.session.ttl_secs = n;
            }
        }
        if let Ok(v) = std::env::var("PEIRA_TRAIN_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.training.interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("PEIRA_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("PEIRA_PORT") {
            if let Ok(n) = v.parse() {
                self.server.port = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions model name.
    pub model: String,
    /// Override for the API base URL (defaults to the Groq endpoint).
    pub base_url: Option<String>,
    /// Env var the API key is read from. No key → mock completions.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            base_url: None,
            api_key_env: "GROQ_API_KEY".to_string(),
            max_tokens: 256,
            temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Per-user chat log capacity. Oldest turns are evicted past this.
    pub chat_capacity: usize,
    /// How many recent turns to feed back into the next prompt.
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chat_capacity: 20,
            history_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Unresolved sessions older than this are swept.
    pub ttl_secs: i64,
    /// How often the maintenance tick runs the sweep.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Per-day exponential decay applied to feedback rewards.
    pub decay_per_day: f64,
    /// Floor below which no sample's weight may fall.
    pub min_weight: f64,
    /// Step budget for one training pass.
    pub total_steps: u32,
    pub learning_rate: f64,
    /// Discount factor for episode returns.
    pub discount: f64,
    /// Seconds between background training passes. 0 disables the loop.
    pub interval_secs: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            decay_per_day: 0.95,
            min_weight: 0.1,
            total_steps: 10_000,
            learning_rate: 0.05,
            discount: 0.99,
            interval_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Disable to skip fact-checking entirely (responses pass through).
    pub enabled: bool,
    pub base_url: String,
    /// Passages requested per knowledge lookup.
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://duckduckgo.com/html/".to_string(),
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8005,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = PeiraConfig::default();
        assert_eq!(cfg.memory.chat_capacity, 20);
        assert_eq!(cfg.memory.history_limit, 5);
        assert_eq!(cfg.training.decay_per_day, 0.95);
        assert_eq!(cfg.training.min_weight, 0.1);
        assert_eq!(cfg.server.port, 8005);
    }

    #[test]
    fn partial_toml_fills_missing_fields() {
        let cfg: PeiraConfig = toml::from_str(
            r#"
            [memory]
            chat_capacity = 8

            [training]
            interval_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.memory.chat_capacity, 8);
        assert_eq!(cfg.memory.history_limit, 5);
        assert_eq!(cfg.training.interval_secs, 60);
        assert_eq!(cfg.training.total_steps, 10_000);
    }

    #[test]
    fn unknown_file_yields_defaults() {
        let cfg = PeiraConfig::load_or_default("/nonexistent/peira.toml");
        assert_eq!(cfg.session.ttl_secs, 3600);
    }
}

//! Reward shaping: turn the raw feedback log into a time-decayed training
//! signal. Recent feedback counts more; nothing is ever fully discounted.

use peira_core::FeedbackEvent;
use peira_memory::SqliteStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SECS_PER_DAY: i64 = 86_400;

/// Maps a user input to the scalar feature the policy observes.
///
/// Injected so a real embedding can replace the baseline without touching
/// the shaper or the trainer.
pub trait FeatureExtractor: Send + Sync {
    fn feature(&self, user_input: &str) -> f32;
}

/// Baseline extractor: input length as a scalar proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthFeature;

impl FeatureExtractor for LengthFeature {
    fn feature(&self, user_input: &str) -> f32 {
        user_input.chars().count() as f32
    }
}

/// One feedback event prepared for training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedSample {
    pub feature: f32,
    pub reward: i64,
    pub time_weight: f64,
    /// `reward * time_weight`, the externally-supplied training weight.
    pub adjusted_reward: f64,
}

pub struct RewardShaper {
    store: Arc<SqliteStore>,
    extractor: Arc<dyn FeatureExtractor>,
    decay_per_day: f64,
    min_weight: f64,
}

impl RewardShaper {
    pub fn new(
        store: Arc<SqliteStore>,
        extractor: Arc<dyn FeatureExtractor>,
        decay_per_day: f64,
        min_weight: f64,
    ) -> Self {
        Self {
            store,
            extractor,
            decay_per_day,
            min_weight,
        }
    }

    /// Feature for an arbitrary observation. Non-finite extractor output
    /// is clamped to 0 so a misbehaving extractor can't poison the policy.
    pub fn feature(&self, user_input: &str) -> f32 {
        let f = self.extractor.feature(user_input);
        if f.is_finite() {
            f
        } else {
            0.0
        }
    }

    /// Exponential decay over whole days, floored so old feedback keeps a
    /// minimal voice. Future-dated events count as today.
    pub fn time_weight(&self, now: i64, event_timestamp: i64) -> f64 {
        let days = ((now - event_timestamp).max(0) / SECS_PER_DAY) as i32;
        self.decay_per_day.powi(days).max(self.min_weight)
    }

    /// Weigh a slice of events as of `now`. Output order is the input
    /// order, so for a fixed log the result is deterministic.
    pub fn weigh(&self, events: &[FeedbackEvent], now: i64) -> Vec<WeightedSample> {
        events
            .iter()
            .map(|event| {
                let time_weight = self.time_weight(now, event.timestamp);
                WeightedSample {
                    feature: self.feature(&event.user_input),
                    reward: event.reward,
                    time_weight,
                    adjusted_reward: event.reward as f64 * time_weight,
                }
            })
            .collect()
    }

    /// Recompute the weighted training set from the full feedback log.
    pub async fn weighted_training_set(&self) -> anyhow::Result<Vec<WeightedSample>> {
        let events = self.store.all_feedback().await?;
        Ok(self.weigh(&events, chrono::Utc::now().timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaper() -> RewardShaper {
        // The store is unused by the pure paths under test.
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = Arc::new(rt.block_on(SqliteStore::new(":memory:")).unwrap());
        RewardShaper::new(store, Arc::new(LengthFeature), 0.95, 0.1)
    }

    fn event(user_input: &str, reward: i64, timestamp: i64) -> FeedbackEvent {
        FeedbackEvent {
            id: 0,
            user_id: "u".into(),
            user_input: user_input.into(),
            response: "r".into(),
            feedback_text: String::new(),
            reward,
            timestamp,
        }
    }

    #[test]
    fn ten_day_old_feedback_decays() {
        let shaper = shaper();
        let now = 1_700_000_000;
        let weight = shaper.time_weight(now, now - 10 * SECS_PER_DAY);
        assert!((weight - 0.95f64.powi(10)).abs() < 1e-12);
        assert!((weight - 0.5987).abs() < 1e-3);
    }

    #[test]
    fn hundred_day_old_feedback_hits_floor() {
        let shaper = shaper();
        let now = 1_700_000_000;
        // 0.95^100 ≈ 0.0059, below the 0.1 floor.
        assert_eq!(shaper.time_weight(now, now - 100 * SECS_PER_DAY), 0.1);
    }

    #[test]
    fn fresh_and_future_events_get_full_weight() {
        let shaper = shaper();
        let now = 1_700_000_000;
        assert_eq!(shaper.time_weight(now, now), 1.0);
        assert_eq!(shaper.time_weight(now, now + SECS_PER_DAY), 1.0);
    }

    #[test]
    fn weigh_preserves_insertion_order_and_scales_rewards() {
        let shaper = shaper();
        let now = 1_700_000_000;
        let events = vec![
            event("short", 1, now - 10 * SECS_PER_DAY),
            event("a longer question here", -1, now),
        ];

        let samples = shaper.weigh(&events, now);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].feature, 5.0);
        assert!((samples[0].adjusted_reward - 0.95f64.powi(10)).abs() < 1e-12);
        assert_eq!(samples[1].feature, 22.0);
        assert_eq!(samples[1].adjusted_reward, -1.0);
    }

    #[test]
    fn neutral_feedback_carries_zero_signal() {
        let shaper = shaper();
        let now = 1_700_000_000;
        let samples = shaper.weigh(&[event("anything", 0, now)], now);
        assert_eq!(samples[0].adjusted_reward, 0.0);
        assert_eq!(samples[0].time_weight, 1.0);
    }
}

//! Policy agent: a two-action logistic policy trained with REINFORCE.
//!
//! The live parameters sit behind an `ArcSwap`: training works on a
//! private copy and publishes once, after persisting, so concurrent
//! `best_action` callers observe either the old or the new policy and
//! never a torn one. Every failure path here resolves to the
//! conservative action; nothing in this module may take down the
//! serving loop.

use crate::env::{Action, ResponseEnv};
use crate::shaper::RewardShaper;
use arc_swap::ArcSwap;
use peira_core::config::TrainingConfig;
use peira_core::{ActionLabel, PeiraError};
use peira_memory::SqliteStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Input lengths are O(10..1000) characters; scaled down they land in a
/// usable logit range.
const FEATURE_SCALE: f64 = 0.01;
/// Parameters are clamped so a runaway pass cannot saturate the policy
/// beyond recovery.
const PARAM_BOUND: f64 = 10.0;

/// Learned parameters of the response-quality policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyParams {
    pub weight: f64,
    pub bias: f64,
    pub trained_steps: u64,
    pub updated_at: i64,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            weight: 0.0,
            bias: 0.0,
            trained_steps: 0,
            updated_at: 0,
        }
    }
}

impl PolicyParams {
    /// π(deliver | feature) as a logistic over the scaled feature.
    pub fn prob_deliver(&self, feature: f32) -> f64 {
        let x = feature as f64 * FEATURE_SCALE;
        let z = (self.weight * x + self.bias).clamp(-30.0, 30.0);
        1.0 / (1.0 + (-z).exp())
    }
}

/// Summary of one training pass.
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub steps: u32,
    pub episodes: u32,
    pub samples: usize,
}

pub struct PolicyAgent {
    store: Arc<SqliteStore>,
    shaper: RewardShaper,
    params: ArcSwap<PolicyParams>,
    /// Cleared when construction failed; `best_action` then answers the
    /// conservative default without touching the params.
    enabled: AtomicBool,
    learning_rate: f64,
    discount: f64,
}

impl PolicyAgent {
    /// Restore the agent from the persisted snapshot, or start fresh.
    /// A storage failure or corrupt snapshot leaves the agent disabled:
    /// it still answers, conservatively, and a later successful training
    /// pass re-enables it.
    pub async fn new(store: Arc<SqliteStore>, shaper: RewardShaper, cfg: &TrainingConfig) -> Self {
        let (params, enabled) = match store.load_policy_params().await {
            Ok(Some(json)) => match serde_json::from_str::<PolicyParams>(&json) {
                Ok(params) => {
                    tracing::info!(
                        trained_steps = params.trained_steps,
                        "Restored policy snapshot"
                    );
                    (params, true)
                }
                Err(e) => {
                    tracing::error!("Corrupt policy snapshot, agent disabled: {}", e);
                    (PolicyParams::default(), false)
                }
            },
            Ok(None) => (PolicyParams::default(), true),
            Err(e) => {
                tracing::error!("Failed to load policy snapshot, agent disabled: {}", e);
                (PolicyParams::default(), false)
            }
        };

        Self {
            store,
            shaper,
            params: ArcSwap::from_pointee(params),
            enabled: AtomicBool::new(enabled),
            learning_rate: cfg.learning_rate,
            discount: cfg.discount,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn current_params(&self) -> Arc<PolicyParams> {
        self.params.load_full()
    }

    /// Map an observation to a response-quality decision. Total: any
    /// internal failure, a disabled agent, or an untrained policy all
    /// resolve to `Negative`, never an error.
    pub fn best_action(&self, observation: &str) -> ActionLabel {
        if !self.is_enabled() {
            return ActionLabel::Negative;
        }
        let feature = self.shaper.feature(observation);
        let prob = self.params.load().prob_deliver(feature);
        if !prob.is_finite() {
            tracing::warn!("Non-finite policy output, falling back to negative");
            return ActionLabel::Negative;
        }
        if prob > 0.5 {
            ActionLabel::Positive
        } else {
            ActionLabel::Negative
        }
    }

    /// One full optimization pass with a `total_steps` budget.
    pub async fn train(&self, total_steps: u32) -> Result<TrainReport, PeiraError> {
        let (_tx, rx) = watch::channel(false);
        self.train_until(total_steps, &rx).await
    }

    /// Like `train`, but checks the stop signal between episodes so a
    /// shutdown never waits out an arbitrarily long pass. A stopped pass
    /// still persists whatever progress it made.
    pub async fn train_until(
        &self,
        total_steps: u32,
        stop: &watch::Receiver<bool>,
    ) -> Result<TrainReport, PeiraError> {
        let samples = self
            .shaper
            .weighted_training_set()
            .await
            .map_err(|e| PeiraError::Training(e.to_string()))?;

        if samples.is_empty() {
            tracing::info!("No feedback recorded yet, skipping training pass");
            return Ok(TrainReport {
                steps: 0,
                episodes: 0,
                samples: 0,
            });
        }

        let mut params = (**self.params.load()).clone();
        let mut env = ResponseEnv::new(&samples);
        let mut rng = StdRng::from_entropy();

        let mut steps_done = 0u32;
        let mut episodes = 0u32;

        while steps_done < total_steps {
            if *stop.borrow() {
                tracing::info!("Training pass stopped cooperatively after {} steps", steps_done);
                break;
            }

            // Roll out one episode under the current policy.
            let mut state = env.reset();
            let mut trajectory: Vec<(f32, Action, f64, f64)> = Vec::with_capacity(env.len());
            loop {
                let prob = params.prob_deliver(state);
                let action = if rng.gen::<f64>() < prob {
                    Action::Deliver
                } else {
                    Action::Withhold
                };
                let outcome = env.step(action);

                // Step t consumes sample t: the shaper's adjusted reward
                // enters only here, as an external magnitude on the update.
                let sample_weight = samples
                    .get(trajectory.len())
                    .map(|s| s.adjusted_reward.abs())
                    .unwrap_or(0.0);

                trajectory.push((state, action, outcome.reward, sample_weight));
                state = outcome.state;
                steps_done += 1;
                if outcome.done || steps_done >= total_steps {
                    break;
                }
            }
            episodes += 1;

            // REINFORCE: ascend the log-likelihood of each action, scaled
            // by its discounted return and the sample weight.
            let mut ret = 0.0;
            for (state, action, reward, sample_weight) in trajectory.iter().rev() {
                ret = reward + self.discount * ret;
                let x = *state as f64 * FEATURE_SCALE;
                let prob = params.prob_deliver(*state);
                let grad_logp = match action {
                    Action::Deliver => 1.0 - prob,
                    Action::Withhold => -prob,
                };
                let step_scale = self.learning_rate * ret * sample_weight;
                params.weight = (params.weight + step_scale * grad_logp * x).clamp(-PARAM_BOUND, PARAM_BOUND);
                params.bias = (params.bias + step_scale * grad_logp).clamp(-PARAM_BOUND, PARAM_BOUND);
            }
        }
        drop(rng);

        params.trained_steps += steps_done as u64;
        params.updated_at = chrono::Utc::now().timestamp();

        // Persist first, publish second: if the write fails the previous
        // policy stays live and the pass reports a training failure.
        let json =
            serde_json::to_string(&params).map_err(|e| PeiraError::Training(e.to_string()))?;
        self.store
            .save_policy_params(&json)
            .await
            .map_err(|e| PeiraError::Training(e.to_string()))?;

        self.params.store(Arc::new(params));
        self.enabled.store(true, Ordering::Relaxed);

        tracing::info!(
            steps = steps_done,
            episodes,
            samples = samples.len(),
            "Training pass complete"
        );

        Ok(TrainReport {
            steps: steps_done,
            episodes,
            samples: samples.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaper::{LengthFeature, RewardShaper};
    use peira_memory::FeedbackRecorder;

    async fn agent_over(store: Arc<SqliteStore>) -> PolicyAgent {
        let shaper = RewardShaper::new(store.clone(), Arc::new(LengthFeature), 0.95, 0.1);
        PolicyAgent::new(store, shaper, &TrainingConfig::default()).await
    }

    #[tokio::test]
    async fn fresh_agent_answers_conservatively() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let agent = agent_over(store).await;
        assert!(agent.is_enabled());
        // Untrained policy sits at p = 0.5, which is not enough to deliver.
        assert_eq!(agent.best_action("what is rust"), ActionLabel::Negative);
    }

    #[tokio::test]
    async fn best_action_is_total_over_malformed_observations() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let agent = agent_over(store).await;
        let huge = "x".repeat(100_000);
        for obs in ["", " ", "日本語のとても長い質問です", huge.as_str()] {
            let label = agent.best_action(obs);
            assert!(matches!(label.as_str(), "positive" | "negative"));
        }
    }

    #[tokio::test]
    async fn corrupt_snapshot_disables_agent_but_it_still_answers() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        store.save_policy_params("not json at all").await.unwrap();

        let agent = agent_over(store).await;
        assert!(!agent.is_enabled());
        assert_eq!(agent.best_action("anything"), ActionLabel::Negative);
        assert_eq!(agent.best_action(""), ActionLabel::Negative);
    }

    #[tokio::test]
    async fn training_moves_policy_toward_delivering() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let recorder = FeedbackRecorder::new(store.clone());
        for i in 0..5 {
            recorder
                .record("u", &format!("question number {}", i), "resp", "helpful")
                .await
                .unwrap();
        }

        let agent = agent_over(store).await;
        let before = agent.current_params().prob_deliver(20.0);

        let report = agent.train(500).await.unwrap();
        assert_eq!(report.samples, 5);
        assert!(report.steps > 0);

        let after = agent.current_params().prob_deliver(20.0);
        assert!(
            after > before,
            "expected deliver probability to rise: {} > {}",
            after,
            before
        );
        assert_eq!(agent.best_action("a typical question"), ActionLabel::Positive);
    }

    #[tokio::test]
    async fn training_persists_and_restores_across_agents() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let recorder = FeedbackRecorder::new(store.clone());
        recorder.record("u", "some question", "r", "good").await.unwrap();

        let agent = agent_over(store.clone()).await;
        agent.train(200).await.unwrap();
        let trained = agent.current_params();
        assert!(trained.trained_steps >= 200);

        let restored = agent_over(store).await;
        assert!(restored.is_enabled());
        let params = restored.current_params();
        assert_eq!(params.trained_steps, trained.trained_steps);
        assert_eq!(params.weight, trained.weight);
    }

    #[tokio::test]
    async fn empty_feedback_log_is_a_noop_pass() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let agent = agent_over(store).await;
        let report = agent.train(1000).await.unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.samples, 0);
    }

    #[tokio::test]
    async fn stop_signal_halts_the_pass() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let recorder = FeedbackRecorder::new(store.clone());
        recorder.record("u", "q", "r", "good").await.unwrap();

        let agent = agent_over(store).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = agent.train_until(10_000, &rx).await.unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.episodes, 0);
    }
}

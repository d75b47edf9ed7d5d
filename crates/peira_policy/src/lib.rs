pub mod env;
pub mod shaper;
pub mod trainer;

pub use env::{Action, ResponseEnv, StepOutcome};
pub use shaper::{FeatureExtractor, LengthFeature, RewardShaper, WeightedSample};
pub use trainer::{PolicyAgent, PolicyParams, TrainReport};

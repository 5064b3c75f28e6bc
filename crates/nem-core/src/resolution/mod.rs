mod config;
mod manager;

pub use config::{DatasetProfile, ResolutionConfig};
pub use manager::{DecisionReason, ResolutionDecision, ResolutionManager};

pub mod config;
pub mod match_engine;
pub mod rules;
pub(crate) mod similarity;

pub use config::MatchConfig;
pub use match_engine::MatchEngine;
pub use rules::{evaluate_rule, Evaluation, RuleLoadError, RuleSet};

//! Reconciles answers from several logs into one decision.

pub mod schema;
pub mod logname;
pub mod percentage;
pub mod script;
pub mod strategy;
pub mod correlate;
pub mod config;

pub use schema::*;
pub use logname::LogNameDecider;
pub use percentage::PercentageDecider;
pub use script::{ScriptDecider, SCRIPT_CONFIDENCE};
pub use strategy::Strategy;
pub use correlate::{correlate, QuorumFailure};
pub use config::{build_strategy, DeciderConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeciderError {
    #[error("no inputs to decide on")]
    NoInputs,

    #[error("could not find any match for log name {0}")]
    LogNameNotFound(String),

    #[error("could not reach the minimum {0}% quorum")]
    BelowMinimum(u32),

    #[error("script error: {0}")]
    Script(String),

    #[error("encountered errors while deciding: {}", format_failures(.0))]
    Aggregate(Vec<(String, String)>),

    #[error("config error: {0}")]
    Config(String),
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, DeciderError>;

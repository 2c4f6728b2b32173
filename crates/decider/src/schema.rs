use serde::{Deserialize, Serialize};

/// One log's proof-verified answer for an input hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeciderInput {
    pub log_name: String,
    pub output_hash: String,
}

impl DeciderInput {
    pub fn new(log_name: impl Into<String>, output_hash: impl Into<String>) -> Self {
        Self { log_name: log_name.into(), output_hash: output_hash.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeciderOutput {
    pub output_hash: String,
    /// Strategy-specific; percentages for quorum decisions.
    pub confidence: u32,
    /// Logs that agree with `output_hash`.
    pub log_names: Vec<String>,
}

/// A log whose answer differs from the decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub log_name: String,
    pub output_hash: String,
}

/// A decision plus disagreement diagnostics. Logs with no answer are
/// misses, never mismatches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub decision: DeciderOutput,
    pub mismatches: Vec<Mismatch>,
    pub misses: Vec<String>,
}

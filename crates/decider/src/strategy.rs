use crate::{DeciderError, DeciderInput, DeciderOutput, LogNameDecider, PercentageDecider, Result, ScriptDecider};

/// The configured decision strategy, fixed at construction.
#[derive(Clone, Debug)]
pub enum Strategy {
    LogName(LogNameDecider),
    MinimumPercentage(PercentageDecider),
    Script(ScriptDecider),
    /// First successful member wins.
    Aggregate(Vec<Strategy>),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::LogName(_) => "logname",
            Strategy::MinimumPercentage(_) => "percentage",
            Strategy::Script(_) => "script",
            Strategy::Aggregate(_) => "aggregate",
        }
    }

    pub fn decide(&self, inputs: &[DeciderInput]) -> Result<DeciderOutput> {
        match self {
            Strategy::LogName(d) => d.decide(inputs),
            Strategy::MinimumPercentage(d) => d.decide(inputs),
            Strategy::Script(d) => d.decide(inputs),
            Strategy::Aggregate(members) => {
                if inputs.is_empty() {
                    return Err(DeciderError::NoInputs);
                }
                let mut failures = Vec::with_capacity(members.len());
                for member in members {
                    match member.decide(inputs) {
                        Ok(decision) => return Ok(decision),
                        Err(e) => failures.push((member.name().to_string(), e.to_string())),
                    }
                }
                Err(DeciderError::Aggregate(failures))
            }
        }
    }
}

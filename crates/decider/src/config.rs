use serde::{Deserialize, Serialize};

use crate::{DeciderError, LogNameDecider, PercentageDecider, Result, ScriptDecider, Strategy};

/// One configured strategy, selected by its `engine` tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum DeciderConfig {
    Logname { name: String },
    Percentage { minimum: u32 },
    Script { script: String },
}

impl DeciderConfig {
    pub fn build(&self) -> Result<Strategy> {
        Ok(match self {
            DeciderConfig::Logname { name } => Strategy::LogName(LogNameDecider::new(name.clone())),
            DeciderConfig::Percentage { minimum } => {
                if *minimum > 100 {
                    return Err(DeciderError::Config(format!("minimum {minimum} exceeds 100")));
                }
                Strategy::MinimumPercentage(PercentageDecider::new(*minimum))
            }
            DeciderConfig::Script { script } => Strategy::Script(ScriptDecider::new(script)?),
        })
    }
}

/// A single entry builds that strategy; several build an aggregate tried in
/// declaration order.
pub fn build_strategy(configs: &[DeciderConfig]) -> Result<Strategy> {
    match configs {
        [] => Err(DeciderError::Config("no decider configured".into())),
        [one] => one.build(),
        many => Ok(Strategy::Aggregate(
            many.iter().map(DeciderConfig::build).collect::<Result<Vec<_>>>()?,
        )),
    }
}

use crate::{DeciderError, DeciderInput, DeciderOutput, Result};

/// Pins trust to a single named log.
#[derive(Clone, Debug)]
pub struct LogNameDecider {
    log_name: String,
}

impl LogNameDecider {
    pub fn new(log_name: impl Into<String>) -> Self {
        Self { log_name: log_name.into() }
    }

    pub fn decide(&self, inputs: &[DeciderInput]) -> Result<DeciderOutput> {
        if inputs.is_empty() {
            return Err(DeciderError::NoInputs);
        }
        inputs
            .iter()
            .find(|input| input.log_name == self.log_name)
            .map(|input| DeciderOutput {
                output_hash: input.output_hash.clone(),
                confidence: 100,
                log_names: vec![input.log_name.clone()],
            })
            .ok_or_else(|| DeciderError::LogNameNotFound(self.log_name.clone()))
    }
}

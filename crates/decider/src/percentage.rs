use std::collections::BTreeMap;

use crate::{DeciderError, DeciderInput, DeciderOutput, Result};

/// Quorum by share of agreeing logs.
#[derive(Clone, Debug)]
pub struct PercentageDecider {
    minimum_pct: u32,
}

impl PercentageDecider {
    pub fn new(minimum_pct: u32) -> Self {
        Self { minimum_pct }
    }

    pub fn minimum_pct(&self) -> u32 {
        self.minimum_pct
    }

    /// Groups inputs by output hash and picks the best-supported group that
    /// reaches the minimum. Support is `100 * group / total`, rounded down.
    /// Equal support goes to the lowest output hash, so input order never
    /// changes the outcome.
    pub fn decide(&self, inputs: &[DeciderInput]) -> Result<DeciderOutput> {
        if inputs.is_empty() {
            return Err(DeciderError::NoInputs);
        }

        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for input in inputs {
            groups
                .entry(input.output_hash.as_str())
                .or_default()
                .push(input.log_name.as_str());
        }

        let total = inputs.len() as u64;
        let pct_of = |n: usize| (100 * n as u64 / total) as u32;

        let mut best: Option<(&str, u32)> = None;
        for (hash, names) in &groups {
            let pct = pct_of(names.len());
            if pct < self.minimum_pct {
                continue;
            }
            // Unanimous, or a strict majority: nothing can beat it.
            if groups.len() == 1 || pct > 50 {
                best = Some((*hash, pct));
                break;
            }
            if best.map_or(true, |(_, p)| pct > p) {
                best = Some((*hash, pct));
            }
        }

        let (hash, pct) = best.ok_or(DeciderError::BelowMinimum(self.minimum_pct))?;
        let mut log_names: Vec<String> = groups[hash].iter().map(|s| s.to_string()).collect();
        log_names.sort();
        Ok(DeciderOutput { output_hash: hash.to_string(), confidence: pct, log_names })
    }
}

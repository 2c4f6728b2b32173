use thiserror::Error;
use tracing::debug;

use crate::{Correlation, DeciderError, DeciderInput, Mismatch, Strategy};

/// No decision could be reached; carries everything that was observed.
#[derive(Debug, Error)]
#[error("no decision reached: {source}")]
pub struct QuorumFailure {
    #[source]
    pub source: DeciderError,
    pub responses: Vec<DeciderInput>,
    pub misses: Vec<String>,
}

/// Runs `strategy` over the answers and splits the logs into agreeing,
/// mismatching, and missing.
pub fn correlate(
    strategy: &Strategy,
    responses: Vec<DeciderInput>,
    misses: Vec<String>,
) -> std::result::Result<Correlation, QuorumFailure> {
    let decision = match strategy.decide(&responses) {
        Ok(d) => d,
        Err(source) => return Err(QuorumFailure { source, responses, misses }),
    };

    let mismatches: Vec<Mismatch> = responses
        .into_iter()
        .filter(|r| r.output_hash != decision.output_hash)
        .map(|r| Mismatch { log_name: r.log_name, output_hash: r.output_hash })
        .collect();

    debug!(
        strategy = strategy.name(),
        output_hash = %decision.output_hash,
        confidence = decision.confidence,
        mismatches = mismatches.len(),
        misses = misses.len(),
        "decider: decided"
    );

    Ok(Correlation { decision, mismatches, misses })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PercentageDecider;

    #[test]
    fn test_mismatches_and_misses_are_separate() {
        let responses = vec![
            DeciderInput::new("log1", "A"),
            DeciderInput::new("log2", "A"),
            DeciderInput::new("log3", "A"),
            DeciderInput::new("log4", "B"),
        ];
        let strategy = Strategy::MinimumPercentage(PercentageDecider::new(30));
        let c = correlate(&strategy, responses, vec!["log5".into()]).unwrap();
        assert_eq!(c.decision.output_hash, "A");
        assert_eq!(c.decision.confidence, 75);
        assert_eq!(c.mismatches, vec![Mismatch { log_name: "log4".into(), output_hash: "B".into() }]);
        assert_eq!(c.misses, vec!["log5".to_string()]);
    }

    #[test]
    fn test_failure_keeps_diagnostics() {
        let strategy = Strategy::MinimumPercentage(PercentageDecider::new(60));
        let responses = vec![DeciderInput::new("x", "1"), DeciderInput::new("y", "2")];
        let err = correlate(&strategy, responses.clone(), vec!["z".into()]).unwrap_err();
        assert!(matches!(err.source, DeciderError::BelowMinimum(60)));
        assert_eq!(err.responses, responses);
        assert_eq!(err.misses, vec!["z".to_string()]);
    }

    #[test]
    fn test_all_misses_is_a_failure() {
        let strategy = Strategy::MinimumPercentage(PercentageDecider::new(1));
        let err = correlate(&strategy, Vec::new(), vec!["a".into(), "b".into()]).unwrap_err();
        assert!(matches!(err.source, DeciderError::NoInputs));
        assert_eq!(err.misses.len(), 2);
    }
}

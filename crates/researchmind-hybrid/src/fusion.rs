use serde::{Deserialize, Serialize};

use researchmind_core::config::RetrievalSettings;
use researchmind_core::{Error, Result};

/// Linear blend of the dense and lexical signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub dense_weight: f32,
    pub lexical_weight: f32,
    /// Candidates each signal contributes before fusion; `None` means `k`.
    pub candidate_window: Option<usize>,
}

impl Default for FusionConfig {
    fn default() -> Self { Self { dense_weight: 0.6, lexical_weight: 0.4, candidate_window: None } }
}

impl FusionConfig {
    pub fn with_weights(mut self, dense_weight: f32, lexical_weight: f32) -> Self {
        self.dense_weight = dense_weight;
        self.lexical_weight = lexical_weight;
        self
    }

    pub fn with_candidate_window(mut self, window: usize) -> Self {
        self.candidate_window = Some(window);
        self
    }

    /// Non-negative weights summing to at most 1 keep fused scores in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let (d, l) = (self.dense_weight, self.lexical_weight);
        if !d.is_finite() || !l.is_finite() || d < 0.0 || l < 0.0 || d + l > 1.0 + f32::EPSILON {
            return Err(Error::InvalidConfig(format!("invalid fusion weights {d} / {l}")));
        }
        if self.candidate_window == Some(0) {
            return Err(Error::InvalidConfig("candidate window must be at least 1".into()));
        }
        Ok(())
    }

    pub fn window(&self, k: usize) -> usize { self.candidate_window.unwrap_or(k) }

    pub fn combine(&self, dense: f32, lexical: f32) -> f32 { self.dense_weight * dense + self.lexical_weight * lexical }
}

impl From<&RetrievalSettings> for FusionConfig {
    fn from(s: &RetrievalSettings) -> Self {
        Self { dense_weight: s.dense_weight, lexical_weight: s.lexical_weight, candidate_window: s.candidate_window }
    }
}

/// Divisor for lexical normalisation; non-positive maxima count as 1.
pub fn lexical_max(scores: &[f32]) -> f32 {
    let max = scores.iter().copied().fold(0f32, f32::max);
    if max > 0.0 { max } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_scores_normalise_by_one() {
        assert_eq!(lexical_max(&[0.0, 0.0]), 1.0);
        assert_eq!(lexical_max(&[]), 1.0);
        assert_eq!(lexical_max(&[0.5, 2.0]), 2.0);
    }

    #[test]
    fn weights_are_validated() {
        assert!(FusionConfig::default().validate().is_ok());
        assert!(FusionConfig::default().with_weights(0.7, 0.4).validate().is_err());
        assert!(FusionConfig::default().with_weights(-0.1, 0.4).validate().is_err());
        assert!(FusionConfig::default().with_candidate_window(0).validate().is_err());
        assert!((FusionConfig::default().combine(1.0, 1.0) - 1.0).abs() < 1e-6);
    }
}

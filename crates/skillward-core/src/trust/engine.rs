//! Intrinsic trust computation.
//!
//! `intrinsic = w_p·provenance + w_b·behavioral + w_c·community + w_h·historical`
//! with non-negative weights summing to one. Every weight is non-negative, so
//! raising any signal never lowers the score.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use skillward_types::config::TrustConfig;
use skillward_types::skill::TrustInputs;
use skillward_types::trust::{TrustError, TrustScore, TrustSignals, TrustWeights};

/// Historical decay steps: (max age in days, multiplier).
pub const DECAY_STEPS: [(i64, f64); 3] = [(90, 1.0), (180, 0.75), (365, 0.5)];
/// Multiplier beyond the last step.
pub const DECAY_FLOOR: f64 = 0.25;

/// Multiplier applied to the historical signal for a skill last updated at
/// `last_updated`. Non-increasing in age; unknown dates and future dates do
/// not decay.
pub fn decay_factor(last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(updated) = last_updated else {
        return 1.0;
    };
    let days = (now - updated).num_days().max(0);
    DECAY_STEPS
        .iter()
        .find(|(max_days, _)| days <= *max_days)
        .map(|(_, factor)| *factor)
        .unwrap_or(DECAY_FLOOR)
}

/// Raise signals by non-negative increments, clamping at 1.0.
///
/// Keys are signal names (`provenance`, `behavioral`, `community`,
/// `historical`). The returned signals dominate `current` component-wise.
pub fn update_with_evidence(
    current: &TrustSignals,
    increments: &BTreeMap<String, f64>,
) -> Result<TrustSignals, TrustError> {
    let mut next = *current;
    for (name, value) in increments {
        if *value < 0.0 || value.is_nan() {
            return Err(TrustError::NegativeIncrement {
                name: name.clone(),
                value: *value,
            });
        }
        let slot = match name.as_str() {
            "provenance" => &mut next.provenance,
            "behavioral" => &mut next.behavioral,
            "community" => &mut next.community,
            "historical" => &mut next.historical,
            other => return Err(TrustError::UnknownSignal(other.to_string())),
        };
        *slot = (*slot + value).min(1.0);
    }
    Ok(next)
}

/// Weighted trust scoring with configured baselines.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustEngine {
    weights: TrustWeights,
    default_provenance: f64,
    default_community: f64,
    default_historical: f64,
}

impl TrustEngine {
    pub fn new(weights: TrustWeights) -> Result<Self, TrustError> {
        Self::from_config(&TrustConfig {
            weights,
            ..TrustConfig::default()
        })
    }

    pub fn from_config(config: &TrustConfig) -> Result<Self, TrustError> {
        config.weights.validate()?;
        TrustSignals {
            provenance: config.default_provenance,
            behavioral: 0.0,
            community: config.default_community,
            historical: config.default_historical,
        }
        .validate()?;
        Ok(Self {
            weights: config.weights,
            default_provenance: config.default_provenance,
            default_community: config.default_community,
            default_historical: config.default_historical,
        })
    }

    pub fn weights(&self) -> &TrustWeights {
        &self.weights
    }

    /// Assemble a record's signals: stated inputs or the baseline, the
    /// analysis-derived behavioral signal, and the decayed historical signal.
    pub fn signals_for(&self, inputs: &TrustInputs, behavioral: f64, now: DateTime<Utc>) -> TrustSignals {
        let historical = inputs.historical.unwrap_or(self.default_historical);
        TrustSignals {
            provenance: inputs.provenance.unwrap_or(self.default_provenance),
            behavioral: behavioral.clamp(0.0, 1.0),
            community: inputs.community.unwrap_or(self.default_community),
            historical: historical * decay_factor(inputs.last_updated, now),
        }
    }

    pub fn intrinsic(&self, signals: &TrustSignals) -> Result<f64, TrustError> {
        signals.validate()?;
        let w = &self.weights;
        let score = w.provenance * signals.provenance
            + w.behavioral * signals.behavioral
            + w.community * signals.community
            + w.historical * signals.historical;
        Ok(score.clamp(0.0, 1.0))
    }

    /// Intrinsic score, capped by `dependency_floor` when the skill has
    /// dependencies.
    pub fn score(
        &self,
        signals: TrustSignals,
        dependency_floor: Option<f64>,
    ) -> Result<TrustScore, TrustError> {
        let intrinsic = self.intrinsic(&signals)?;
        Ok(TrustScore::capped(intrinsic, signals, dependency_floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use skillward_types::trust::TrustLevel;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn engine() -> TrustEngine {
        TrustEngine::new(TrustWeights::default()).unwrap()
    }

    #[test]
    fn test_intrinsic_is_weighted_sum() {
        let signals = TrustSignals {
            provenance: 1.0,
            behavioral: 1.0,
            community: 0.5,
            historical: 0.0,
        };
        let score = engine().intrinsic(&signals).unwrap();
        assert!((score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_signals_rejected() {
        let signals = TrustSignals {
            community: -0.1,
            ..Default::default()
        };
        assert!(engine().intrinsic(&signals).is_err());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let weights = TrustWeights {
            provenance: 0.9,
            ..TrustWeights::default()
        };
        assert!(TrustEngine::new(weights).is_err());
    }

    #[test]
    fn test_decay_steps() {
        let at = |days| Some(now() - Duration::days(days));
        assert_eq!(decay_factor(None, now()), 1.0);
        assert_eq!(decay_factor(at(0), now()), 1.0);
        assert_eq!(decay_factor(at(90), now()), 1.0);
        assert_eq!(decay_factor(at(91), now()), 0.75);
        assert_eq!(decay_factor(at(200), now()), 0.5);
        assert_eq!(decay_factor(at(1000), now()), 0.25);
        assert_eq!(decay_factor(Some(now() + Duration::days(5)), now()), 1.0);
    }

    #[test]
    fn test_signals_use_baseline_and_decay() {
        let inputs = TrustInputs {
            provenance: Some(0.9),
            community: None,
            historical: Some(0.8),
            last_updated: Some(now() - Duration::days(120)),
        };
        let s = engine().signals_for(&inputs, 0.75, now());
        assert_eq!(s.provenance, 0.9);
        assert_eq!(s.community, 0.5);
        assert_eq!(s.behavioral, 0.75);
        assert!((s.historical - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_score_caps_at_dependency_floor() {
        let signals = TrustSignals {
            provenance: 1.0,
            behavioral: 1.0,
            community: 1.0,
            historical: 1.0,
        };
        let score = engine().score(signals, Some(0.3)).unwrap();
        assert_eq!(score.intrinsic(), 1.0);
        assert_eq!(score.effective(), 0.3);
        assert_eq!(score.level(), TrustLevel::Signed);
    }

    #[test]
    fn test_update_with_evidence_is_monotone() {
        let current = TrustSignals {
            provenance: 0.5,
            behavioral: 0.5,
            community: 0.9,
            historical: 0.2,
        };
        let mut inc = BTreeMap::new();
        inc.insert("community".to_string(), 0.5);
        inc.insert("historical".to_string(), 0.1);
        let next = update_with_evidence(&current, &inc).unwrap();
        assert_eq!(next.community, 1.0);
        assert!((next.historical - 0.3).abs() < 1e-9);
        assert!(next.dominates(&current));

        let e = engine();
        assert!(e.intrinsic(&next).unwrap() >= e.intrinsic(&current).unwrap());
    }

    #[test]
    fn test_update_with_evidence_rejects_bad_input() {
        let current = TrustSignals::default();
        let mut inc = BTreeMap::new();
        inc.insert("community".to_string(), -0.1);
        assert!(update_with_evidence(&current, &inc).is_err());

        let mut inc = BTreeMap::new();
        inc.insert("popularity".to_string(), 0.1);
        assert!(matches!(
            update_with_evidence(&current, &inc),
            Err(TrustError::UnknownSignal(_))
        ));
    }
}

//! Trust signals, weights, scores, and levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Score at or above which a skill is `SIGNED`.
pub const LEVEL_SIGNED_THRESHOLD: f64 = 0.25;
/// Score at or above which a skill is `COMMUNITY_VERIFIED`.
pub const LEVEL_COMMUNITY_THRESHOLD: f64 = 0.50;
/// Score at or above which a skill is `FORMALLY_VERIFIED`.
pub const LEVEL_FORMAL_THRESHOLD: f64 = 0.75;

/// Tolerance when checking that weights sum to one.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Error for out-of-range trust inputs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrustError {
    #[error("trust signal '{name}' must be in [0, 1], got {value}")]
    SignalOutOfRange { name: &'static str, value: f64 },

    #[error("trust weight '{name}' must be non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("trust weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },

    #[error("evidence increment for '{name}' must be non-negative, got {value}")]
    NegativeIncrement { name: String, value: f64 },

    #[error("unknown trust signal '{0}'")]
    UnknownSignal(String),
}

// ---------------------------------------------------------------------------
// TrustLevel
// ---------------------------------------------------------------------------

/// Graduated trust level, a pure function of the effective score.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    #[default]
    #[serde(alias = "unsigned")]
    Unsigned,
    #[serde(alias = "signed")]
    Signed,
    #[serde(alias = "community_verified")]
    CommunityVerified,
    #[serde(alias = "formally_verified")]
    FormallyVerified,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> TrustLevel {
        if score >= LEVEL_FORMAL_THRESHOLD {
            TrustLevel::FormallyVerified
        } else if score >= LEVEL_COMMUNITY_THRESHOLD {
            TrustLevel::CommunityVerified
        } else if score >= LEVEL_SIGNED_THRESHOLD {
            TrustLevel::Signed
        } else {
            TrustLevel::Unsigned
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::Unsigned => "UNSIGNED",
            TrustLevel::Signed => "SIGNED",
            TrustLevel::CommunityVerified => "COMMUNITY_VERIFIED",
            TrustLevel::FormallyVerified => "FORMALLY_VERIFIED",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unsigned" => Ok(TrustLevel::Unsigned),
            "signed" => Ok(TrustLevel::Signed),
            "community_verified" => Ok(TrustLevel::CommunityVerified),
            "formally_verified" => Ok(TrustLevel::FormallyVerified),
            other => Err(format!("unknown trust level '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// TrustSignals
// ---------------------------------------------------------------------------

/// Four independent trust inputs, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustSignals {
    pub provenance: f64,
    pub behavioral: f64,
    pub community: f64,
    pub historical: f64,
}

impl TrustSignals {
    pub const NAMES: [&'static str; 4] = ["provenance", "behavioral", "community", "historical"];

    pub fn validate(&self) -> Result<(), TrustError> {
        for (name, value) in self.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrustError::SignalOutOfRange { name, value });
            }
        }
        Ok(())
    }

    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("provenance", self.provenance),
            ("behavioral", self.behavioral),
            ("community", self.community),
            ("historical", self.historical),
        ]
    }

    /// True if every component of `self` is at least `other`'s.
    pub fn dominates(&self, other: &TrustSignals) -> bool {
        self.provenance >= other.provenance
            && self.behavioral >= other.behavioral
            && self.community >= other.community
            && self.historical >= other.historical
    }
}

// ---------------------------------------------------------------------------
// TrustWeights
// ---------------------------------------------------------------------------

/// Non-negative weights summing to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustWeights {
    pub provenance: f64,
    pub behavioral: f64,
    pub community: f64,
    pub historical: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            provenance: 0.3,
            behavioral: 0.3,
            community: 0.2,
            historical: 0.2,
        }
    }
}

impl TrustWeights {
    pub fn validate(&self) -> Result<(), TrustError> {
        let named = [
            ("provenance", self.provenance),
            ("behavioral", self.behavioral),
            ("community", self.community),
            ("historical", self.historical),
        ];
        let mut sum = 0.0;
        for (name, value) in named {
            if value < 0.0 || value.is_nan() {
                return Err(TrustError::NegativeWeight { name, value });
            }
            sum += value;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(TrustError::WeightSum { sum });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TrustScore
// ---------------------------------------------------------------------------

/// Intrinsic and effective trust for one skill.
///
/// `effective <= intrinsic` always holds; the constructor enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    intrinsic: f64,
    effective: f64,
    level: TrustLevel,
    signals: TrustSignals,
}

impl TrustScore {
    /// Score with no dependency cap: effective equals intrinsic.
    pub fn intrinsic_only(intrinsic: f64, signals: TrustSignals) -> Self {
        Self::capped(intrinsic, signals, None)
    }

    /// Score whose effective value is capped by the weakest dependency.
    pub fn capped(intrinsic: f64, signals: TrustSignals, dependency_floor: Option<f64>) -> Self {
        let intrinsic = intrinsic.clamp(0.0, 1.0);
        let effective = match dependency_floor {
            Some(dep) => intrinsic.min(dep.clamp(0.0, 1.0)),
            None => intrinsic,
        };
        Self {
            intrinsic,
            effective,
            level: TrustLevel::from_score(effective),
            signals,
        }
    }

    pub fn intrinsic(&self) -> f64 {
        self.intrinsic
    }

    pub fn effective(&self) -> f64 {
        self.effective
    }

    pub fn level(&self) -> TrustLevel {
        self.level
    }

    /// Level the skill would have with no dependencies.
    pub fn intrinsic_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.intrinsic)
    }

    pub fn signals(&self) -> &TrustSignals {
        &self.signals
    }
}

//! Global configuration types for Skillward.
//!
//! `GlobalConfig` represents `skillward.toml`: analysis thresholds and
//! budgets, trust weights, resolver budgets, and the capability/trust policy.
//! Every field has a default, so an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityParseError, CapabilitySet};
use crate::finding::Severity;
use crate::resolution::{Policy, SkillPolicy};
use crate::trust::{TrustLevel, TrustWeights};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub analysis: AnalysisConfig,
    pub trust: TrustConfig,
    pub resolver: ResolverConfig,
    pub policy: PolicyConfig,
}

/// Inference and violation-detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Findings at or above this severity make a skill UNSAFE.
    pub severity_threshold: Severity,
    /// Upper bound on skills analyzed concurrently.
    pub max_concurrency: usize,
    /// Budget for the whole analysis stage.
    pub timeout_secs: u64,
    /// Emit pattern-match and info-flow findings from raw skill content.
    pub pattern_detection: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Low,
            max_concurrency: 8,
            timeout_secs: 30,
            pattern_detection: true,
        }
    }
}

/// Trust weights and the baseline for signals a record does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub weights: TrustWeights,
    pub default_provenance: f64,
    pub default_community: f64,
    pub default_historical: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            weights: TrustWeights::default(),
            default_provenance: 0.5,
            default_community: 0.5,
            default_historical: 0.5,
        }
    }
}

/// What the resolver does with dependencies on skills outside the scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalDependencies {
    /// Record them on the resolved skill and log a warning.
    #[default]
    Ignore,
    /// Treat them as unsatisfiable requirements.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub timeout_secs: u64,
    /// Solver decision budget; exceeding it is a resolution timeout.
    pub max_decisions: u64,
    pub external_dependencies: ExternalDependencies,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_decisions: 1_000_000,
            external_dependencies: ExternalDependencies::Ignore,
        }
    }
}

/// Policy as authored: capabilities are `resource:level` strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub default: SkillPolicyConfig,
    pub skills: BTreeMap<String, SkillPolicyConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillPolicyConfig {
    /// Absent means `EXECUTE` on every resource.
    pub max_capabilities: Option<Vec<String>>,
    pub min_trust: TrustLevel,
}

impl SkillPolicyConfig {
    fn to_policy(&self) -> Result<SkillPolicy, CapabilityParseError> {
        let max_capabilities = match &self.max_capabilities {
            Some(items) => CapabilitySet::parse_list(items)?,
            None => CapabilitySet::top(),
        };
        Ok(SkillPolicy {
            max_capabilities,
            min_trust: self.min_trust,
        })
    }
}

impl PolicyConfig {
    /// Parse every capability string into a [`Policy`].
    ///
    /// Per-skill entries fall back to the default entry only as a whole;
    /// fields are not merged.
    pub fn to_policy(&self) -> Result<Policy, CapabilityParseError> {
        let default = self.default.to_policy()?;
        let mut skills = BTreeMap::new();
        for (name, entry) in &self.skills {
            skills.insert(name.clone(), entry.to_policy()?);
        }
        Ok(Policy { default, skills })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{AccessLevel, Resource};

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.analysis.severity_threshold, Severity::Low);
        assert_eq!(config.analysis.max_concurrency, 8);
        assert!(config.analysis.pattern_detection);
        assert_eq!(config.resolver.max_decisions, 1_000_000);
        assert_eq!(config.resolver.external_dependencies, ExternalDependencies::Ignore);
        assert!(config.policy.to_policy().unwrap().is_unrestricted());
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[analysis]
severity_threshold = "high"
max_concurrency = 2

[trust.weights]
provenance = 0.25
behavioral = 0.25
community = 0.25
historical = 0.25

[resolver]
external_dependencies = "reject"

[policy.default]
min_trust = "signed"

[policy.skills.weather-api]
max_capabilities = ["network:read", "env:read"]
min_trust = "community_verified"
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.analysis.severity_threshold, Severity::High);
        assert_eq!(config.analysis.max_concurrency, 2);
        assert_eq!(config.analysis.timeout_secs, 30);
        assert_eq!(config.trust.weights.community, 0.25);
        assert!(config.trust.weights.validate().is_ok());
        assert_eq!(config.resolver.external_dependencies, ExternalDependencies::Reject);

        let policy = config.policy.to_policy().unwrap();
        assert_eq!(policy.default.min_trust, TrustLevel::Signed);
        assert_eq!(policy.default.max_capabilities, CapabilitySet::top());

        let weather = policy.for_skill("weather-api");
        assert_eq!(weather.min_trust, TrustLevel::CommunityVerified);
        assert_eq!(weather.max_capabilities.get(Resource::Network), AccessLevel::Read);
        assert_eq!(weather.max_capabilities.get(Resource::Environment), AccessLevel::Read);
        assert_eq!(weather.max_capabilities.get(Resource::Process), AccessLevel::None);
    }

    #[test]
    fn test_bad_policy_capability_is_an_error() {
        let toml_str = r#"
[policy.default]
max_capabilities = ["network:everything"]
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert!(config.policy.to_policy().is_err());
    }
}

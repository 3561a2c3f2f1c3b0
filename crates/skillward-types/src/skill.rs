//! The unified skill record.
//!
//! Every format parser produces [`UnifiedSkillRecord`]s; nothing downstream
//! of the parsers knows which ecosystem a skill came from. Records are
//! read-only once handed to the verification core.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{AccessLevel, Capability, CapabilitySet, Resource};
use crate::error::MalformedRecord;
use crate::version::VersionConstraint;

/// One observed resource access, with where it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub resource: Resource,
    pub access: AccessLevel,
    /// Code or file location the access was observed at (e.g. `SKILL.md:14`).
    #[serde(default)]
    pub location: String,
}

impl Evidence {
    pub fn new(resource: Resource, access: AccessLevel, location: impl Into<String>) -> Self {
        Self {
            resource,
            access,
            location: location.into(),
        }
    }

    pub fn capability(&self) -> Capability {
        Capability::new(self.resource, self.access)
    }
}

/// Raw artifacts a parser pulled out of the skill source.
///
/// Consumed by threat-pattern detection only; capability inference works from
/// [`Evidence`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillContent {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub shell_commands: Vec<String>,
    #[serde(default)]
    pub code_blocks: Vec<String>,
    #[serde(default)]
    pub env_vars: Vec<String>,
}

impl SkillContent {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
            && self.shell_commands.is_empty()
            && self.code_blocks.is_empty()
            && self.env_vars.is_empty()
    }
}

/// Externally sourced trust signals. Missing values fall back to the
/// configured baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustInputs {
    #[serde(default)]
    pub provenance: Option<f64>,
    #[serde(default)]
    pub community: Option<f64>,
    #[serde(default)]
    pub historical: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Normalized skill record shared by every input format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSkillRecord {
    pub name: String,
    pub version: String,
    pub format: String,
    #[serde(default)]
    pub source_path: PathBuf,
    #[serde(default)]
    pub description: String,
    /// Capabilities the author states the skill needs.
    #[serde(default)]
    pub declared: CapabilitySet,
    /// Resource accesses observed in the skill's code or configuration.
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionConstraint>,
    /// Skills (and versions) this skill cannot be installed alongside.
    #[serde(default)]
    pub conflicts: BTreeMap<String, VersionConstraint>,
    #[serde(default)]
    pub content: SkillContent,
    /// `sha256:<hex>` digest of the raw source.
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default)]
    pub trust_inputs: TrustInputs,
}

impl UnifiedSkillRecord {
    /// Minimal record with no evidence, declarations, or dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            format: format.into(),
            source_path: PathBuf::new(),
            description: String::new(),
            declared: CapabilitySet::empty(),
            evidence: Vec::new(),
            dependencies: BTreeMap::new(),
            conflicts: BTreeMap::new(),
            content: SkillContent::default(),
            integrity: None,
            trust_inputs: TrustInputs::default(),
        }
    }

    /// `name@version`, used in logs and constraint descriptions.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Check that the record can be analyzed.
    ///
    /// Returns the parsed semantic version on success.
    pub fn validate(&self) -> Result<semver::Version, MalformedRecord> {
        let malformed = |reason: String| MalformedRecord {
            origin: self.origin(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(malformed("skill name is empty".to_string()));
        }

        let version = semver::Version::parse(self.version.trim())
            .map_err(|e| malformed(format!("version '{}' is not semver: {e}", self.version)))?;

        for (dep, _) in self.dependencies.iter().chain(self.conflicts.iter()) {
            if dep.trim().is_empty() {
                return Err(malformed("dependency with empty name".to_string()));
            }
        }

        let inputs = &self.trust_inputs;
        for (label, value) in [
            ("provenance", inputs.provenance),
            ("community", inputs.community),
            ("historical", inputs.historical),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(malformed(format!("trust input '{label}' = {v} outside [0, 1]")));
                }
            }
        }

        Ok(version)
    }

    /// Best available label for error reports: the source path, else the name.
    pub fn origin(&self) -> String {
        if self.source_path.as_os_str().is_empty() {
            self.name.clone()
        } else {
            self.source_path.display().to_string()
        }
    }
}

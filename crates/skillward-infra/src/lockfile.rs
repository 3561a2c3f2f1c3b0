//! `skill-lock.json`: the resolved configuration pinned to disk.
//!
//! Maps are `BTreeMap`s and capability lists are sorted, so identical
//! configurations serialize to identical bytes.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use skillward_types::resolution::{Policy, ResolvedConfiguration};
use skillward_types::trust::TrustLevel;

pub const LOCKFILE_NAME: &str = "skill-lock.json";
pub const LOCKFILE_VERSION: u32 = 1;
const RESOLUTION_STRATEGY: &str = "sat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub total_skills: usize,
    pub resolution_strategy: String,
    /// Capability bound each locked skill was resolved under.
    pub policy_bounds: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedSkill {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    pub format: String,
    pub source_path: String,
    pub capabilities: Vec<String>,
    /// Dependency name to locked version.
    pub dependencies: BTreeMap<String, String>,
    pub trust_score: f64,
    pub trust_level: TrustLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    pub lockfile_version: u32,
    pub metadata: LockMetadata,
    pub skills: BTreeMap<String, LockedSkill>,
}

impl Lockfile {
    pub fn from_configuration(configuration: &ResolvedConfiguration, policy: &Policy) -> Self {
        let skills: BTreeMap<String, LockedSkill> = configuration
            .skills
            .iter()
            .map(|(name, skill)| {
                let locked = LockedSkill {
                    version: skill.version.clone(),
                    integrity: skill.integrity.clone(),
                    format: skill.format.clone(),
                    source_path: skill.source_path.display().to_string(),
                    capabilities: skill.capabilities.to_strings(),
                    dependencies: skill.dependencies.clone(),
                    trust_score: skill.trust.effective(),
                    trust_level: skill.trust.level(),
                };
                (name.clone(), locked)
            })
            .collect();

        let policy_bounds = skills
            .keys()
            .map(|name| (name.clone(), policy.for_skill(name).max_capabilities.to_strings()))
            .collect();

        Self {
            lockfile_version: LOCKFILE_VERSION,
            metadata: LockMetadata {
                total_skills: skills.len(),
                resolution_strategy: RESOLUTION_STRATEGY.to_string(),
                policy_bounds,
            },
            skills,
        }
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize lockfile")?;
        json.push('\n');
        Ok(json)
    }
}

pub fn write_lockfile(lockfile: &Lockfile, path: &Path) -> anyhow::Result<()> {
    let json = lockfile.to_json()?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;
    tracing::info!(path = %path.display(), skills = lockfile.skills.len(), "lockfile written");
    Ok(())
}

pub fn read_lockfile(path: &Path) -> anyhow::Result<Lockfile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read lockfile: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse lockfile: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use skillward_types::capability::{AccessLevel, CapabilitySet, Resource};
    use skillward_types::resolution::{ResolvedSkill, SkillPolicy};
    use skillward_types::trust::{TrustScore, TrustSignals};
    use tempfile::TempDir;

    fn skill(name: &str, version: &str, deps: &[(&str, &str)]) -> ResolvedSkill {
        let caps = CapabilitySet::empty()
            .with(Resource::Process, AccessLevel::Execute)
            .with(Resource::Network, AccessLevel::Read);
        ResolvedSkill {
            name: name.into(),
            version: version.into(),
            format: "skill_md".into(),
            source_path: PathBuf::from(format!("skills/{name}/SKILL.md")),
            integrity: Some(format!("sha256:{name}")),
            capabilities: caps.clone(),
            declared: caps,
            trust: TrustScore::intrinsic_only(0.6, TrustSignals::default()),
            dependencies: deps.iter().map(|(d, v)| (d.to_string(), v.to_string())).collect(),
            external: BTreeMap::new(),
        }
    }

    fn configuration() -> ResolvedConfiguration {
        let mut config = ResolvedConfiguration::default();
        for s in [skill("zeta", "1.0.0", &[("alpha", "2.1.0")]), skill("alpha", "2.1.0", &[])] {
            config.skills.insert(s.name.clone(), s);
        }
        config
    }

    #[test]
    fn test_from_configuration() {
        let mut policy = Policy::default();
        policy.skills.insert(
            "zeta".into(),
            SkillPolicy {
                max_capabilities: CapabilitySet::parse_list(&["process:execute", "network:read"]).unwrap(),
                min_trust: TrustLevel::Unsigned,
            },
        );
        let lock = Lockfile::from_configuration(&configuration(), &policy);

        assert_eq!(lock.lockfile_version, LOCKFILE_VERSION);
        assert_eq!(lock.metadata.total_skills, 2);
        assert_eq!(lock.metadata.resolution_strategy, "sat");
        assert_eq!(lock.metadata.policy_bounds["zeta"].len(), 2);
        assert_eq!(lock.metadata.policy_bounds["alpha"].len(), Resource::ALL.len());

        let zeta = &lock.skills["zeta"];
        assert_eq!(zeta.dependencies["alpha"], "2.1.0");
        assert_eq!(zeta.capabilities, CapabilitySet::parse_list(&["network:read", "process:execute"]).unwrap().to_strings());
        assert_eq!(zeta.trust_level, TrustLevel::from_score(0.6));
    }

    #[test]
    fn test_output_is_alphabetical_and_stable() {
        let lock = Lockfile::from_configuration(&configuration(), &Policy::default());
        let first = lock.to_json().unwrap();
        let second = Lockfile::from_configuration(&configuration(), &Policy::default())
            .to_json()
            .unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("}\n"));
        let alpha = first.find("\"alpha\": {").unwrap();
        let zeta = first.find("\"zeta\": {").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCKFILE_NAME);
        let lock = Lockfile::from_configuration(&configuration(), &Policy::default());

        write_lockfile(&lock, &path).unwrap();
        assert_eq!(read_lockfile(&path).unwrap(), lock);
    }

    #[test]
    fn test_read_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_lockfile(&tmp.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read lockfile"));
    }
}

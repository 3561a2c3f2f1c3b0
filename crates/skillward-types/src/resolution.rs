//! Policy bounds, resolver constraints, and the resolved configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilitySet;
use crate::skill::UnifiedSkillRecord;
use crate::trust::{TrustLevel, TrustScore};
use crate::version::VersionConstraint;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Upper capability bound and lower trust floor for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillPolicy {
    pub max_capabilities: CapabilitySet,
    pub min_trust: TrustLevel,
}

impl Default for SkillPolicy {
    /// No restriction: `EXECUTE` everywhere, `UNSIGNED` floor.
    fn default() -> Self {
        Self {
            max_capabilities: CapabilitySet::top(),
            min_trust: TrustLevel::Unsigned,
        }
    }
}

/// Caller-supplied policy: a default plus per-skill overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub default: SkillPolicy,
    pub skills: BTreeMap<String, SkillPolicy>,
}

impl Policy {
    pub fn for_skill(&self, name: &str) -> &SkillPolicy {
        self.skills.get(name).unwrap_or(&self.default)
    }

    /// True when no bound or floor restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        let open = SkillPolicy::default();
        self.default == open && self.skills.values().all(|p| *p == open)
    }
}

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

/// One resolver constraint, named by the skill versions it touches.
///
/// Skill versions are written `name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// `from` needs some version of `to` matching `requirement`.
    VersionRequirement {
        from: String,
        to: String,
        requirement: VersionConstraint,
    },
    /// `skill` infers more than its policy bound allows.
    CapabilityBound {
        skill: String,
        inferred: CapabilitySet,
        bound: CapabilitySet,
    },
    /// `skill` is below the trust floor required of it.
    TrustFloor {
        skill: String,
        level: TrustLevel,
        floor: TrustLevel,
    },
    /// `from` cannot be installed with `with` at a matching version.
    Conflict {
        from: String,
        with: String,
        requirement: VersionConstraint,
    },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::VersionRequirement {
                from,
                to,
                requirement,
            } => write!(f, "{from} requires {to} {requirement}"),
            Constraint::CapabilityBound {
                skill,
                inferred,
                bound,
            } => write!(f, "{skill} needs {inferred} but policy allows {bound}"),
            Constraint::TrustFloor { skill, level, floor } => {
                write!(f, "{skill} has trust {level} below required {floor}")
            }
            Constraint::Conflict {
                from,
                with,
                requirement,
            } => write!(f, "{from} conflicts with {with} {requirement}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ResolvedConfiguration
// ---------------------------------------------------------------------------

/// The chosen version of one skill, with its derived artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSkill {
    pub name: String,
    pub version: String,
    pub format: String,
    pub source_path: PathBuf,
    pub integrity: Option<String>,
    /// Inferred capabilities of the chosen version.
    pub capabilities: CapabilitySet,
    pub declared: CapabilitySet,
    pub trust: TrustScore,
    /// Direct dependency name to chosen version.
    pub dependencies: BTreeMap<String, String>,
    /// Dependencies on skills outside the scan, name to requirement.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external: BTreeMap<String, String>,
}

impl ResolvedSkill {
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// One mutually consistent version per skill name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfiguration {
    pub skills: BTreeMap<String, ResolvedSkill>,
}

impl ResolvedConfiguration {
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedSkill> {
        self.skills.get(name)
    }

    /// Re-check every constraint against the chosen versions.
    ///
    /// `records` is the full candidate set the configuration was chosen from;
    /// dependencies on names absent from it are external and not checked.
    /// Returns every violated constraint.
    pub fn verify(
        &self,
        records: &[UnifiedSkillRecord],
        policy: &Policy,
    ) -> Result<(), Vec<Constraint>> {
        let mut violations = Vec::new();

        for skill in self.skills.values() {
            let Some(record) = records
                .iter()
                .find(|r| r.name == skill.name && r.version == skill.version)
            else {
                continue;
            };
            let id = skill.id();

            for (dep, requirement) in &record.dependencies {
                let satisfied = match self.chosen_version(dep) {
                    Some(v) => requirement.matches(&v),
                    None => !records.iter().any(|r| &r.name == dep),
                };
                if !satisfied {
                    violations.push(Constraint::VersionRequirement {
                        from: id.clone(),
                        to: dep.clone(),
                        requirement: requirement.clone(),
                    });
                }
            }

            let bound = &policy.for_skill(&skill.name).max_capabilities;
            if !skill.capabilities.leq(bound) {
                violations.push(Constraint::CapabilityBound {
                    skill: id.clone(),
                    inferred: skill.capabilities.clone(),
                    bound: bound.clone(),
                });
            }

            let floor = policy.for_skill(&skill.name).min_trust;
            if skill.trust.level() < floor {
                violations.push(Constraint::TrustFloor {
                    skill: id.clone(),
                    level: skill.trust.level(),
                    floor,
                });
            }

            for (other, requirement) in &record.conflicts {
                if other == &skill.name {
                    continue;
                }
                if let Some(v) = self.chosen_version(other) {
                    if requirement.matches(&v) {
                        violations.push(Constraint::Conflict {
                            from: id.clone(),
                            with: other.clone(),
                            requirement: requirement.clone(),
                        });
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn chosen_version(&self, name: &str) -> Option<semver::Version> {
        self.skills
            .get(name)
            .and_then(|s| semver::Version::parse(&s.version).ok())
    }
}

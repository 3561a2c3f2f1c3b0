//! The outbound report model.
//!
//! Everything serializers and the CLI consume. Skill reports are kept in
//! name order and every map is a `BTreeMap`, so identical input serializes
//! to identical bytes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skillward_types::capability::CapabilitySet;
use skillward_types::error::{CyclicDependency, MalformedRecord};
use skillward_types::finding::{Finding, Severity, Verdict};
use skillward_types::resolution::{Constraint, ResolvedConfiguration};
use skillward_types::trust::TrustScore;

use crate::analysis::PolaCompliance;

/// Per-skill analysis and trust results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReport {
    pub name: String,
    pub version: String,
    pub format: String,
    pub source_path: PathBuf,
    /// Inferred capabilities.
    pub capabilities: CapabilitySet,
    pub declared: CapabilitySet,
    pub findings: Vec<Finding>,
    pub verdict: Verdict,
    pub pola: PolaCompliance,
    /// `None` when the skill was excluded from propagation by a cycle.
    pub trust: Option<TrustScore>,
}

impl SkillReport {
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// How the resolver stage ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Resolved {
        configuration: ResolvedConfiguration,
    },
    Conflict {
        constraints: Vec<Constraint>,
    },
    /// A chosen configuration failed re-verification.
    Inconsistent {
        constraints: Vec<Constraint>,
    },
    Timeout,
    /// Resolution was not attempted.
    Skipped {
        reason: String,
    },
}

impl ResolutionOutcome {
    pub fn configuration(&self) -> Option<&ResolvedConfiguration> {
        match self {
            ResolutionOutcome::Resolved { configuration } => Some(configuration),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ResolutionOutcome::Conflict { .. }
                | ResolutionOutcome::Inconsistent { .. }
                | ResolutionOutcome::Timeout
        )
    }
}

/// Process exit status consumed by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Every verdict safe and resolution succeeded.
    Success,
    /// Findings at or above the threshold, a conflict, a cycle, or a timeout.
    Failure,
    /// No skills, or at least one malformed record.
    InputError,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
            ExitStatus::InputError => 2,
        }
    }
}

/// The result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub threshold: Severity,
    pub skills: Vec<SkillReport>,
    pub malformed: Vec<MalformedRecord>,
    pub cycles: Vec<CyclicDependency>,
    pub resolution: ResolutionOutcome,
}

impl RunReport {
    pub fn unsafe_count(&self) -> usize {
        self.skills.iter().filter(|s| !s.verdict.is_safe()).count()
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.skills.is_empty() || !self.malformed.is_empty() {
            return ExitStatus::InputError;
        }
        if self.unsafe_count() > 0 || !self.cycles.is_empty() || self.resolution.is_failure() {
            return ExitStatus::Failure;
        }
        ExitStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillward_types::finding::{AttackClass, FindingKind};

    fn skill(name: &str, verdict: Verdict) -> SkillReport {
        SkillReport {
            name: name.into(),
            version: "1.0.0".into(),
            format: "record".into(),
            source_path: PathBuf::new(),
            capabilities: CapabilitySet::empty(),
            declared: CapabilitySet::empty(),
            findings: Vec::new(),
            verdict,
            pola: PolaCompliance {
                bounded: true,
                over_declared: Vec::new(),
                utilization: 1.0,
            },
            trust: None,
        }
    }

    fn report(skills: Vec<SkillReport>) -> RunReport {
        RunReport {
            threshold: Severity::Low,
            skills,
            malformed: Vec::new(),
            cycles: Vec::new(),
            resolution: ResolutionOutcome::Resolved {
                configuration: ResolvedConfiguration::default(),
            },
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert_eq!(ExitStatus::InputError.code(), 2);
    }

    #[test]
    fn test_clean_run_succeeds() {
        assert_eq!(report(vec![skill("a", Verdict::Safe)]).exit_status(), ExitStatus::Success);
    }

    #[test]
    fn test_no_skills_is_input_error() {
        assert_eq!(report(Vec::new()).exit_status(), ExitStatus::InputError);
    }

    #[test]
    fn test_malformed_record_wins_over_findings() {
        let mut r = report(vec![skill("a", Verdict::Unsafe)]);
        r.malformed.push(MalformedRecord::new("b/SKILL.md", "missing name"));
        assert_eq!(r.exit_status(), ExitStatus::InputError);
    }

    #[test]
    fn test_unsafe_verdict_fails() {
        let mut unsafe_skill = skill("a", Verdict::Unsafe);
        unsafe_skill.findings.push(Finding::new(
            "a",
            Severity::High,
            FindingKind::CapabilityViolation,
            "undeclared network access",
            "",
            AttackClass::PrivilegeEscalation,
        ));
        let r = report(vec![unsafe_skill, skill("b", Verdict::Safe)]);
        assert_eq!(r.unsafe_count(), 1);
        assert_eq!(r.exit_status(), ExitStatus::Failure);
    }

    #[test]
    fn test_resolution_failures_fail_run() {
        let mut r = report(vec![skill("a", Verdict::Safe)]);
        r.resolution = ResolutionOutcome::Timeout;
        assert_eq!(r.exit_status(), ExitStatus::Failure);

        r.resolution = ResolutionOutcome::Skipped {
            reason: "analysis only".into(),
        };
        assert_eq!(r.exit_status(), ExitStatus::Success);

        r.cycles.push(CyclicDependency {
            cycle: vec!["x".into(), "y".into(), "x".into()],
            component: vec!["x".into(), "y".into()],
        });
        assert_eq!(r.exit_status(), ExitStatus::Failure);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ResolutionOutcome::Timeout).unwrap();
        assert_eq!(json["status"], "timeout");
    }
}

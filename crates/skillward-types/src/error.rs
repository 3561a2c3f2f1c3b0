use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolution::Constraint;

/// A parser produced a record the core cannot analyze.
///
/// Isolated to the one skill (or file) it names; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("malformed record '{origin}': {reason}")]
pub struct MalformedRecord {
    /// Source path or skill name the record came from.
    pub origin: String,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// A dependency cycle, with every skill excluded because of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("circular dependency detected: {}", cycle.join(" -> "))]
pub struct CyclicDependency {
    /// Skills on the cycle starting from the alphabetically first, with the
    /// first repeated at the end.
    pub cycle: Vec<String>,
    /// Every skill in the connected component containing the cycle, sorted.
    pub component: Vec<String>,
}

/// No assignment satisfies the constraints.
///
/// `constraints` is a minimal subset: dropping any one of them makes the
/// remainder satisfiable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("unsatisfiable constraints: {}", render(constraints))]
pub struct ConflictError {
    pub constraints: Vec<Constraint>,
}

impl ConflictError {
    pub fn describe(&self) -> Vec<String> {
        self.constraints.iter().map(ToString::to_string).collect()
    }
}

fn render(constraints: &[Constraint]) -> String {
    constraints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionConstraint;

    #[test]
    fn test_malformed_record_display() {
        let err = MalformedRecord::new("skills/a/SKILL.md", "missing name");
        assert_eq!(err.to_string(), "malformed record 'skills/a/SKILL.md': missing name");
    }

    #[test]
    fn test_cycle_display() {
        let err = CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
            component: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_conflict_lists_every_constraint() {
        let err = ConflictError {
            constraints: vec![
                Constraint::VersionRequirement {
                    from: "a@1.0.0".into(),
                    to: "c".into(),
                    requirement: VersionConstraint::parse("^1.0").unwrap(),
                },
                Constraint::VersionRequirement {
                    from: "b@1.0.0".into(),
                    to: "c".into(),
                    requirement: VersionConstraint::parse("^2.0").unwrap(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("a@1.0.0 requires c ^1.0"));
        assert!(text.contains("b@1.0.0 requires c ^2.0"));
        assert_eq!(err.describe().len(), 2);
    }
}

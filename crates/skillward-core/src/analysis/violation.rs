//! Declared-versus-inferred comparison.
//!
//! Every resource where the inferred level exceeds the declared level yields
//! a `capability_violation`; every resource declared two or more levels above
//! what is used yields an informational `pola_violation`.

use serde::{Deserialize, Serialize};
use skillward_types::capability::{CapabilitySet, Resource};
use skillward_types::finding::{
    max_safety_severity, AttackClass, Finding, FindingKind, Severity,
};
use skillward_types::skill::UnifiedSkillRecord;

use super::inference::InferredCapabilities;

/// Declared excess (in levels) at which over-declaration is reported.
pub const POLA_EXCESS_LEVELS: u8 = 2;

/// Behavioral trust lost per severity tier.
pub const BEHAVIORAL_STEP: f64 = 0.25;

/// Severity of an undeclared access `gap` levels above the declaration.
///
/// Process and network escalations rank one tier higher.
pub fn violation_severity(resource: Resource, gap: u8) -> Severity {
    let base = Severity::from_rank(gap.min(3));
    if resource.is_security_sensitive() {
        base.escalate()
    } else {
        base
    }
}

/// Compare inferred against declared capabilities. Output is ordered by
/// resource, so identical input always yields an identical list.
pub fn detect_violations(
    record: &UnifiedSkillRecord,
    inferred: &InferredCapabilities,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let caps = inferred.capabilities();

    for resource in Resource::ALL {
        let used = caps.get(resource);
        let declared = record.declared.get(resource);

        if used > declared {
            let gap = used.rank() - declared.rank();
            let declared_text = if declared.rank() == 0 {
                format!("{resource}:NONE (undeclared)")
            } else {
                format!("{resource}:{declared}")
            };
            let locations = inferred.locations_above(resource, declared);
            let evidence = if locations.is_empty() {
                format!("inferred={resource}:{used}")
            } else {
                format!("inferred={resource}:{used} at {}", locations.join(", "))
            };
            findings.push(Finding::new(
                &record.name,
                violation_severity(resource, gap),
                FindingKind::CapabilityViolation,
                format!("skill requires {resource}:{used} but only declares {declared_text}"),
                evidence,
                AttackClass::PrivilegeEscalation,
            ));
        } else if declared.rank() >= used.rank() + POLA_EXCESS_LEVELS {
            findings.push(Finding::new(
                &record.name,
                Severity::Low,
                FindingKind::PolaViolation,
                format!("skill declares {resource}:{declared} but only uses {resource}:{used}"),
                format!("declared={resource}:{declared}"),
                AttackClass::ExcessiveAuthority,
            ));
        }
    }

    findings
}

/// Behavioral trust signal: 1.0 with no safety findings, one step lower per
/// severity tier of the worst one, 0.0 at CRITICAL.
pub fn behavioral_signal(findings: &[Finding]) -> f64 {
    match max_safety_severity(findings) {
        None => 1.0,
        Some(worst) => (1.0 - BEHAVIORAL_STEP * f64::from(worst.rank())).max(0.0),
    }
}

/// Least-authority summary for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolaCompliance {
    /// Inferred capabilities are within the declared set.
    pub bounded: bool,
    /// Resources declared above what is used.
    pub over_declared: Vec<Resource>,
    /// Share of declared authority (in levels) actually used, in `[0, 1]`.
    pub utilization: f64,
}

impl PolaCompliance {
    /// Bounded, with no declared excess.
    pub fn is_compliant(&self) -> bool {
        self.bounded && self.over_declared.is_empty()
    }
}

pub fn pola_compliance(declared: &CapabilitySet, inferred: &CapabilitySet) -> PolaCompliance {
    let mut declared_levels = 0u32;
    let mut used_levels = 0u32;
    let mut over_declared = Vec::new();

    for resource in Resource::ALL {
        let d = declared.get(resource);
        let u = inferred.get(resource);
        declared_levels += u32::from(d.rank());
        used_levels += u32::from(u.meet(d).rank());
        if d > u {
            over_declared.push(resource);
        }
    }

    let utilization = if declared_levels == 0 {
        1.0
    } else {
        f64::from(used_levels) / f64::from(declared_levels)
    };

    PolaCompliance {
        bounded: inferred.leq(declared),
        over_declared,
        utilization,
    }
}

//! Findings, severities, and the derived verdict.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "critical")]
    Critical,
}

impl Severity {
    /// `LOW` = 1 .. `CRITICAL` = 4.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Severity {
        match rank {
            0 | 1 => Severity::Low,
            2 => Severity::Medium,
            3 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// One tier higher, saturating at `CRITICAL`.
    pub fn escalate(self) -> Severity {
        Severity::from_rank(self.rank() + 1)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// How a finding was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Inferred access exceeds the declared access.
    CapabilityViolation,
    /// Declared access exceeds the inferred access by two or more levels.
    PolaViolation,
    /// Content matched a known-dangerous pattern.
    PatternMatch,
    /// Cross-channel information flow concern (e.g. encoding + egress).
    InfoFlow,
}

impl FindingKind {
    /// Informational kinds never affect the verdict or behavioral trust.
    pub fn is_informational(self) -> bool {
        matches!(self, FindingKind::PolaViolation)
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindingKind::CapabilityViolation => "capability_violation",
            FindingKind::PolaViolation => "pola_violation",
            FindingKind::PatternMatch => "pattern_match",
            FindingKind::InfoFlow => "info_flow",
        };
        f.write_str(s)
    }
}

/// Threat taxonomy tag attached to every finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackClass {
    PrivilegeEscalation,
    DataExfiltration,
    ExcessiveAuthority,
    SupplyChain,
}

impl fmt::Display for AttackClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackClass::PrivilegeEscalation => "privilege_escalation",
            AttackClass::DataExfiltration => "data_exfiltration",
            AttackClass::ExcessiveAuthority => "excessive_authority",
            AttackClass::SupplyChain => "supply_chain",
        };
        f.write_str(s)
    }
}

/// A single reported discrepancy. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    skill: String,
    severity: Severity,
    kind: FindingKind,
    message: String,
    evidence: String,
    attack_class: AttackClass,
}

impl Finding {
    pub fn new(
        skill: impl Into<String>,
        severity: Severity,
        kind: FindingKind,
        message: impl Into<String>,
        evidence: impl Into<String>,
        attack_class: AttackClass,
    ) -> Self {
        Self {
            skill: skill.into(),
            severity,
            kind,
            message: message.into(),
            evidence: evidence.into(),
            attack_class,
        }
    }

    pub fn skill(&self) -> &str {
        &self.skill
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn kind(&self) -> FindingKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn evidence(&self) -> &str {
        &self.evidence
    }

    pub fn attack_class(&self) -> AttackClass {
        self.attack_class
    }

    /// Whether this finding counts toward the verdict.
    pub fn affects_safety(&self) -> bool {
        !self.kind.is_informational()
    }
}

/// Pass/fail outcome for a skill, always recomputed from its findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Safe,
    Unsafe,
}

impl Verdict {
    /// SAFE iff no safety-relevant finding reaches `threshold`.
    pub fn from_findings(findings: &[Finding], threshold: Severity) -> Verdict {
        let failing = findings
            .iter()
            .filter(|f| f.affects_safety())
            .any(|f| f.severity() >= threshold);
        if failing { Verdict::Unsafe } else { Verdict::Safe }
    }

    pub fn is_safe(self) -> bool {
        matches!(self, Verdict::Safe)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => f.write_str("SAFE"),
            Verdict::Unsafe => f.write_str("UNSAFE"),
        }
    }
}

/// Highest severity among safety-relevant findings.
pub fn max_safety_severity(findings: &[Finding]) -> Option<Severity> {
    findings
        .iter()
        .filter(|f| f.affects_safety())
        .map(Finding::severity)
        .max()
}

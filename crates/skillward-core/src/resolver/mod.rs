//! Constraint-based dependency resolution.
//!
//! Version requirements, capability bounds, trust floors, and conflict
//! declarations are encoded as one Boolean formula and solved together.
//! A satisfying assignment is the resolved configuration; an unsatisfiable
//! formula yields a [`ConflictError`] carrying a minimal conflicting subset.

pub mod encode;
pub mod sat;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use semver::Version;
use skillward_types::capability::CapabilitySet;
use skillward_types::config::{ExternalDependencies, ResolverConfig};
use skillward_types::error::{ConflictError, CyclicDependency};
use skillward_types::resolution::{Constraint, Policy, ResolvedConfiguration, ResolvedSkill};
use skillward_types::skill::UnifiedSkillRecord;
use skillward_types::trust::TrustScore;

use crate::graph::DependencyGraph;
use crate::trust::propagate;

use self::encode::{encode, Encoding};
use self::sat::{solve, Budget, SolveOutcome};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("resolution exceeded its time or decision budget")]
    Timeout,

    #[error("no skills to resolve")]
    NoSkills,

    #[error(transparent)]
    Cycle(#[from] CyclicDependency),

    /// The chosen configuration failed re-verification.
    #[error("resolved configuration violates {} constraint(s)", .0.len())]
    Inconsistent(Vec<Constraint>),
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// One selectable skill version with its analysis results.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: UnifiedSkillRecord,
    pub version: Version,
    /// Inferred capabilities of this version.
    pub inferred: CapabilitySet,
    /// Intrinsic trust of this version; propagation happens after selection.
    pub trust: TrustScore,
}

impl Candidate {
    pub fn id(&self) -> String {
        format!("{}@{}", self.record.name, self.version)
    }
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub max_decisions: u64,
    pub timeout: Option<Duration>,
    pub external: ExternalDependencies,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        (&ResolverConfig::default()).into()
    }
}

impl From<&ResolverConfig> for ResolveOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            max_decisions: config.max_decisions,
            timeout: Some(Duration::from_secs(config.timeout_secs)),
            external: config.external_dependencies,
        }
    }
}

/// A configuration plus whatever was excluded to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub configuration: ResolvedConfiguration,
    pub cycles: Vec<CyclicDependency>,
    /// Names left out because they share a component with a cycle.
    pub excluded: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

/// Choose one version per skill name satisfying every constraint at once.
///
/// Among satisfying assignments the first name (alphabetically) gets its
/// highest feasible version, then the next name, and so on, so unchanged
/// input always resolves identically.
pub fn resolve(
    candidates: &[Candidate],
    policy: &Policy,
    options: &ResolveOptions,
) -> Result<Resolution, ResolveError> {
    if candidates.is_empty() {
        return Err(ResolveError::NoSkills);
    }
    let budget = Budget {
        max_decisions: options.max_decisions,
        deadline: options.timeout.map(|t| Instant::now() + t),
    };

    let in_scan: BTreeSet<String> = candidates.iter().map(|c| c.record.name.clone()).collect();
    let full = DependencyGraph::from_records(candidates.iter().map(|c| &c.record));
    let (_, cycles, excluded) = full.split_cycles();
    for cycle in &cycles {
        tracing::warn!(cycle = %cycle, excluded = ?cycle.component, "dependency cycle excluded from resolution");
    }

    let mut active: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(&c.record.name))
        .collect();
    active.sort_by(|a, b| {
        a.record
            .name
            .cmp(&b.record.name)
            .then_with(|| b.version.cmp(&a.version))
    });
    if active.is_empty() {
        return Ok(Resolution {
            configuration: ResolvedConfiguration::default(),
            cycles,
            excluded,
        });
    }

    let encoding = encode(&active, policy, &in_scan, options.external);
    tracing::debug!(
        vars = encoding.num_vars,
        hard = encoding.hard.len(),
        soft = encoding.soft.len(),
        "resolution encoded"
    );

    let all = vec![true; encoding.soft.len()];
    let model = match solve(encoding.num_vars, &encoding.clauses_with(&all), budget) {
        SolveOutcome::Sat(model) => model,
        SolveOutcome::Exhausted => return Err(ResolveError::Timeout),
        SolveOutcome::Unsat => {
            let constraints = minimal_conflict(&encoding, budget)?;
            tracing::info!(constraints = constraints.len(), "resolution unsatisfiable");
            return Err(ConflictError { constraints }.into());
        }
    };

    // The model also covers trust-floor auxiliaries past the candidates.
    let chosen: Vec<&Candidate> = active
        .iter()
        .zip(&model)
        .filter(|(_, selected)| **selected)
        .map(|(c, _)| *c)
        .collect();
    let configuration = build_configuration(&chosen, &in_scan)?;

    let records: Vec<UnifiedSkillRecord> = active.iter().map(|c| c.record.clone()).collect();
    configuration
        .verify(&records, policy)
        .map_err(ResolveError::Inconsistent)?;

    tracing::info!(skills = configuration.len(), "resolution complete");
    Ok(Resolution {
        configuration,
        cycles,
        excluded,
    })
}

/// Deletion-based minimal unsatisfiable subset over the soft groups.
///
/// Hard clauses alone are always satisfiable, so the result is non-empty.
fn minimal_conflict(encoding: &Encoding, budget: Budget) -> Result<Vec<Constraint>, ResolveError> {
    let mut enabled = vec![true; encoding.soft.len()];
    for i in 0..enabled.len() {
        enabled[i] = false;
        match solve(encoding.num_vars, &encoding.clauses_with(&enabled), budget) {
            SolveOutcome::Unsat => {}
            SolveOutcome::Sat(_) => enabled[i] = true,
            SolveOutcome::Exhausted => return Err(ResolveError::Timeout),
        }
    }

    let mut constraints: Vec<Constraint> = encoding
        .soft
        .iter()
        .zip(&enabled)
        .filter(|(_, on)| **on)
        .map(|(group, _)| group.constraint.clone())
        .collect();
    constraints.sort_by_key(|c| c.to_string());
    Ok(constraints)
}

fn build_configuration(
    chosen: &[&Candidate],
    in_scan: &BTreeSet<String>,
) -> Result<ResolvedConfiguration, ResolveError> {
    let graph = DependencyGraph::from_records(chosen.iter().map(|c| &c.record));
    let intrinsic = chosen
        .iter()
        .map(|c| {
            (
                c.record.name.clone(),
                (c.trust.intrinsic(), *c.trust.signals()),
            )
        })
        .collect();
    let scores = propagate(&graph, &intrinsic)?;

    let versions: BTreeMap<&str, String> = chosen
        .iter()
        .map(|c| (c.record.name.as_str(), c.version.to_string()))
        .collect();

    let mut skills = BTreeMap::new();
    for candidate in chosen {
        let record = &candidate.record;
        let mut dependencies = BTreeMap::new();
        let mut external = BTreeMap::new();
        for (dep, requirement) in &record.dependencies {
            match versions.get(dep.as_str()) {
                Some(v) => {
                    dependencies.insert(dep.clone(), v.clone());
                }
                None if !in_scan.contains(dep) => {
                    tracing::warn!(
                        skill = %candidate.id(),
                        dependency = %dep,
                        requirement = %requirement,
                        "dependency not in scan, left unresolved"
                    );
                    external.insert(dep.clone(), requirement.to_string());
                }
                None => {}
            }
        }

        let trust = scores.get(&record.name).copied().unwrap_or(candidate.trust);
        skills.insert(
            record.name.clone(),
            ResolvedSkill {
                name: record.name.clone(),
                version: candidate.version.to_string(),
                format: record.format.clone(),
                source_path: record.source_path.clone(),
                integrity: record.integrity.clone(),
                capabilities: candidate.inferred.clone(),
                declared: record.declared.clone(),
                trust,
                dependencies,
                external,
            },
        );
    }

    Ok(ResolvedConfiguration { skills })
}

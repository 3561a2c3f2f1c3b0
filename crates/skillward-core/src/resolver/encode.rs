//! Boolean encoding of a resolution problem.
//!
//! One variable per candidate skill version, numbered by name ascending then
//! version descending. Exactly-one-per-name clauses are hard; every input
//! constraint becomes a soft group of clauses that can be switched off when
//! searching for a minimal conflict.
//!
//! Trust floors follow the dependency edges of the versions actually chosen.
//! For every floor level `F` in use there is one auxiliary variable per name,
//! numbered after all candidates: `reach(F, n)` is forced true when the chosen
//! version of `n` is reachable from a chosen skill whose floor is `F`. A
//! reached version below `F` cannot be selected. The propagation and ban
//! clauses are hard (all-false auxiliaries satisfy them); only the root
//! implication `x -> reach(F, name(x))` is soft, so a minimal conflict names
//! the dependent whose floor failed.

use std::collections::{BTreeMap, BTreeSet};

use skillward_types::config::ExternalDependencies;
use skillward_types::resolution::{Constraint, Policy};
use skillward_types::trust::TrustLevel;

use super::sat::{Clause, Lit};
use super::Candidate;

/// One input constraint and the clauses that enforce it.
#[derive(Debug, Clone)]
pub struct SoftGroup {
    pub constraint: Constraint,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
pub struct Encoding {
    pub num_vars: usize,
    pub hard: Vec<Clause>,
    pub soft: Vec<SoftGroup>,
}

impl Encoding {
    /// Hard clauses plus the clauses of every enabled soft group.
    pub fn clauses_with(&self, enabled: &[bool]) -> Vec<&Clause> {
        self.hard
            .iter()
            .chain(
                self.soft
                    .iter()
                    .zip(enabled)
                    .filter(|(_, on)| **on)
                    .flat_map(|(group, _)| group.clauses.iter()),
            )
            .collect()
    }
}

/// Encode `candidates`, which must already be in variable order.
///
/// `in_scan` is every name present in the scan, used to tell external
/// dependencies apart.
pub fn encode(
    candidates: &[&Candidate],
    policy: &Policy,
    in_scan: &BTreeSet<String>,
    external: ExternalDependencies,
) -> Encoding {
    let mut by_name: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (var, candidate) in candidates.iter().enumerate() {
        by_name
            .entry(candidate.record.name.as_str())
            .or_default()
            .push(var);
    }

    // Exactly one version per name.
    let mut hard = Vec::new();
    for vars in by_name.values() {
        hard.push(vars.iter().map(|v| Lit::pos(*v)).collect());
        for (i, a) in vars.iter().enumerate() {
            for b in &vars[i + 1..] {
                hard.push(vec![Lit::neg(*a), Lit::neg(*b)]);
            }
        }
    }

    let mut num_vars = candidates.len();
    let floors: BTreeSet<TrustLevel> = by_name
        .keys()
        .map(|name| policy.for_skill(name).min_trust)
        .filter(|floor| *floor > TrustLevel::Unsigned)
        .collect();
    let mut reach: BTreeMap<(TrustLevel, &str), usize> = BTreeMap::new();
    for floor in &floors {
        for name in by_name.keys() {
            reach.insert((*floor, *name), num_vars);
            num_vars += 1;
        }
    }

    // Reachability along chosen edges, one auxiliary per floor and name.
    for floor in &floors {
        for (var, candidate) in candidates.iter().enumerate() {
            let Some(&here) = reach.get(&(*floor, candidate.record.name.as_str())) else {
                continue;
            };
            if candidate.trust.intrinsic_level() < *floor {
                hard.push(vec![Lit::neg(here), Lit::neg(var)]);
            }
            for dep in candidate.record.dependencies.keys() {
                if let Some(&there) = reach.get(&(*floor, dep.as_str())) {
                    hard.push(vec![Lit::neg(here), Lit::neg(var), Lit::pos(there)]);
                }
            }
        }
    }

    let mut soft = Vec::new();
    for (var, candidate) in candidates.iter().enumerate() {
        let record = &candidate.record;
        let id = candidate.id();

        for (dep, requirement) in &record.dependencies {
            let constraint = Constraint::VersionRequirement {
                from: id.clone(),
                to: dep.clone(),
                requirement: requirement.clone(),
            };
            if let Some(vars) = by_name.get(dep.as_str()) {
                let mut clause = vec![Lit::neg(var)];
                clause.extend(
                    vars.iter()
                        .filter(|v| requirement.matches(&candidates[**v].version))
                        .map(|v| Lit::pos(*v)),
                );
                soft.push(SoftGroup {
                    constraint,
                    clauses: vec![clause],
                });
            } else if !in_scan.contains(dep) && external == ExternalDependencies::Reject {
                soft.push(SoftGroup {
                    constraint,
                    clauses: vec![vec![Lit::neg(var)]],
                });
            }
        }

        let skill_policy = policy.for_skill(&record.name);
        if !candidate.inferred.leq(&skill_policy.max_capabilities) {
            soft.push(SoftGroup {
                constraint: Constraint::CapabilityBound {
                    skill: id.clone(),
                    inferred: candidate.inferred.clone(),
                    bound: skill_policy.max_capabilities.clone(),
                },
                clauses: vec![vec![Lit::neg(var)]],
            });
        }

        let floor = skill_policy.min_trust;
        if let Some(&root) = reach.get(&(floor, record.name.as_str())) {
            let level = weakest_reachable(var, candidates, &by_name);
            if level < floor {
                soft.push(SoftGroup {
                    constraint: Constraint::TrustFloor {
                        skill: id.clone(),
                        level,
                        floor,
                    },
                    clauses: vec![vec![Lit::neg(var), Lit::pos(root)]],
                });
            }
        }

        for (other, requirement) in &record.conflicts {
            if other == &record.name {
                continue;
            }
            let Some(vars) = by_name.get(other.as_str()) else {
                continue;
            };
            let clauses: Vec<Clause> = vars
                .iter()
                .filter(|v| requirement.matches(&candidates[**v].version))
                .map(|v| vec![Lit::neg(var), Lit::neg(*v)])
                .collect();
            if !clauses.is_empty() {
                soft.push(SoftGroup {
                    constraint: Constraint::Conflict {
                        from: id.clone(),
                        with: other.clone(),
                        requirement: requirement.clone(),
                    },
                    clauses,
                });
            }
        }
    }

    Encoding {
        num_vars,
        hard,
        soft,
    }
}

/// Lowest intrinsic level among `start` and every candidate some version
/// chain from it could pull in. When this meets the floor, the floor can
/// never fail and needs no clauses.
fn weakest_reachable(
    start: usize,
    candidates: &[&Candidate],
    by_name: &BTreeMap<&str, Vec<usize>>,
) -> TrustLevel {
    let mut seen = BTreeSet::from([start]);
    let mut stack = vec![start];
    let mut weakest = candidates[start].trust.intrinsic_level();
    while let Some(var) = stack.pop() {
        for dep in candidates[var].record.dependencies.keys() {
            for &next in by_name.get(dep.as_str()).into_iter().flatten() {
                if seen.insert(next) {
                    weakest = weakest.min(candidates[next].trust.intrinsic_level());
                    stack.push(next);
                }
            }
        }
    }
    weakest
}

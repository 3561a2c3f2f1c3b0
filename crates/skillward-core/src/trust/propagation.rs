//! Effective trust over the dependency graph.
//!
//! `effective(S) = min(intrinsic(S), min over deps D of effective(D))`,
//! folded wave by wave with leaves first so every dependency is final before
//! any dependent reads it.

use std::collections::BTreeMap;

use skillward_types::error::CyclicDependency;
use skillward_types::trust::{TrustScore, TrustSignals};

use crate::graph::DependencyGraph;

/// Effective score from an intrinsic score and the dependencies' effective
/// scores. Non-decreasing in every argument.
pub fn effective_score(intrinsic: f64, dependencies: &[f64]) -> f64 {
    dependencies
        .iter()
        .copied()
        .fold(intrinsic, f64::min)
        .clamp(0.0, 1.0)
}

/// Propagate intrinsic scores through `graph`.
///
/// `intrinsic` maps each skill name to its intrinsic score and the signals
/// that produced it. Skills in the graph without an entry are skipped, and
/// so are their dependents' edges to them. Fails if the graph has a cycle.
pub fn propagate(
    graph: &DependencyGraph,
    intrinsic: &BTreeMap<String, (f64, TrustSignals)>,
) -> Result<BTreeMap<String, TrustScore>, CyclicDependency> {
    let waves = graph.waves()?;
    let mut scores: BTreeMap<String, TrustScore> = BTreeMap::new();

    for (depth, wave) in waves.iter().enumerate() {
        for name in wave {
            let Some((score, signals)) = intrinsic.get(name) else {
                continue;
            };
            let deps: Vec<f64> = graph
                .dependencies(name)
                .into_iter()
                .filter_map(|d| scores.get(d).map(TrustScore::effective))
                .collect();
            let floor = (!deps.is_empty()).then(|| effective_score(1.0, &deps));
            let result = TrustScore::capped(*score, *signals, floor);
            tracing::trace!(
                skill = %name,
                depth,
                intrinsic = result.intrinsic(),
                effective = result.effective(),
                "trust propagated"
            );
            scores.insert(name.clone(), result);
        }
    }

    Ok(scores)
}

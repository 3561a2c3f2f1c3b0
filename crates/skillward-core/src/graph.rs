//! Skill dependency graph.
//!
//! Uses petgraph to model name-level dependencies as a directed graph with an
//! edge from each skill to every skill it depends on. Provides cycle
//! detection (Tarjan SCC), weakly connected components, leaves-first depth
//! waves, transitive closure, and reverse vulnerability propagation.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use semver::Version;
use skillward_types::error::CyclicDependency;
use skillward_types::skill::UnifiedSkillRecord;

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Directed graph over skill names; `a -> b` means `a` depends on `b`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records. Every record's name becomes a node; dependency
    /// edges are added only toward names present in `records`, so external
    /// dependencies are ignored. Several versions of one name contribute the
    /// union of their edges.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UnifiedSkillRecord>) -> Self {
        let records: Vec<&UnifiedSkillRecord> = records.into_iter().collect();
        let mut graph = Self::new();
        for record in &records {
            graph.add_skill(&record.name);
        }
        for record in &records {
            for dep in record.dependencies.keys() {
                if graph.contains(dep) {
                    graph.add_dependency(&record.name, dep);
                }
            }
        }
        graph
    }

    pub fn add_skill(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add `from -> to`, creating either node if needed. Duplicate edges are
    /// collapsed.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let a = self.add_skill(from);
        let b = self.add_skill(to);
        self.graph.update_edge(a, b, ());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Direct dependencies of `name`, sorted.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Skills that depend directly on `name`, sorted.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(*idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Everything `name` depends on, directly or transitively.
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        self.reachable(name, Direction::Outgoing)
    }

    /// Everything that depends on `name`, directly or transitively.
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        self.reachable(name, Direction::Incoming)
    }

    fn reachable(&self, name: &str, direction: Direction) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let Some(start) = self.index.get(name) else {
            return seen;
        };
        let mut stack = vec![*start];
        while let Some(current) = stack.pop() {
            for next in self.graph.neighbors_directed(current, direction) {
                if seen.insert(self.graph[next].clone()) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    // -----------------------------------------------------------------------
    // Cycles and components
    // -----------------------------------------------------------------------

    /// Weakly connected components, each sorted, in order of their first name.
    pub fn components(&self) -> Vec<BTreeSet<String>> {
        let mut sets = UnionFind::<usize>::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut grouped: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        for idx in self.graph.node_indices() {
            grouped
                .entry(sets.find(idx.index()))
                .or_default()
                .insert(self.graph[idx].clone());
        }

        let mut components: Vec<BTreeSet<String>> = grouped.into_values().collect();
        components.sort();
        components
    }

    /// Every dependency cycle, one per strongly connected component that has
    /// more than one node or a self-loop.
    ///
    /// Each carries the weakly connected component it sits in.
    pub fn cycles(&self) -> Vec<CyclicDependency> {
        let components = self.components();
        let mut cycles: Vec<CyclicDependency> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let cycle = self.cycle_path(&scc);
                let component = components
                    .iter()
                    .find(|c| c.contains(&cycle[0]))
                    .map(|c| c.iter().cloned().collect())
                    .unwrap_or_else(|| cycle.clone());
                CyclicDependency { cycle, component }
            })
            .collect();
        cycles.sort_by(|a, b| a.cycle.cmp(&b.cycle));
        cycles
    }

    /// One concrete cycle inside a strongly connected component, starting and
    /// ending at its alphabetically first skill.
    fn cycle_path(&self, scc: &[NodeIndex]) -> Vec<String> {
        let members: BTreeSet<NodeIndex> = scc.iter().copied().collect();
        let start = scc
            .iter()
            .copied()
            .min_by(|a, b| self.graph[*a].cmp(&self.graph[*b]))
            .unwrap_or(scc[0]);

        let sorted_successors = |n: NodeIndex| {
            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(n, Direction::Outgoing)
                .filter(|m| members.contains(m))
                .collect();
            next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            next
        };

        // BFS from start until some node closes the loop back to start.
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut closing = None;
        while let Some(current) = queue.pop_front() {
            let next = sorted_successors(current);
            if next.contains(&start) {
                closing = Some(current);
                break;
            }
            for n in next {
                if n != start && !parent.contains_key(&n) {
                    parent.insert(n, current);
                    queue.push_back(n);
                }
            }
        }

        let mut path = Vec::new();
        let mut cursor = closing.unwrap_or(start);
        while cursor != start {
            path.push(self.graph[cursor].clone());
            cursor = match parent.get(&cursor) {
                Some(p) => *p,
                None => break,
            };
        }
        path.push(self.graph[start].clone());
        path.reverse();
        path.push(self.graph[start].clone());
        path
    }

    /// Split off every component that contains a cycle.
    ///
    /// Returns the acyclic remainder, the cycles found, and the excluded names.
    pub fn split_cycles(&self) -> (DependencyGraph, Vec<CyclicDependency>, BTreeSet<String>) {
        let cycles = self.cycles();
        let excluded: BTreeSet<String> = cycles
            .iter()
            .flat_map(|c| c.component.iter().cloned())
            .collect();
        (self.without(&excluded), cycles, excluded)
    }

    /// Copy of the graph with `excluded` names (and their edges) removed.
    pub fn without(&self, excluded: &BTreeSet<String>) -> DependencyGraph {
        let mut out = DependencyGraph::new();
        for name in self.names().filter(|n| !excluded.contains(*n)) {
            out.add_skill(name);
        }
        for edge in self.graph.edge_references() {
            let from = &self.graph[edge.source()];
            let to = &self.graph[edge.target()];
            if !excluded.contains(from) && !excluded.contains(to) {
                out.add_dependency(from, to);
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Waves
    // -----------------------------------------------------------------------

    /// Group skills into depth waves, leaves first.
    ///
    /// Wave 0 holds skills with no dependencies; every skill sits one wave
    /// after its deepest dependency. All skills within a wave are independent
    /// of each other. Names within a wave are sorted.
    pub fn waves(&self) -> Result<Vec<Vec<String>>, CyclicDependency> {
        if self.is_empty() {
            return Ok(vec![]);
        }

        let sorted = toposort(&self.graph, None).map_err(|_| {
            self.cycles().into_iter().next().unwrap_or_else(|| CyclicDependency {
                cycle: Vec::new(),
                component: self.names().map(String::from).collect(),
            })
        })?;

        // toposort puts dependents first; walk it backwards so every
        // dependency's depth is known before its dependents.
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        for &idx in sorted.iter().rev() {
            let d = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|dep| depth.get(&dep).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            depth.insert(idx, d);
        }

        let max_depth = depth.values().copied().max().unwrap_or(0);
        let mut waves: Vec<Vec<String>> = vec![vec![]; max_depth + 1];
        for (name, idx) in &self.index {
            waves[depth[idx]].push(name.clone());
        }
        Ok(waves)
    }
}

// ---------------------------------------------------------------------------
// Version-level queries
// ---------------------------------------------------------------------------

/// Pick the highest version of `name` satisfying `accept`.
fn highest_matching<'a>(
    records: &'a [UnifiedSkillRecord],
    name: &str,
    accept: impl Fn(&Version) -> bool,
) -> Option<(&'a UnifiedSkillRecord, Version)> {
    records
        .iter()
        .filter(|r| r.name == name)
        .filter_map(|r| Version::parse(&r.version).ok().map(|v| (r, v)))
        .filter(|(_, v)| accept(v))
        .max_by(|a, b| a.1.cmp(&b.1))
}

/// Transitive dependencies of `root`, following the highest satisfying
/// version along each edge.
///
/// Names with no satisfying version (or not in `records`) are left out.
/// The first version reached for a name wins, so diamonds are walked once.
pub fn transitive_versions(
    records: &[UnifiedSkillRecord],
    root: &UnifiedSkillRecord,
) -> BTreeMap<String, Version> {
    let mut chosen: BTreeMap<String, Version> = BTreeMap::new();
    let mut queue: VecDeque<&UnifiedSkillRecord> = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        for (dep, requirement) in &current.dependencies {
            if dep == &root.name || chosen.contains_key(dep) {
                continue;
            }
            if let Some((record, version)) =
                highest_matching(records, dep, |v| requirement.matches(v))
            {
                chosen.insert(dep.clone(), version);
                queue.push_back(record);
            }
        }
    }

    chosen
}

/// Every skill version transitively affected by a known-vulnerable set.
///
/// A version is affected if any of its dependency requirements admits a
/// vulnerable or affected version of that dependency. Returns `name@version`
/// ids, including the vulnerable ones themselves.
pub fn affected_by(records: &[UnifiedSkillRecord], vulnerable: &[(String, Version)]) -> BTreeSet<String> {
    let mut affected: BTreeSet<(String, Version)> = vulnerable.iter().cloned().collect();

    loop {
        let mut changed = false;
        for record in records {
            let Ok(version) = Version::parse(&record.version) else {
                continue;
            };
            let key = (record.name.clone(), version);
            if affected.contains(&key) {
                continue;
            }
            let hit = record.dependencies.iter().any(|(dep, requirement)| {
                affected
                    .iter()
                    .any(|(name, v)| name == dep && requirement.matches(v))
            });
            if hit {
                affected.insert(key);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    affected
        .into_iter()
        .map(|(name, version)| format!("{name}@{version}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use skillward_types::version::VersionConstraint;

    fn rec(name: &str, version: &str, deps: &[(&str, &str)]) -> UnifiedSkillRecord {
        let mut r = UnifiedSkillRecord::new(name, version, "record");
        for (dep, req) in deps {
            r.dependencies
                .insert(dep.to_string(), VersionConstraint::parse(req).unwrap());
        }
        r
    }

    fn graph(edges: &[(&str, &str)], nodes: &[&str]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for n in nodes {
            g.add_skill(n);
        }
        for (a, b) in edges {
            g.add_dependency(a, b);
        }
        g
    }

    #[test]
    fn test_from_records_ignores_external_dependencies() {
        let records = vec![rec("a", "1.0.0", &[("b", "*"), ("left-pad", "*")]), rec("b", "1.0.0", &[])];
        let g = DependencyGraph::from_records(&records);
        assert_eq!(g.len(), 2);
        assert_eq!(g.dependencies("a"), vec!["b"]);
        assert!(!g.contains("left-pad"));
        assert_eq!(g.dependents("b"), vec!["a"]);
    }

    #[test]
    fn test_waves_put_leaves_first() {
        // a -> b -> d, a -> c -> d
        let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")], &[]);
        let waves = g.waves().unwrap();
        assert_eq!(waves, vec![vec!["d"], vec!["b", "c"], vec!["a"]]);
    }

    #[test]
    fn test_independent_skills_single_wave() {
        let g = graph(&[], &["x", "y", "z"]);
        assert_eq!(g.waves().unwrap(), vec![vec!["x", "y", "z"]]);
    }

    #[test]
    fn test_two_node_cycle_detected_with_component() {
        let g = graph(&[("a", "b"), ("b", "a"), ("c", "a")], &["solo"]);
        let cycles = g.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].cycle, vec!["a", "b", "a"]);
        assert_eq!(cycles[0].component, vec!["a", "b", "c"]);
        assert!(g.waves().is_err());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(&[("a", "a")], &[]);
        let cycles = g.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].cycle, vec!["a", "a"]);
    }

    #[test]
    fn test_three_node_cycle_path() {
        let g = graph(&[("b", "c"), ("c", "a"), ("a", "b")], &[]);
        assert_eq!(g.cycles()[0].cycle, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_split_cycles_keeps_independent_skills() {
        let g = graph(&[("a", "b"), ("b", "a"), ("x", "y")], &["solo"]);
        let (rest, cycles, excluded) = g.split_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(excluded.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(rest.names().collect::<Vec<_>>(), vec!["solo", "x", "y"]);
        assert_eq!(rest.waves().unwrap(), vec![vec!["solo", "y"], vec!["x"]]);
    }

    #[test]
    fn test_components() {
        let g = graph(&[("a", "b"), ("c", "d")], &["e"]);
        let comps = g.components();
        assert_eq!(comps.len(), 3);
        assert!(comps[0].contains("a") && comps[0].contains("b"));
    }

    #[test]
    fn test_transitive_closure_both_directions() {
        let g = graph(&[("a", "b"), ("b", "c"), ("d", "c")], &[]);
        let deps: Vec<_> = g.transitive_dependencies("a").into_iter().collect();
        assert_eq!(deps, vec!["b", "c"]);
        let up: Vec<_> = g.transitive_dependents("c").into_iter().collect();
        assert_eq!(up, vec!["a", "b", "d"]);
        assert!(g.transitive_dependencies("missing").is_empty());
    }

    #[test]
    fn test_transitive_versions_pick_highest_match() {
        let records = vec![
            rec("app", "1.0.0", &[("http", "^1.0")]),
            rec("http", "1.2.0", &[("tls", ">=0.5")]),
            rec("http", "1.9.0", &[("tls", ">=0.5")]),
            rec("http", "2.0.0", &[]),
            rec("tls", "0.5.0", &[]),
            rec("tls", "0.7.1", &[]),
        ];
        let chosen = transitive_versions(&records, &records[0]);
        assert_eq!(chosen["http"], Version::new(1, 9, 0));
        assert_eq!(chosen["tls"], Version::new(0, 7, 1));
    }

    #[test]
    fn test_vulnerability_propagates_to_dependents() {
        let records = vec![
            rec("app", "1.0.0", &[("http", "^1.0")]),
            rec("app", "2.0.0", &[("http", "^2.0")]),
            rec("http", "1.2.0", &[]),
            rec("http", "2.0.0", &[]),
            rec("cli", "0.1.0", &[("app", "=1.0.0")]),
        ];
        let affected = affected_by(&records, &[("http".into(), Version::new(1, 2, 0))]);
        let ids: Vec<_> = affected.into_iter().collect();
        assert_eq!(ids, vec!["app@1.0.0", "cli@0.1.0", "http@1.2.0"]);
    }
}

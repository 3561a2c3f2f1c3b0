//! Capability inference.
//!
//! Folds a record's observed-access evidence with the lattice join, starting
//! from the empty set. Join is commutative, associative, and idempotent, so
//! the result is the unique minimal set covering every observation regardless
//! of evidence order.

use std::collections::BTreeMap;

use skillward_types::capability::{AccessLevel, CapabilitySet, Resource};
use skillward_types::error::MalformedRecord;
use skillward_types::skill::{Evidence, UnifiedSkillRecord};

/// The minimal capability set a skill needs, with where each access was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferredCapabilities {
    capabilities: CapabilitySet,
    locations: BTreeMap<Resource, Vec<(AccessLevel, String)>>,
}

impl InferredCapabilities {
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn into_capabilities(self) -> CapabilitySet {
        self.capabilities
    }

    /// Sorted, de-duplicated locations where `resource` was accessed above
    /// `level`.
    pub fn locations_above(&self, resource: Resource, level: AccessLevel) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .locations
            .get(&resource)
            .into_iter()
            .flatten()
            .filter(|(access, loc)| *access > level && !loc.is_empty())
            .map(|(_, loc)| loc.as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Fold evidence into the least capability set that covers all of it.
pub fn fold_evidence<'a>(evidence: impl IntoIterator<Item = &'a Evidence>) -> InferredCapabilities {
    let mut inferred = InferredCapabilities::default();
    for item in evidence {
        inferred.capabilities.add(item.capability());
        if item.access > AccessLevel::None {
            inferred
                .locations
                .entry(item.resource)
                .or_default()
                .push((item.access, item.location.clone()));
        }
    }
    inferred
}

/// Infer the capabilities a record requires.
///
/// Fails only when the record itself is unusable.
pub fn infer_capabilities(record: &UnifiedSkillRecord) -> Result<InferredCapabilities, MalformedRecord> {
    record.validate()?;
    let inferred = fold_evidence(&record.evidence);
    tracing::debug!(
        skill = %record.id(),
        evidence = record.evidence.len(),
        inferred = %inferred.capabilities,
        "capabilities inferred"
    );
    Ok(inferred)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(evidence: Vec<Evidence>) -> UnifiedSkillRecord {
        let mut record = UnifiedSkillRecord::new("probe", "1.0.0", "record");
        record.evidence = evidence;
        record
    }

    #[test]
    fn test_no_evidence_infers_empty_set() {
        let inferred = infer_capabilities(&record_with(vec![])).unwrap();
        assert!(inferred.capabilities().is_empty());
    }

    #[test]
    fn test_highest_access_per_resource_wins() {
        let inferred = infer_capabilities(&record_with(vec![
            Evidence::new(Resource::Filesystem, AccessLevel::Read, "a.py:1"),
            Evidence::new(Resource::Filesystem, AccessLevel::Write, "a.py:9"),
            Evidence::new(Resource::Network, AccessLevel::Read, "a.py:4"),
        ]))
        .unwrap();
        let caps = inferred.capabilities();
        assert_eq!(caps.get(Resource::Filesystem), AccessLevel::Write);
        assert_eq!(caps.get(Resource::Network), AccessLevel::Read);
        assert_eq!(caps.get(Resource::Process), AccessLevel::None);
    }

    #[test]
    fn test_locations_above_declared_level() {
        let inferred = fold_evidence(&[
            Evidence::new(Resource::Network, AccessLevel::Read, "b.py:2"),
            Evidence::new(Resource::Network, AccessLevel::Write, "b.py:7"),
            Evidence::new(Resource::Network, AccessLevel::Write, "b.py:7"),
        ]);
        assert_eq!(inferred.locations_above(Resource::Network, AccessLevel::Read), vec!["b.py:7"]);
        assert_eq!(
            inferred.locations_above(Resource::Network, AccessLevel::None),
            vec!["b.py:2", "b.py:7"]
        );
    }

    #[test]
    fn test_malformed_record_fails_inference() {
        let record = UnifiedSkillRecord::new("", "1.0.0", "record");
        assert!(infer_capabilities(&record).is_err());
    }
}

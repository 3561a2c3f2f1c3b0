//! Capability lattice domain types.
//!
//! A [`CapabilitySet`] maps each [`Resource`] to an [`AccessLevel`]. Access
//! levels form a chain (`NONE < READ < WRITE < EXECUTE`), so the per-resource
//! product order over capability sets is a lattice: `join` is the pointwise
//! max, `meet` the pointwise min, and `leq` the pointwise comparison. All
//! three are total functions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// Closed set of resource classes a skill can touch.
///
/// Variants are declared in alphabetical order so the derived `Ord` matches
/// the serialization order required for deterministic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Database,
    Environment,
    Filesystem,
    Network,
    Process,
}

impl Resource {
    /// Every resource, in alphabetical order.
    pub const ALL: [Resource; 5] = [
        Resource::Database,
        Resource::Environment,
        Resource::Filesystem,
        Resource::Network,
        Resource::Process,
    ];

    /// Resources whose escalation is treated as more severe.
    pub fn is_security_sensitive(self) -> bool {
        matches!(self, Resource::Process | Resource::Network)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Database => "database",
            Resource::Environment => "environment",
            Resource::Filesystem => "filesystem",
            Resource::Network => "network",
            Resource::Process => "process",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(Resource::Database),
            "environment" | "env" => Ok(Resource::Environment),
            "filesystem" | "fs" | "file" => Ok(Resource::Filesystem),
            "network" | "net" => Ok(Resource::Network),
            "process" | "shell" | "exec" => Ok(Resource::Process),
            _ => Err(CapabilityParseError::UnknownResource(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessLevel
// ---------------------------------------------------------------------------

/// Totally ordered access level. Each level implies every level below it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    Write,
    Execute,
}

impl AccessLevel {
    pub const BOTTOM: AccessLevel = AccessLevel::None;
    pub const TOP: AccessLevel = AccessLevel::Execute;

    /// Position in the chain (`NONE` = 0 .. `EXECUTE` = 3).
    pub fn rank(self) -> u8 {
        match self {
            AccessLevel::None => 0,
            AccessLevel::Read => 1,
            AccessLevel::Write => 2,
            AccessLevel::Execute => 3,
        }
    }

    pub fn join(self, other: AccessLevel) -> AccessLevel {
        self.max(other)
    }

    pub fn meet(self, other: AccessLevel) -> AccessLevel {
        self.min(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::None => "NONE",
            AccessLevel::Read => "READ",
            AccessLevel::Write => "WRITE",
            AccessLevel::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AccessLevel::None),
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            "execute" | "exec" | "admin" => Ok(AccessLevel::Execute),
            _ => Err(CapabilityParseError::UnknownLevel(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Error parsing a `resource:level` capability string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityParseError {
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("unknown access level '{0}'")]
    UnknownLevel(String),

    #[error("capability '{0}' must have the form 'resource:level'")]
    Syntax(String),
}

/// A single `(resource, access level)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    pub resource: Resource,
    pub access: AccessLevel,
}

impl Capability {
    pub fn new(resource: Resource, access: AccessLevel) -> Self {
        Self { resource, access }
    }

    /// `self` covers `other` when both name the same resource and `self`
    /// grants at least as much access.
    pub fn subsumes(&self, other: &Capability) -> bool {
        self.resource == other.resource && self.access >= other.access
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.access)
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, level) = s
            .split_once(':')
            .ok_or_else(|| CapabilityParseError::Syntax(s.to_string()))?;
        Ok(Capability {
            resource: resource.parse()?,
            access: level.parse()?,
        })
    }
}

// ---------------------------------------------------------------------------
// CapabilitySet
// ---------------------------------------------------------------------------

/// Mapping from resource to access level. Absent resources are `NONE`.
///
/// Only non-`NONE` entries are stored, so two sets granting the same access
/// are always structurally equal. Serializes as a list of capabilities in
/// resource order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct CapabilitySet {
    levels: BTreeMap<Resource, AccessLevel>,
}

impl CapabilitySet {
    /// The bottom element: every resource at `NONE`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The top element: every resource at `EXECUTE`.
    pub fn top() -> Self {
        Resource::ALL
            .iter()
            .map(|r| Capability::new(*r, AccessLevel::TOP))
            .collect()
    }

    pub fn get(&self, resource: Resource) -> AccessLevel {
        self.levels.get(&resource).copied().unwrap_or_default()
    }

    /// Join a single capability into the set in place.
    pub fn add(&mut self, capability: Capability) {
        let joined = self.get(capability.resource).join(capability.access);
        self.set(capability.resource, joined);
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, resource: Resource, access: AccessLevel) -> Self {
        self.add(Capability::new(resource, access));
        self
    }

    fn set(&mut self, resource: Resource, access: AccessLevel) {
        if access == AccessLevel::None {
            self.levels.remove(&resource);
        } else {
            self.levels.insert(resource, access);
        }
    }

    /// Least upper bound: per-resource max.
    pub fn join(&self, other: &CapabilitySet) -> CapabilitySet {
        self.combine(other, AccessLevel::join)
    }

    /// Greatest lower bound: per-resource min.
    pub fn meet(&self, other: &CapabilitySet) -> CapabilitySet {
        self.combine(other, AccessLevel::meet)
    }

    /// Lattice order: true iff every resource of `self` is at most `other`'s.
    pub fn leq(&self, other: &CapabilitySet) -> bool {
        self.levels
            .iter()
            .all(|(resource, level)| *level <= other.get(*resource))
    }

    fn combine(
        &self,
        other: &CapabilitySet,
        op: impl Fn(AccessLevel, AccessLevel) -> AccessLevel,
    ) -> CapabilitySet {
        let mut out = CapabilitySet::empty();
        for resource in Resource::ALL {
            out.set(resource, op(self.get(resource), other.get(resource)));
        }
        out
    }

    /// Whether the set covers `required`.
    pub fn permits(&self, required: &Capability) -> bool {
        self.get(required.resource) >= required.access
    }

    /// Non-`NONE` capabilities in resource order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.levels
            .iter()
            .map(|(resource, access)| Capability::new(*resource, *access))
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Sorted `resource:LEVEL` strings, as written to lockfiles and reports.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|c| c.to_string()).collect()
    }

    /// Parse a list of `resource:level` strings, joining duplicates.
    pub fn parse_list<S: AsRef<str>>(items: &[S]) -> Result<Self, CapabilityParseError> {
        items
            .iter()
            .map(|s| s.as_ref().parse::<Capability>())
            .collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for cap in iter {
            set.add(cap);
        }
        set
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(caps: Vec<Capability>) -> Self {
        caps.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(set: CapabilitySet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        write!(f, "{{{}}}", self.to_strings().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_levels_are_totally_ordered() {
        assert!(AccessLevel::None < AccessLevel::Read);
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert!(AccessLevel::Write < AccessLevel::Execute);
        assert_eq!(AccessLevel::Read.join(AccessLevel::Write), AccessLevel::Write);
        assert_eq!(AccessLevel::Read.meet(AccessLevel::Write), AccessLevel::Read);
    }

    #[test]
    fn test_capability_parses_case_insensitively_with_aliases() {
        let cap: Capability = "Network:read".parse().unwrap();
        assert_eq!(cap, Capability::new(Resource::Network, AccessLevel::Read));

        let shell: Capability = "shell:admin".parse().unwrap();
        assert_eq!(shell, Capability::new(Resource::Process, AccessLevel::Execute));

        assert!("network".parse::<Capability>().is_err());
        assert!("clipboard:read".parse::<Capability>().is_err());
        assert!("network:sudo".parse::<Capability>().is_err());
    }

    #[test]
    fn test_add_keeps_highest_level() {
        let mut set = CapabilitySet::empty();
        set.add(Capability::new(Resource::Filesystem, AccessLevel::Write));
        set.add(Capability::new(Resource::Filesystem, AccessLevel::Read));
        assert_eq!(set.get(Resource::Filesystem), AccessLevel::Write);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_none_entries_are_not_stored() {
        let a = CapabilitySet::empty().with(Resource::Network, AccessLevel::None);
        assert_eq!(a, CapabilitySet::empty());
        assert!(a.is_empty());
    }

    #[test]
    fn test_join_meet_leq_pointwise() {
        let a = CapabilitySet::empty()
            .with(Resource::Filesystem, AccessLevel::Write)
            .with(Resource::Network, AccessLevel::Read);
        let b = CapabilitySet::empty()
            .with(Resource::Filesystem, AccessLevel::Read)
            .with(Resource::Process, AccessLevel::Execute);

        let j = a.join(&b);
        assert_eq!(j.get(Resource::Filesystem), AccessLevel::Write);
        assert_eq!(j.get(Resource::Network), AccessLevel::Read);
        assert_eq!(j.get(Resource::Process), AccessLevel::Execute);

        let m = a.meet(&b);
        assert_eq!(m.get(Resource::Filesystem), AccessLevel::Read);
        assert_eq!(m.get(Resource::Network), AccessLevel::None);
        assert_eq!(m.get(Resource::Process), AccessLevel::None);

        assert!(m.leq(&a) && m.leq(&b));
        assert!(a.leq(&j) && b.leq(&j));
        assert!(!a.leq(&b));
        assert!(CapabilitySet::empty().leq(&a));
        assert!(a.leq(&CapabilitySet::top()));
    }

    #[test]
    fn test_serializes_as_sorted_list() {
        let set = CapabilitySet::empty()
            .with(Resource::Process, AccessLevel::Execute)
            .with(Resource::Filesystem, AccessLevel::Read);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(
            json,
            r#"[{"resource":"filesystem","access":"READ"},{"resource":"process","access":"EXECUTE"}]"#
        );
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_display_uses_resource_level_form() {
        let set = CapabilitySet::empty().with(Resource::Network, AccessLevel::Write);
        assert_eq!(set.to_string(), "{network:WRITE}");
        assert_eq!(CapabilitySet::empty().to_string(), "{}");
    }
}

//! Version requirements on skills.
//!
//! Wraps [`semver::VersionReq`] and adds the `==`, `!=` and `*` atoms that
//! skill authors use across ecosystems. Comma-separated atoms are a
//! conjunction: `">=1.0.0, !=1.2.0, <2.0.0"`.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Error returned when a version requirement does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version requirement '{raw}': {reason}")]
pub struct ConstraintError {
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    Any,
    Exact(Version),
    NotEqual(Version),
    Req(VersionReq),
}

impl Atom {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Atom::Any => true,
            Atom::Exact(v) => v == version,
            Atom::NotEqual(v) => v != version,
            Atom::Req(req) => req.matches(version),
        }
    }
}

/// A parsed version requirement. Keeps the authored text for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionConstraint {
    raw: String,
    atoms: Vec<Atom>,
}

impl VersionConstraint {
    /// The constraint that every version satisfies.
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            atoms: vec![Atom::Any],
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConstraintError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        let err = |reason: String| ConstraintError {
            raw: raw.to_string(),
            reason,
        };

        let mut atoms = Vec::new();
        for part in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let atom = if let Some(rest) = part.strip_prefix("==") {
                Atom::Exact(Version::parse(rest.trim()).map_err(|e| err(e.to_string()))?)
            } else if let Some(rest) = part.strip_prefix("!=") {
                Atom::NotEqual(Version::parse(rest.trim()).map_err(|e| err(e.to_string()))?)
            } else if part == "*" {
                Atom::Any
            } else {
                Atom::Req(VersionReq::parse(part).map_err(|e| err(e.to_string()))?)
            };
            atoms.push(atom);
        }

        if atoms.is_empty() {
            return Err(err("no comparators".to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            atoms,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.atoms.iter().all(|atom| atom.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = ConstraintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionConstraint> for String {
    fn from(value: VersionConstraint) -> Self {
        value.raw
    }
}

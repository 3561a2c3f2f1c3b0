//! `SKILL.md` parsing.
//!
//! YAML frontmatter delimited by `---` followed by a markdown body. Declared
//! capabilities, dependencies, and conflicts come from the frontmatter's
//! `metadata` block; evidence and raw content come from the whole file.
//!
//! ```text
//! ---
//! name: weather
//! description: Current conditions for a city
//! metadata:
//!   version: 1.2.0
//!   capabilities:
//!     - network:read
//!   dependencies:
//!     - http-client@^2.0
//!   conflicts-with:
//!     - legacy-weather
//! ---
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use skillward_types::capability::CapabilitySet;
use skillward_types::error::MalformedRecord;
use skillward_types::skill::{TrustInputs, UnifiedSkillRecord};
use skillward_types::version::VersionConstraint;

use super::{file_name, integrity, read_source, EvidenceExtractor, SkillParser};

/// Version assumed when the frontmatter does not state one.
const DEFAULT_VERSION: &str = "0.0.0";

#[derive(Debug, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    capabilities: Option<Vec<String>>,
    #[serde(default)]
    dependencies: Option<Vec<String>>,
    #[serde(default, rename = "conflicts-with")]
    conflicts_with: Option<Vec<String>>,
    #[serde(default)]
    provenance: Option<f64>,
    #[serde(default)]
    community: Option<f64>,
    #[serde(default)]
    historical: Option<f64>,
    #[serde(default, rename = "last-updated")]
    last_updated: Option<DateTime<Utc>>,
}

/// Extract YAML frontmatter and markdown body from a SKILL.md file.
///
/// Content must start with `---`, and a closing `\n---` separates the YAML
/// from the body. Returns `(yaml_str, body_str)`.
pub fn extract_frontmatter(content: &str) -> anyhow::Result<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if !content.starts_with("---") {
        bail!("SKILL.md must start with YAML frontmatter delimiter '---'");
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))
        .unwrap_or(after_open);

    let closing_pos = after_open
        .find("\n---")
        .context("SKILL.md missing closing frontmatter delimiter '---'")?;

    let yaml_str = &after_open[..closing_pos];
    let remainder = &after_open[closing_pos + 4..];
    let body_str = remainder
        .strip_prefix('\n')
        .unwrap_or(remainder)
        .trim_start_matches('\n');

    Ok((yaml_str, body_str))
}

/// Split `name@requirement`. A bare name means any version.
///
/// Scoped names keep their leading `@` (`@org/tool@^1`).
pub fn parse_dependency(spec: &str) -> anyhow::Result<(String, VersionConstraint)> {
    let spec = spec.trim();
    let (name, requirement) = match spec.rsplit_once('@') {
        Some((name, req)) if !name.is_empty() => (name, req),
        _ => (spec, "*"),
    };
    if name.is_empty() {
        bail!("dependency '{spec}' has no name");
    }
    let requirement = VersionConstraint::parse(requirement)
        .with_context(|| format!("invalid requirement in dependency '{spec}'"))?;
    Ok((name.to_string(), requirement))
}

fn dependency_map(specs: Option<&Vec<String>>) -> anyhow::Result<BTreeMap<String, VersionConstraint>> {
    specs
        .into_iter()
        .flatten()
        .map(|spec| parse_dependency(spec))
        .collect()
}

/// Skill name when the frontmatter has none: the enclosing directory for
/// `SKILL.md`, otherwise the file stem.
fn fallback_name(path: &Path) -> String {
    let from_dir = if file_name(path) == "SKILL.md" {
        path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str())
    } else {
        None
    };
    from_dir
        .or_else(|| path.file_stem().and_then(|s| s.to_str()))
        .unwrap_or("unnamed")
        .to_string()
}

pub struct SkillMdParser {
    extractor: Arc<EvidenceExtractor>,
}

impl SkillMdParser {
    pub fn new(extractor: Arc<EvidenceExtractor>) -> Self {
        Self { extractor }
    }

    fn parse_content(&self, content: &str, path: &Path) -> anyhow::Result<UnifiedSkillRecord> {
        let (yaml_str, _body) = extract_frontmatter(content)?;
        let frontmatter: Frontmatter =
            serde_yaml_ng::from_str(yaml_str).context("Failed to parse SKILL.md YAML frontmatter")?;
        let metadata = frontmatter.metadata.unwrap_or_default();

        let name = frontmatter
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback_name(path));
        let version = metadata
            .version
            .clone()
            .or(frontmatter.version)
            .unwrap_or_else(|| {
                tracing::debug!(skill = %name, "no version in frontmatter, assuming {DEFAULT_VERSION}");
                DEFAULT_VERSION.to_string()
            });

        let mut record = UnifiedSkillRecord::new(name, version, self.format());
        record.source_path = path.to_path_buf();
        record.description = frontmatter.description;
        if let Some(caps) = &metadata.capabilities {
            record.declared = CapabilitySet::parse_list(caps).context("invalid declared capability")?;
        }
        record.dependencies = dependency_map(metadata.dependencies.as_ref())?;
        record.conflicts = dependency_map(metadata.conflicts_with.as_ref())?;
        record.trust_inputs = TrustInputs {
            provenance: metadata.provenance,
            community: metadata.community,
            historical: metadata.historical,
            last_updated: metadata.last_updated,
        };

        let source = path.display().to_string();
        record.content = self.extractor.extract_content(content);
        record.evidence = self.extractor.evidence(&record.content, content, &source);
        record.integrity = Some(integrity(content.as_bytes()));
        Ok(record)
    }
}

impl SkillParser for SkillMdParser {
    fn format(&self) -> &'static str {
        "skill_md"
    }

    /// `SKILL.md` anywhere, or any markdown file under `.claude/skills/`.
    fn can_parse(&self, path: &Path) -> bool {
        if file_name(path) == "SKILL.md" {
            return true;
        }
        let is_markdown = path.extension().is_some_and(|e| e == "md");
        let parent = path.parent();
        is_markdown
            && parent.and_then(|p| p.file_name()).is_some_and(|n| n == "skills")
            && parent
                .and_then(Path::parent)
                .and_then(|p| p.file_name())
                .is_some_and(|n| n == ".claude")
    }

    fn parse(&self, path: &Path) -> Result<Vec<UnifiedSkillRecord>, MalformedRecord> {
        let content = read_source(path)?;
        self.parse_content(&content, path)
            .map(|record| vec![record])
            .map_err(|e| MalformedRecord::new(path.display().to_string(), format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillward_types::capability::{AccessLevel, Resource};
    use tempfile::TempDir;

    fn parser() -> SkillMdParser {
        SkillMdParser::new(Arc::new(EvidenceExtractor::new().unwrap()))
    }

    fn parse(dir: &TempDir, rel: &str, content: &str) -> Result<Vec<UnifiedSkillRecord>, MalformedRecord> {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        parser().parse(&path)
    }

    const WEATHER: &str = r#"---
name: weather
description: Current conditions for a city
metadata:
  version: 1.2.0
  capabilities:
    - network:read
  dependencies:
    - http-client@^2.0
    - geo
  conflicts-with:
    - legacy-weather@<1.0
  provenance: 0.8
---
# Weather

Call the API:

```bash
curl -X POST https://api.weather.example.com/v1/query
```
"#;

    #[test]
    fn test_extract_frontmatter_basic() {
        let (yaml, body) = extract_frontmatter("---\nname: x\n---\n\nBody").unwrap();
        assert_eq!(yaml, "name: x");
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_extract_frontmatter_missing_delimiters() {
        assert!(extract_frontmatter("name: x\n").is_err());
        assert!(extract_frontmatter("---\nname: x\n").is_err());
    }

    #[test]
    fn test_parse_dependency_forms() {
        let (name, req) = parse_dependency("http-client@^2.0").unwrap();
        assert_eq!((name.as_str(), req.as_str()), ("http-client", "^2.0"));

        let (name, req) = parse_dependency("geo").unwrap();
        assert_eq!((name.as_str(), req.as_str()), ("geo", "*"));

        let (name, req) = parse_dependency("@org/tool@>=1.0").unwrap();
        assert_eq!((name.as_str(), req.as_str()), ("@org/tool", ">=1.0"));

        assert!(parse_dependency("x@not a range").is_err());
    }

    #[test]
    fn test_parse_full_skill() {
        let tmp = TempDir::new().unwrap();
        let records = parse(&tmp, "weather/SKILL.md", WEATHER).unwrap();
        let r = &records[0];

        assert_eq!(r.name, "weather");
        assert_eq!(r.version, "1.2.0");
        assert_eq!(r.format, "skill_md");
        assert_eq!(r.declared.get(Resource::Network), AccessLevel::Read);
        assert_eq!(r.dependencies["http-client"].as_str(), "^2.0");
        assert_eq!(r.dependencies["geo"].as_str(), "*");
        assert_eq!(r.conflicts["legacy-weather"].as_str(), "<1.0");
        assert_eq!(r.trust_inputs.provenance, Some(0.8));
        assert_eq!(r.content.urls, vec!["https://api.weather.example.com/v1/query"]);

        let network = r
            .evidence
            .iter()
            .find(|e| e.resource == Resource::Network)
            .unwrap();
        assert_eq!(network.access, AccessLevel::Write);
        assert!(network.location.ends_with("SKILL.md:20"));
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let tmp = TempDir::new().unwrap();
        let records = parse(&tmp, "notes/SKILL.md", "---\ndescription: Notes\n---\nTake notes.\n").unwrap();
        assert_eq!(records[0].name, "notes");
        assert_eq!(records[0].version, DEFAULT_VERSION);
    }

    #[test]
    fn test_bad_capability_is_malformed() {
        let tmp = TempDir::new().unwrap();
        let err = parse(
            &tmp,
            "bad/SKILL.md",
            "---\nname: bad\nmetadata:\n  capabilities:\n    - teleport:read\n---\n",
        )
        .unwrap_err();
        assert!(err.reason.contains("invalid declared capability"));
    }

    #[test]
    fn test_can_parse() {
        let p = parser();
        assert!(p.can_parse(Path::new("skills/weather/SKILL.md")));
        assert!(p.can_parse(Path::new("proj/.claude/skills/review.md")));
        assert!(!p.can_parse(Path::new("proj/docs/review.md")));
        assert!(!p.can_parse(Path::new("README.md")));
    }
}

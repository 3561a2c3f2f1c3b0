//! Skill format parsers.
//!
//! Each supported authoring format implements [`SkillParser`] and produces
//! [`UnifiedSkillRecord`]s. Nothing past this module branches on format.

pub mod evidence;
pub mod mcp_config;
pub mod record_json;
pub mod skill_md;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};
use skillward_types::error::MalformedRecord;
use skillward_types::skill::UnifiedSkillRecord;

pub use evidence::EvidenceExtractor;
pub use mcp_config::McpConfigParser;
pub use record_json::RecordJsonParser;
pub use skill_md::SkillMdParser;

/// Directories never descended into during discovery.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv"];

/// One source format.
pub trait SkillParser: Send + Sync {
    /// Format identifier stored on every record this parser produces.
    fn format(&self) -> &'static str;

    /// Whether `path` (a file) is in this parser's format.
    fn can_parse(&self, path: &Path) -> bool;

    /// Parse one file into zero or more records.
    fn parse(&self, path: &Path) -> Result<Vec<UnifiedSkillRecord>, MalformedRecord>;
}

/// `sha256:<hex>` digest of raw source bytes.
pub fn integrity(content: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(content))
}

pub(crate) fn read_source(path: &Path) -> Result<String, MalformedRecord> {
    std::fs::read_to_string(path)
        .map_err(|e| MalformedRecord::new(path.display().to_string(), format!("unreadable: {e}")))
}

pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Everything found under one discovery root.
#[derive(Debug, Default)]
pub struct Discovery {
    pub records: Vec<UnifiedSkillRecord>,
    pub malformed: Vec<MalformedRecord>,
    pub files: Vec<PathBuf>,
}

/// The set of parsers consulted during discovery, in priority order.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn SkillParser>>,
}

impl ParserRegistry {
    /// Registry with every built-in format.
    pub fn new() -> Result<Self, regex::Error> {
        let extractor = Arc::new(EvidenceExtractor::new()?);
        Ok(Self::with_parsers(vec![
            Box::new(RecordJsonParser),
            Box::new(SkillMdParser::new(Arc::clone(&extractor))),
            Box::new(McpConfigParser::new(extractor)),
        ]))
    }

    pub fn with_parsers(parsers: Vec<Box<dyn SkillParser>>) -> Self {
        Self { parsers }
    }

    pub fn formats(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.format()).collect()
    }

    /// Parse `path` with the first parser that accepts it.
    pub fn parse_file(&self, path: &Path) -> Option<Result<Vec<UnifiedSkillRecord>, MalformedRecord>> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(path))
            .map(|p| p.parse(path))
    }

    /// Parse `root`, a single file or a directory walked recursively.
    ///
    /// Per-file failures land in [`Discovery::malformed`]; only an unreadable
    /// root is an error.
    pub fn discover(&self, root: &Path) -> anyhow::Result<Discovery> {
        let mut discovery = Discovery::default();
        let mut files = Vec::new();
        if root.is_file() {
            files.push(root.to_path_buf());
        } else {
            collect_files(root, &mut files)?;
        }

        for path in files {
            let Some(result) = self.parse_file(&path) else {
                continue;
            };
            match result {
                Ok(records) => {
                    tracing::debug!(path = %path.display(), records = records.len(), "parsed skill source");
                    discovery.records.extend(records);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed skill source");
                    discovery.malformed.push(e);
                }
            }
            discovery.files.push(path);
        }

        tracing::info!(
            root = %root.display(),
            files = discovery.files.len(),
            records = discovery.records.len(),
            malformed = discovery.malformed.len(),
            "discovery complete"
        );
        Ok(discovery)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry?.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            if SKIPPED_DIRS.contains(&file_name(&path)) {
                continue;
            }
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SKILL_MD: &str = "---\nname: weather\ndescription: Weather lookups\nmetadata:\n  version: 1.2.0\n---\nCall https://api.weather.example.com/today\n";

    #[test]
    fn test_integrity_known_value() {
        assert_eq!(
            integrity(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_discover_walks_directories_in_order() {
        let tmp = TempDir::new().unwrap();
        let weather = tmp.path().join("skills/weather");
        std::fs::create_dir_all(&weather).unwrap();
        std::fs::write(weather.join("SKILL.md"), SKILL_MD).unwrap();
        std::fs::write(
            tmp.path().join("mcp.json"),
            r#"{"mcpServers": {"files": {"command": "npx", "args": ["-y", "server-files"]}}}"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("README.md"), "# not a skill").unwrap();

        let skipped = tmp.path().join("node_modules/pkg");
        std::fs::create_dir_all(&skipped).unwrap();
        std::fs::write(skipped.join("SKILL.md"), SKILL_MD).unwrap();

        let registry = ParserRegistry::new().unwrap();
        let discovery = registry.discover(tmp.path()).unwrap();

        let names: Vec<&str> = discovery.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["files", "weather"]);
        assert_eq!(discovery.files.len(), 2);
        assert!(discovery.malformed.is_empty());
    }

    #[test]
    fn test_malformed_file_does_not_abort_discovery() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.skill.json"), "{ not json").unwrap();
        std::fs::write(
            tmp.path().join("ok.skill.json"),
            r#"{"name": "ok", "version": "1.0.0"}"#,
        )
        .unwrap();

        let discovery = ParserRegistry::new().unwrap().discover(tmp.path()).unwrap();
        assert_eq!(discovery.records.len(), 1);
        assert_eq!(discovery.malformed.len(), 1);
        assert!(discovery.malformed[0].origin.ends_with("broken.skill.json"));
    }

    #[test]
    fn test_single_file_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("SKILL.md");
        std::fs::write(&path, SKILL_MD).unwrap();
        let discovery = ParserRegistry::new().unwrap().discover(&path).unwrap();
        assert_eq!(discovery.records.len(), 1);
        assert_eq!(discovery.records[0].version, "1.2.0");
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(ParserRegistry::new().unwrap().discover(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_formats() {
        let registry = ParserRegistry::new().unwrap();
        assert_eq!(registry.formats(), vec!["record", "skill_md", "mcp"]);
    }
}

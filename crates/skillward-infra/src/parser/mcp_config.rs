//! MCP server configurations (`mcp.json`, `.mcp.json`, ...).
//!
//! Every entry under `mcpServers` (or `servers` / `mcp`) becomes one record:
//! a `command` is process execution, `env` entries are environment reads,
//! and a `url` is a network read.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use skillward_types::capability::{AccessLevel, CapabilitySet, Resource};
use skillward_types::error::MalformedRecord;
use skillward_types::skill::{Evidence, SkillContent, UnifiedSkillRecord};

use super::{file_name, integrity, read_source, EvidenceExtractor, SkillParser};

const CONFIG_FILE_NAMES: &[&str] = &[
    "mcp.json",
    ".mcp.json",
    "mcp_servers.json",
    "mcp_settings.json",
    "mcp_config.json",
    "claude_desktop_config.json",
];

/// Top-level keys holding server maps, across MCP clients.
const SERVER_KEYS: &[&str] = &["mcpServers", "servers", "mcp"];

const DEFAULT_VERSION: &str = "0.0.0";

#[derive(Debug, Deserialize)]
struct ServerEntry {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: String,
    /// Declared capabilities, `resource:level`.
    #[serde(default)]
    capabilities: Vec<String>,
}

pub struct McpConfigParser {
    extractor: Arc<EvidenceExtractor>,
}

impl McpConfigParser {
    pub fn new(extractor: Arc<EvidenceExtractor>) -> Self {
        Self { extractor }
    }

    fn server(
        &self,
        name: &str,
        value: Value,
        path: &Path,
        digest: &str,
    ) -> Result<UnifiedSkillRecord, MalformedRecord> {
        let origin = format!("{}#{name}", path.display());
        let entry: ServerEntry =
            serde_json::from_value(value).map_err(|e| MalformedRecord::new(origin.clone(), e.to_string()))?;

        let mut record = UnifiedSkillRecord::new(
            name,
            entry.version.as_deref().unwrap_or(DEFAULT_VERSION),
            self.format(),
        );
        record.source_path = path.to_path_buf();
        record.description = entry.description;
        record.integrity = Some(digest.to_string());
        record.declared = CapabilitySet::parse_list(&entry.capabilities)
            .map_err(|e| MalformedRecord::new(origin.clone(), format!("invalid declared capability: {e}")))?;

        let mut content = SkillContent::default();
        let mut evidence = Vec::new();

        if let Some(command) = &entry.command {
            let line = std::iter::once(command.as_str())
                .chain(entry.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            evidence.push(Evidence::new(
                Resource::Process,
                AccessLevel::Execute,
                format!("{origin}.command"),
            ));
            // URLs passed as arguments are reached by the server process.
            let from_args = self.extractor.extract_content(&line);
            content.urls.extend(from_args.urls);
            content.shell_commands.push(line);
        }

        for key in entry.env.keys() {
            evidence.push(Evidence::new(
                Resource::Environment,
                AccessLevel::Read,
                format!("{origin}.env.{key}"),
            ));
            content.env_vars.push(key.clone());
        }

        if let Some(url) = &entry.url {
            content.urls.insert(0, url.clone());
        }
        for url in &content.urls {
            evidence.push(Evidence::new(Resource::Network, AccessLevel::Read, format!("{origin}.url")));
            tracing::trace!(server = %name, url = %url, "network endpoint");
        }

        record.content = content;
        record.evidence = evidence;
        Ok(record)
    }
}

impl SkillParser for McpConfigParser {
    fn format(&self) -> &'static str {
        "mcp"
    }

    fn can_parse(&self, path: &Path) -> bool {
        CONFIG_FILE_NAMES.contains(&file_name(path))
    }

    fn parse(&self, path: &Path) -> Result<Vec<UnifiedSkillRecord>, MalformedRecord> {
        let source = read_source(path)?;
        let digest = integrity(source.as_bytes());
        let mut top: BTreeMap<String, Value> = serde_json::from_str(&source)
            .map_err(|e| MalformedRecord::new(path.display().to_string(), format!("invalid JSON: {e}")))?;

        let mut servers: BTreeMap<String, Value> = BTreeMap::new();
        for key in SERVER_KEYS {
            if let Some(Value::Object(map)) = top.remove(*key) {
                for (name, entry) in map {
                    servers.entry(name).or_insert(entry);
                }
            }
        }
        if servers.is_empty() {
            tracing::debug!(path = %path.display(), "MCP config has no servers");
        }

        servers
            .into_iter()
            .map(|(name, entry)| self.server(&name, entry, path, &digest))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(content: &str) -> Result<Vec<UnifiedSkillRecord>, MalformedRecord> {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mcp.json");
        std::fs::write(&path, content).unwrap();
        McpConfigParser::new(Arc::new(EvidenceExtractor::new().unwrap())).parse(&path)
    }

    fn level(record: &UnifiedSkillRecord, resource: Resource) -> AccessLevel {
        record
            .evidence
            .iter()
            .filter(|e| e.resource == resource)
            .map(|e| e.access)
            .max()
            .unwrap_or_default()
    }

    #[test]
    fn test_command_env_and_url_become_evidence() {
        let records = parse(
            r#"{
                "mcpServers": {
                    "github": {
                        "command": "npx",
                        "args": ["-y", "@modelcontextprotocol/server-github"],
                        "env": {"GITHUB_TOKEN": "${GITHUB_TOKEN}"},
                        "capabilities": ["process:execute", "environment:read"]
                    },
                    "search": {"url": "https://search.example.com/mcp", "version": "1.4.0"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        let github = &records[0];
        assert_eq!(github.name, "github");
        assert_eq!(github.version, DEFAULT_VERSION);
        assert_eq!(level(github, Resource::Process), AccessLevel::Execute);
        assert_eq!(level(github, Resource::Environment), AccessLevel::Read);
        assert_eq!(github.declared.get(Resource::Process), AccessLevel::Execute);
        assert_eq!(
            github.content.shell_commands,
            vec!["npx -y @modelcontextprotocol/server-github"]
        );
        assert_eq!(github.content.env_vars, vec!["GITHUB_TOKEN"]);

        let search = &records[1];
        assert_eq!(search.version, "1.4.0");
        assert_eq!(level(search, Resource::Network), AccessLevel::Read);
        assert_eq!(level(search, Resource::Process), AccessLevel::None);
        assert!(search.evidence[0].location.ends_with("#search.url"));
    }

    #[test]
    fn test_alternate_server_key() {
        let records = parse(r#"{"servers": {"files": {"command": "mcp-files"}}}"#).unwrap();
        assert_eq!(records[0].name, "files");
        assert_eq!(records[0].format, "mcp");
    }

    #[test]
    fn test_no_servers_yields_nothing() {
        assert!(parse(r#"{"theme": "dark"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_bad_entry_is_malformed() {
        let err = parse(r#"{"mcpServers": {"broken": {"args": "not-a-list"}}}"#).unwrap_err();
        assert!(err.origin.ends_with(".mcp.json#broken"));
    }

    #[test]
    fn test_can_parse_known_names() {
        let parser = McpConfigParser::new(Arc::new(EvidenceExtractor::new().unwrap()));
        assert!(parser.can_parse(Path::new("proj/mcp.json")));
        assert!(parser.can_parse(Path::new("proj/claude_desktop_config.json")));
        assert!(!parser.can_parse(Path::new("proj/package.json")));
    }
}

//! Evidence extraction from raw skill text.
//!
//! Pulls [`SkillContent`] (URLs, shell commands, code blocks, environment
//! variables) out of markdown or script text, then turns it into observed
//! resource accesses:
//!
//! | observed | evidence |
//! |----------|----------|
//! | URL | `network:READ`, `network:WRITE` with a POST-like command |
//! | shell command | `process:EXECUTE` |
//! | environment variable | `environment:READ` |
//! | file read / write phrase | `filesystem:READ` / `filesystem:WRITE` |
//! | SQL or database phrase | `database:READ` / `database:WRITE` |

use regex::{Regex, RegexBuilder};
use skillward_types::capability::{AccessLevel, Resource};
use skillward_types::skill::{Evidence, SkillContent};

/// Code block language tags treated as shell. Untagged blocks count too.
const SHELL_TAGS: &[&str] = &["bash", "sh", "shell", "zsh", "console", ""];

/// Compiled extraction patterns. Built once and shared by every parser.
#[derive(Debug, Clone)]
pub struct EvidenceExtractor {
    url: Regex,
    env_var: Regex,
    code_block: Regex,
    post: Vec<Regex>,
    file_read: Vec<Regex>,
    file_write: Vec<Regex>,
    db_read: Vec<Regex>,
    db_write: Vec<Regex>,
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect()
}

/// 1-based line number of byte offset `at` in `text`.
fn line_of(text: &str, at: usize) -> usize {
    text[..at].matches('\n').count() + 1
}

impl EvidenceExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            url: Regex::new(r#"https?://[^\s"'`)\]>]+"#)?,
            env_var: Regex::new(concat!(
                r#"\$\{?([A-Z][A-Z0-9_]+)\}?"#,
                r#"|os\.environ\[["']([A-Z][A-Z0-9_]+)["']\]"#,
                r#"|os\.getenv\(["']([A-Z][A-Z0-9_]+)["']"#,
                r#"|process\.env\.([A-Z][A-Z0-9_]+)"#,
                r#"|export\s+([A-Z][A-Z0-9_]+)="#,
            ))?,
            code_block: Regex::new(r"(?s)```(\w*)[^\n]*\n(.*?)```")?,
            post: compile_all(&[
                r"-X\s+POST",
                r"-X\s+PUT",
                r"-X\s+PATCH",
                r"-X\s+DELETE",
                r"--data\b",
                r#"-d\s+['"]"#,
            ])?,
            file_read: compile_all(&[
                r"\breads?\s+(the\s+)?files?\b",
                r"\bopens?\s+(the\s+)?files?\b",
                r"\bloads?\s+(the\s+)?files?\b",
                r"\breads?\s+from\s+",
            ])?,
            file_write: compile_all(&[
                r"\bwrites?\s+to\s+",
                r"\bwrites?\s+(the\s+)?files?\b",
                r"\bsaves?\s+to\s+",
                r"\bcreates?\s+(a\s+|the\s+)?files?\b",
            ])?,
            db_read: compile_all(&[
                r"\bSELECT\s+.+?\s+FROM\s+\w+",
                r"\bquer(y|ies)\s+(the\s+)?database\b",
            ])?,
            db_write: compile_all(&[
                r"\bINSERT\s+INTO\s+\w+",
                r"\bUPDATE\s+\w+\s+SET\b",
                r"\bDELETE\s+FROM\s+\w+",
                r"\bDROP\s+TABLE\b",
            ])?,
        })
    }

    /// Raw artifacts found in `text`.
    pub fn extract_content(&self, text: &str) -> SkillContent {
        let mut content = SkillContent::default();

        for m in self.url.find_iter(text) {
            let url = m.as_str().trim_end_matches(['.', ',', ';']).to_string();
            if !content.urls.contains(&url) {
                content.urls.push(url);
            }
        }

        for caps in self.code_block.captures_iter(text) {
            let lang = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
            let body = caps.get(2).map_or("", |m| m.as_str());
            content.code_blocks.push(body.to_string());
            if SHELL_TAGS.contains(&lang.as_str()) {
                content.shell_commands.extend(
                    body.lines()
                        .map(|l| l.trim().trim_start_matches("$ "))
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .map(str::to_string),
                );
            }
        }

        let mut env_vars: Vec<String> = self
            .env_var
            .captures_iter(text)
            .filter_map(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string()))
            .collect();
        env_vars.sort();
        env_vars.dedup();
        content.env_vars = env_vars;

        content
    }

    /// Evidence for `content` as found in `text`, located as `source:line`.
    pub fn evidence(&self, content: &SkillContent, text: &str, source: &str) -> Vec<Evidence> {
        let locate = |needle: &str| match text.find(needle) {
            Some(at) => format!("{source}:{}", line_of(text, at)),
            None => source.to_string(),
        };
        let mut evidence = Vec::new();

        let writes = content
            .shell_commands
            .iter()
            .any(|cmd| self.post.iter().any(|p| p.is_match(cmd)));
        let network = if writes { AccessLevel::Write } else { AccessLevel::Read };
        for url in &content.urls {
            evidence.push(Evidence::new(Resource::Network, network, locate(url)));
        }

        for cmd in &content.shell_commands {
            evidence.push(Evidence::new(Resource::Process, AccessLevel::Execute, locate(cmd)));
        }

        for var in &content.env_vars {
            evidence.push(Evidence::new(Resource::Environment, AccessLevel::Read, locate(var)));
        }

        let phrases = [
            (&self.file_read, Resource::Filesystem, AccessLevel::Read),
            (&self.file_write, Resource::Filesystem, AccessLevel::Write),
            (&self.db_read, Resource::Database, AccessLevel::Read),
            (&self.db_write, Resource::Database, AccessLevel::Write),
        ];
        for (patterns, resource, access) in phrases {
            for pattern in patterns {
                if let Some(m) = pattern.find(text) {
                    let location = format!("{source}:{}", line_of(text, m.start()));
                    evidence.push(Evidence::new(resource, access, location));
                }
            }
        }

        evidence
    }
}

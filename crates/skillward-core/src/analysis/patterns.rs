//! Known-dangerous content patterns.
//!
//! Matched against the raw artifacts a parser extracted ([`SkillContent`]):
//! shell commands, code blocks, URLs, and environment variable names. These
//! findings sit beside the lattice comparison and never change the inferred
//! capability set.

use regex::{Regex, RegexBuilder};
use skillward_types::finding::{AttackClass, Finding, FindingKind, Severity};
use skillward_types::skill::UnifiedSkillRecord;

/// Hosts considered safe outright.
const SAFE_HOSTS: &[&str] = &[
    "github.com",
    "www.github.com",
    "pypi.org",
    "www.pypi.org",
    "npmjs.org",
    "www.npmjs.org",
    "npmjs.com",
    "www.npmjs.com",
];

/// Any subdomain of these is safe too.
const SAFE_HOST_SUFFIXES: &[&str] = &[".github.com", ".pypi.org", ".npmjs.org", ".npmjs.com"];

// ---------------------------------------------------------------------------
// ThreatPattern
// ---------------------------------------------------------------------------

/// One compiled detection rule.
#[derive(Debug, Clone)]
pub struct ThreatPattern {
    regex: Regex,
    severity: Severity,
    attack_class: AttackClass,
    message: &'static str,
}

impl ThreatPattern {
    fn new(
        pattern: &str,
        case_insensitive: bool,
        severity: Severity,
        attack_class: AttackClass,
        message: &'static str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()?,
            severity,
            attack_class,
            message,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn finding(&self, skill: &str, evidence: &str) -> Finding {
        Finding::new(
            skill,
            self.severity,
            FindingKind::PatternMatch,
            self.message,
            evidence,
            self.attack_class,
        )
    }
}

// ---------------------------------------------------------------------------
// PatternCatalog
// ---------------------------------------------------------------------------

/// The compiled threat catalog. Built once per analysis context.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    shell: Vec<ThreatPattern>,
    code: Vec<ThreatPattern>,
    sensitive_env: Vec<Regex>,
    base64: Regex,
}

impl PatternCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Result<Self, regex::Error> {
        use AttackClass::{DataExfiltration, PrivilegeEscalation};
        use Severity::{Critical, High};

        let shell = vec![
            ThreatPattern::new(
                r"curl\s+.*\|\s*(ba)?sh",
                true,
                Critical,
                PrivilegeEscalation,
                "Remote code: curl piped to shell",
            )?,
            ThreatPattern::new(
                r"wget\s+.*\|\s*(ba)?sh",
                true,
                Critical,
                PrivilegeEscalation,
                "Remote code: wget piped to shell",
            )?,
            ThreatPattern::new(
                r"rm\s+-[a-zA-Z]*r[a-zA-Z]*f|rm\s+-[a-zA-Z]*f[a-zA-Z]*r",
                false,
                Critical,
                PrivilegeEscalation,
                "Destructive operation: recursive forced removal (rm -rf)",
            )?,
            ThreatPattern::new(
                r"base64\s+-d.*\|\s*(ba)?sh",
                true,
                Critical,
                PrivilegeEscalation,
                "Obfuscated code: base64 decode piped to shell",
            )?,
            ThreatPattern::new(
                r"\bnc\s+-l",
                true,
                Critical,
                DataExfiltration,
                "Network listener: netcat in listen mode",
            )?,
            ThreatPattern::new(
                r"chmod\s+777",
                false,
                High,
                PrivilegeEscalation,
                "Excessive permissions: chmod 777 grants world read/write/execute",
            )?,
        ];

        let code = vec![
            ThreatPattern::new(
                r"\beval\s*\(",
                false,
                High,
                PrivilegeEscalation,
                "Dynamic code evaluation: eval() can run arbitrary code",
            )?,
            ThreatPattern::new(
                r"\bexec\s*\(",
                false,
                High,
                PrivilegeEscalation,
                "Dynamic code evaluation: exec() can run arbitrary code",
            )?,
        ];

        let sensitive_env = [
            r"SECRET",
            r"PASSWORD",
            r"TOKEN",
            r"API[_-]?KEY",
            r"CREDENTIAL",
            r"PRIVATE[_-]?KEY",
            r"^AWS_ACCESS_KEY_ID$",
            r"^DATABASE_URL$",
        ]
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect::<Result<Vec<_>, _>>()?;

        let base64 = RegexBuilder::new(r"\bbase64\b")
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            shell,
            code,
            sensitive_env,
            base64,
        })
    }

    pub fn is_sensitive_env_var(&self, name: &str) -> bool {
        self.sensitive_env.iter().any(|re| re.is_match(name))
    }

    /// Run every rule against a record's content.
    ///
    /// Findings come out in a fixed order: shell, code, URLs, environment,
    /// then the cross-channel check.
    pub fn detect(&self, record: &UnifiedSkillRecord) -> Vec<Finding> {
        let content = &record.content;
        let skill = record.name.as_str();
        let mut findings = Vec::new();

        for cmd in &content.shell_commands {
            for pattern in self.shell.iter().filter(|p| p.is_match(cmd)) {
                findings.push(pattern.finding(skill, cmd));
            }
        }

        for block in &content.code_blocks {
            for pattern in self.code.iter().filter(|p| p.is_match(block)) {
                findings.push(pattern.finding(skill, block));
            }
        }

        for url in content.urls.iter().filter(|u| !is_safe_url(u)) {
            findings.push(Finding::new(
                skill,
                Severity::High,
                FindingKind::PatternMatch,
                format!("External URL detected: {url}"),
                url,
                AttackClass::DataExfiltration,
            ));
        }

        for var in content
            .env_vars
            .iter()
            .filter(|v| self.is_sensitive_env_var(v))
        {
            findings.push(Finding::new(
                skill,
                Severity::High,
                FindingKind::PatternMatch,
                format!("Sensitive environment variable accessed: {var}"),
                var,
                AttackClass::DataExfiltration,
            ));
        }

        let encodes = content
            .shell_commands
            .iter()
            .chain(content.code_blocks.iter())
            .any(|text| self.base64.is_match(text));
        let external = content.urls.iter().any(|u| !is_safe_url(u));
        if encodes && external {
            findings.push(Finding::new(
                skill,
                Severity::Critical,
                FindingKind::InfoFlow,
                "Information flow: base64 encoding combined with external network access",
                "base64 + external URL",
                AttackClass::DataExfiltration,
            ));
        }

        findings
    }
}

/// Whether `raw` points at an allow-listed host. Unparseable URLs are unsafe.
pub fn is_safe_url(raw: &str) -> bool {
    let Ok(parsed) = url::Url::parse(raw.trim()) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    SAFE_HOSTS.contains(&host.as_str())
        || SAFE_HOST_SUFFIXES.iter().any(|s| host.ends_with(s))
        || host.starts_with("docs.")
}

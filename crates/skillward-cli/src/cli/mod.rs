//! CLI command definitions and shared set-up for the `skillward` binary.
//!
//! Uses clap derive macros for argument parsing. Every verification command
//! takes a directory (or a single skill file), discovers skills in it, and
//! runs some prefix of the pipeline.

pub mod lock;
pub mod render;
pub mod scan;
pub mod trust;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use skillward_core::pipeline::AnalysisContext;
use skillward_core::report::RunReport;
use skillward_infra::config::{default_config_path, load_config};
use skillward_infra::parser::{Discovery, ParserRegistry};
use skillward_types::finding::Severity;

/// Verify agent skills before you install them.
#[derive(Parser)]
#[command(name = "skillward", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: skillward.toml in the scanned directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Lowest finding severity that makes a skill unsafe.
    #[arg(long, global = true)]
    pub threshold: Option<Severity>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze, score, and resolve every skill under a directory.
    Scan {
        /// Directory to scan.
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Check declared against inferred capabilities (no resolution).
    Verify {
        /// Directory or single skill file.
        path: PathBuf,
    },

    /// Show trust scores and levels.
    Trust {
        /// Directory to scan.
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Resolve dependencies and write a lockfile.
    Lock {
        /// Directory to scan.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Lockfile path (default: skill-lock.json in the scanned directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

/// A loaded configuration plus everything discovered under the target.
pub struct Workspace {
    pub ctx: AnalysisContext,
    pub discovery: Discovery,
}

impl Workspace {
    /// Load configuration for `target` and discover its skills.
    pub async fn open(target: &Path, config: Option<&Path>, threshold: Option<Severity>) -> Result<Self> {
        if !target.exists() {
            anyhow::bail!("{} does not exist", target.display());
        }

        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_config_path(target));
        let config = load_config(&config_path).await?;

        let mut ctx = AnalysisContext::new(config).context("Failed to build analysis context")?;
        if let Some(threshold) = threshold {
            ctx = ctx.with_threshold(threshold);
        }

        let registry = ParserRegistry::new().context("Failed to compile evidence patterns")?;
        let discovery = registry.discover(target)?;
        tracing::debug!(
            config = %config_path.display(),
            formats = ?registry.formats(),
            "workspace opened"
        );

        Ok(Self { ctx, discovery })
    }

    /// Records to analyze, leaving parse failures behind for [`Self::merge_malformed`].
    pub fn take_records(&mut self) -> Vec<skillward_types::skill::UnifiedSkillRecord> {
        std::mem::take(&mut self.discovery.records)
    }

    /// Fold per-file parse failures into the run report.
    pub fn merge_malformed(&mut self, report: &mut RunReport) {
        report.malformed.append(&mut self.discovery.malformed);
        report
            .malformed
            .sort_by(|a, b| a.origin.cmp(&b.origin).then_with(|| a.reason.cmp(&b.reason)));
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["skillward", "scan", "skills", "--json", "--threshold", "high", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.threshold, Some(Severity::High));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Scan { ref path } if path == Path::new("skills")));
    }

    #[test]
    fn test_bad_threshold_rejected() {
        assert!(Cli::try_parse_from(["skillward", "verify", ".", "--threshold", "severe"]).is_err());
    }

    #[test]
    fn test_lock_output_flag() {
        let cli = Cli::try_parse_from(["skillward", "lock", "-o", "out.json"]).unwrap();
        match cli.command {
            Commands::Lock { path, output } => {
                assert_eq!(path, PathBuf::from("."));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected lock"),
        }
    }

    #[tokio::test]
    async fn test_workspace_merges_parse_failures() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("ok.skill.json"), r#"{"name": "ok", "version": "1.0.0"}"#).unwrap();
        std::fs::write(tmp.path().join("bad.skill.json"), "{").unwrap();

        let mut ws = Workspace::open(tmp.path(), None, None).await.unwrap();
        let records = ws.take_records();
        assert_eq!(records.len(), 1);

        let mut report = skillward_core::pipeline::run_analysis(&mut ws.ctx, records).await.unwrap();
        ws.merge_malformed(&mut report);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.exit_status().code(), 2);
    }

    #[tokio::test]
    async fn test_workspace_missing_target() {
        let tmp = TempDir::new().unwrap();
        assert!(Workspace::open(&tmp.path().join("absent"), None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_workspace_rejects_unparseable_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("skillward.toml"), "[policy\n").unwrap();
        let err = Workspace::open(tmp.path(), None, None).await.err().unwrap();
        assert!(format!("{err:#}").contains("skillward.toml"));
    }
}

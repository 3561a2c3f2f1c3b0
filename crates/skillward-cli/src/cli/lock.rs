//! `skillward lock`: resolve and pin the configuration.

use std::path::{Path, PathBuf};

use anyhow::Result;
use console::style;

use skillward_core::pipeline::run_pipeline;
use skillward_core::report::{ExitStatus, ResolutionOutcome};
use skillward_infra::lockfile::{write_lockfile, Lockfile, LOCKFILE_NAME};
use skillward_types::finding::Severity;

use super::{print_json, render, Output, Workspace};

fn default_output(target: &Path) -> PathBuf {
    if target.is_file() {
        target
            .parent()
            .map(|dir| dir.join(LOCKFILE_NAME))
            .unwrap_or_else(|| PathBuf::from(LOCKFILE_NAME))
    } else {
        target.join(LOCKFILE_NAME)
    }
}

/// The lockfile is written only when resolution succeeds.
pub async fn lock(
    target: &Path,
    output: Option<PathBuf>,
    config: Option<&Path>,
    threshold: Option<Severity>,
    out: Output,
) -> Result<ExitStatus> {
    let mut ws = Workspace::open(target, config, threshold).await?;
    let records = ws.take_records();
    let mut report = run_pipeline(&mut ws.ctx, records).await?;
    ws.merge_malformed(&mut report);

    let ResolutionOutcome::Resolved { configuration } = &report.resolution else {
        if out.json {
            print_json(&report)?;
        } else if !out.quiet {
            println!();
            render::print_problems(&report);
            render::print_resolution(&report.resolution);
            println!("  {}", style("Lockfile not written.").dim());
            println!();
        }
        return Ok(report.exit_status());
    };

    let lockfile = Lockfile::from_configuration(configuration, ws.ctx.policy());
    let path = output.unwrap_or_else(|| default_output(target));
    write_lockfile(&lockfile, &path)?;

    if out.json {
        print_json(&lockfile)?;
    } else if !out.quiet {
        println!();
        render::print_configuration(configuration);
        render::print_problems(&report);
        println!(
            "  {} Wrote {} ({} skill(s))",
            style("✓").green().bold(),
            style(path.display()).cyan(),
            lockfile.metadata.total_skills
        );
        println!();
    }
    Ok(report.exit_status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_next_to_target() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(default_output(tmp.path()), tmp.path().join(LOCKFILE_NAME));

        let file = tmp.path().join("a.skill.json");
        std::fs::write(&file, "{}").unwrap();
        assert_eq!(default_output(&file), tmp.path().join(LOCKFILE_NAME));
    }
}

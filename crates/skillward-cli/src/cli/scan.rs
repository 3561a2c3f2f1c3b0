//! `skillward scan` and `skillward verify`.

use std::path::Path;

use anyhow::Result;

use skillward_core::pipeline::{run_analysis, run_pipeline};
use skillward_core::report::{ExitStatus, RunReport};
use skillward_types::finding::Severity;

use super::{print_json, render, Output, Workspace};

/// Every stage: analysis, trust, and resolution.
pub async fn scan(
    target: &Path,
    config: Option<&Path>,
    threshold: Option<Severity>,
    out: Output,
) -> Result<ExitStatus> {
    let mut ws = Workspace::open(target, config, threshold).await?;
    let records = ws.take_records();
    let mut report = run_pipeline(&mut ws.ctx, records).await?;
    ws.merge_malformed(&mut report);

    emit(&report, out, true)?;
    Ok(report.exit_status())
}

/// Capability analysis and trust only.
pub async fn verify(
    target: &Path,
    config: Option<&Path>,
    threshold: Option<Severity>,
    out: Output,
) -> Result<ExitStatus> {
    let mut ws = Workspace::open(target, config, threshold).await?;
    let records = ws.take_records();
    let mut report = run_analysis(&mut ws.ctx, records).await?;
    ws.merge_malformed(&mut report);

    emit(&report, out, false)?;
    Ok(report.exit_status())
}

fn emit(report: &RunReport, out: Output, with_resolution: bool) -> Result<()> {
    if out.json {
        return print_json(report);
    }
    if out.quiet {
        return Ok(());
    }

    println!();
    render::print_skills(report);
    render::print_findings(report);
    render::print_problems(report);
    if with_resolution {
        render::print_resolution(&report.resolution);
    }
    render::print_summary(report);
    Ok(())
}

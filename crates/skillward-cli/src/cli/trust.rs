//! `skillward trust`: intrinsic and effective trust per skill.

use std::path::Path;

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use skillward_core::pipeline::run_analysis;
use skillward_core::report::ExitStatus;
use skillward_types::trust::{TrustScore, TrustSignals};

use super::{print_json, render, Output, Workspace};

#[derive(Serialize)]
struct TrustRow<'a> {
    name: &'a str,
    version: &'a str,
    /// `None` for skills excluded by a dependency cycle.
    trust: Option<&'a TrustScore>,
}

pub async fn trust(target: &Path, config: Option<&Path>, out: Output) -> Result<ExitStatus> {
    let mut ws = Workspace::open(target, config, None).await?;
    let records = ws.take_records();
    let mut report = run_analysis(&mut ws.ctx, records).await?;
    ws.merge_malformed(&mut report);

    // Unsafe verdicts do not fail this command; only input problems and cycles do.
    let status = if report.skills.is_empty() || !report.malformed.is_empty() {
        ExitStatus::InputError
    } else if !report.cycles.is_empty() {
        ExitStatus::Failure
    } else {
        ExitStatus::Success
    };

    if out.json {
        let rows: Vec<TrustRow<'_>> = report
            .skills
            .iter()
            .map(|s| TrustRow {
                name: &s.name,
                version: &s.version,
                trust: s.trust.as_ref(),
            })
            .collect();
        print_json(&rows)?;
        return Ok(status);
    }
    if out.quiet {
        return Ok(status);
    }

    println!();
    if report.skills.is_empty() {
        println!("  {}", style("No skills found.").dim());
        println!();
    } else {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Skill").fg(Color::Cyan),
                Cell::new("Version"),
                Cell::new("Intrinsic"),
                Cell::new("Effective"),
                Cell::new("Level"),
                Cell::new("Signals (prov/behav/comm/hist)"),
            ]);

        for skill in &report.skills {
            let row = match &skill.trust {
                Some(t) => vec![
                    Cell::new(&skill.name).fg(Color::Cyan),
                    Cell::new(&skill.version),
                    Cell::new(format!("{:.3}", t.intrinsic())),
                    effective_cell(t),
                    Cell::new(t.level()),
                    Cell::new(signal_summary(t.signals())),
                ],
                None => vec![
                    Cell::new(&skill.name).fg(Color::Cyan),
                    Cell::new(&skill.version),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("excluded (cycle)").fg(Color::DarkGrey),
                    Cell::new("-"),
                ],
            };
            table.add_row(row);
        }
        println!("{table}");
        println!();
    }

    render::print_problems(&report);
    Ok(status)
}

/// Effective score, highlighted when a dependency pulled it below intrinsic.
fn effective_cell(t: &TrustScore) -> Cell {
    let cell = Cell::new(format!("{:.3}", t.effective()));
    if t.effective() < t.intrinsic() {
        cell.fg(Color::Yellow)
    } else {
        cell
    }
}

fn signal_summary(s: &TrustSignals) -> String {
    format!(
        "{:.2} / {:.2} / {:.2} / {:.2}",
        s.provenance, s.behavioral, s.community, s.historical
    )
}

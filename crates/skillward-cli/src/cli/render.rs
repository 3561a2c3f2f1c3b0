//! Styled terminal rendering of run reports.

use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use skillward_core::report::{ExitStatus, ResolutionOutcome, RunReport, SkillReport};
use skillward_types::finding::{max_safety_severity, Severity, Verdict};
use skillward_types::resolution::ResolvedConfiguration;
use skillward_types::trust::{TrustLevel, TrustScore};

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Low => Color::Blue,
        Severity::Medium => Color::Yellow,
        Severity::High => Color::Red,
        Severity::Critical => Color::Magenta,
    }
}

fn trust_color(level: TrustLevel) -> Color {
    match level {
        TrustLevel::Unsigned => Color::Red,
        TrustLevel::Signed => Color::Yellow,
        TrustLevel::CommunityVerified => Color::Green,
        TrustLevel::FormallyVerified => Color::Cyan,
    }
}

fn verdict_cell(verdict: Verdict) -> Cell {
    match verdict {
        Verdict::Safe => Cell::new("SAFE").fg(Color::Green),
        Verdict::Unsafe => Cell::new("UNSAFE").fg(Color::Red),
    }
}

fn trust_cell(trust: Option<&TrustScore>) -> Cell {
    match trust {
        Some(t) => Cell::new(format!("{:.2} {}", t.effective(), t.level())).fg(trust_color(t.level())),
        None => Cell::new("cycle").fg(Color::DarkGrey),
    }
}

/// Finding count, colored by the worst finding that affects the verdict.
fn findings_cell(skill: &SkillReport) -> Cell {
    let cell = Cell::new(skill.findings.len());
    match max_safety_severity(&skill.findings) {
        Some(severity) => cell.fg(severity_color(severity)),
        None => cell,
    }
}

fn capability_list(skill: &SkillReport) -> String {
    if skill.capabilities.is_empty() {
        "-".to_string()
    } else {
        skill.capabilities.to_strings().join(", ")
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per skill: verdict, inferred capabilities, trust.
pub fn print_skills(report: &RunReport) {
    if report.skills.is_empty() {
        println!("  {}", style("No skills found.").dim());
        println!();
        return;
    }

    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Skill").fg(Color::Cyan),
        Cell::new("Version"),
        Cell::new("Format"),
        Cell::new("Verdict"),
        Cell::new("Findings"),
        Cell::new("Capabilities"),
        Cell::new("Trust"),
    ]);

    for skill in &report.skills {
        table.add_row(vec![
            Cell::new(&skill.name).fg(Color::Cyan),
            Cell::new(&skill.version),
            Cell::new(&skill.format),
            verdict_cell(skill.verdict),
            findings_cell(skill),
            Cell::new(capability_list(skill)),
            trust_cell(skill.trust.as_ref()),
        ]);
    }

    println!("{table}");
    println!();
}

/// Every finding, grouped by skill.
pub fn print_findings(report: &RunReport) {
    let with_findings: Vec<&SkillReport> = report.skills.iter().filter(|s| !s.findings.is_empty()).collect();
    if with_findings.is_empty() {
        return;
    }

    println!("  {}", style("── Findings ──").dim());
    for skill in with_findings {
        println!();
        println!("  {}", style(skill.id()).bold());
        for finding in &skill.findings {
            let tag = format!("{:<8}", finding.severity().to_string());
            let tag = match finding.severity() {
                Severity::Critical => style(tag).magenta().bold(),
                Severity::High => style(tag).red(),
                Severity::Medium => style(tag).yellow(),
                Severity::Low => style(tag).blue(),
            };
            let info = if finding.affects_safety() { "" } else { " (informational)" };
            println!(
                "    {} {} [{}]{}",
                tag,
                finding.message(),
                style(finding.attack_class()).dim(),
                style(info).dim()
            );
            if !finding.evidence().is_empty() {
                println!("             {}", style(finding.evidence()).dim());
            }
        }
    }
    println!();
}

/// Parse failures and cycles.
pub fn print_problems(report: &RunReport) {
    if !report.malformed.is_empty() {
        println!("  {}", style("── Malformed ──").dim());
        for m in &report.malformed {
            println!("  {} {}: {}", style("✗").red(), m.origin, m.reason);
        }
        println!();
    }

    if !report.cycles.is_empty() {
        println!("  {}", style("── Cycles ──").dim());
        for cycle in &report.cycles {
            println!("  {} {}", style("↻").yellow(), cycle);
            println!("    excluded: {}", style(cycle.component.join(", ")).dim());
        }
        println!();
    }
}

pub fn print_configuration(configuration: &ResolvedConfiguration) {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Skill").fg(Color::Cyan),
        Cell::new("Version"),
        Cell::new("Dependencies"),
        Cell::new("Trust"),
    ]);
    for skill in configuration.skills.values() {
        let deps = if skill.dependencies.is_empty() {
            "-".to_string()
        } else {
            skill
                .dependencies
                .iter()
                .map(|(name, version)| format!("{name}@{version}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(vec![
            Cell::new(&skill.name).fg(Color::Cyan),
            Cell::new(&skill.version),
            Cell::new(deps),
            trust_cell(Some(&skill.trust)),
        ]);
    }
    println!("{table}");
    println!();
}

pub fn print_resolution(outcome: &ResolutionOutcome) {
    println!("  {}", style("── Resolution ──").dim());
    match outcome {
        ResolutionOutcome::Resolved { configuration } => {
            println!(
                "  {} Resolved {} skill(s)",
                style("✓").green().bold(),
                configuration.len()
            );
            println!();
            if !configuration.is_empty() {
                print_configuration(configuration);
            }
        }
        ResolutionOutcome::Conflict { constraints } => {
            println!("  {} No consistent configuration. Conflicting constraints:", style("✗").red().bold());
            for c in constraints {
                println!("    - {c}");
            }
            println!();
        }
        ResolutionOutcome::Inconsistent { constraints } => {
            println!("  {} Chosen configuration failed verification:", style("✗").red().bold());
            for c in constraints {
                println!("    - {c}");
            }
            println!();
        }
        ResolutionOutcome::Timeout => {
            println!("  {} Resolution timed out", style("✗").red().bold());
            println!();
        }
        ResolutionOutcome::Skipped { reason } => {
            println!("  {}", style(format!("skipped ({reason})")).dim());
            println!();
        }
    }
}

pub fn print_summary(report: &RunReport) {
    let status = report.exit_status();
    let mark = match status {
        ExitStatus::Success => style("✓").green().bold(),
        ExitStatus::Failure => style("✗").red().bold(),
        ExitStatus::InputError => style("!").yellow().bold(),
    };
    println!(
        "  {} {} skill(s), {} unsafe, {} malformed (threshold {})",
        mark,
        report.skills.len(),
        report.unsafe_count(),
        report.malformed.len(),
        report.threshold
    );
    println!();
}

//! Pipeline orchestration: records in, [`RunReport`] out.
//!
//! # Stages
//!
//! 1. Validate every record. Malformed or duplicate records are reported and
//!    skipped; they never abort the run.
//! 2. Analyze valid records concurrently in a `JoinSet`, bounded by a
//!    `Semaphore`, the whole stage under one timeout.
//! 3. Trust: intrinsic scores for every record, then (after the barrier)
//!    propagation over the name-level dependency graph.
//! 4. Resolution on a blocking thread with its own timeout.
//!
//! Per-skill state is owned by the task analyzing it. Results are merged
//! into the context memo and the report by the single caller afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use semver::Version;
use sha2::{Digest, Sha256};
use skillward_types::capability::CapabilityParseError;
use skillward_types::config::GlobalConfig;
use skillward_types::error::{CyclicDependency, MalformedRecord};
use skillward_types::finding::Severity;
use skillward_types::resolution::Policy;
use skillward_types::skill::UnifiedSkillRecord;
use skillward_types::trust::{TrustError, TrustScore};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::analysis::{analyze, PatternCatalog, SkillAnalysis};
use crate::graph::DependencyGraph;
use crate::report::{ResolutionOutcome, RunReport, SkillReport};
use crate::resolver::{resolve, Candidate, ResolveError, ResolveOptions};
use crate::trust::{effective_score, propagate, TrustEngine};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The configuration cannot be turned into an analysis context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] CapabilityParseError),

    #[error("invalid trust configuration: {0}")]
    InvalidTrust(#[from] TrustError),

    #[error("failed to compile threat patterns: {0}")]
    Patterns(#[from] regex::Error),
}

/// Whole-run failures. Resolution failures are not errors; they are
/// reported in [`ResolutionOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("analysis did not finish within {0:?}")]
    AnalysisTimeout(Duration),

    #[error("analysis task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    Cycle(#[from] CyclicDependency),
}

// ---------------------------------------------------------------------------
// AnalysisContext
// ---------------------------------------------------------------------------

/// Caller-owned state threaded through every run.
///
/// Holds the parsed policy, the compiled pattern catalog, the clock used for
/// trust decay, and a memo of analyses keyed by record fingerprint.
#[derive(Debug)]
pub struct AnalysisContext {
    config: GlobalConfig,
    policy: Policy,
    trust: TrustEngine,
    patterns: Arc<PatternCatalog>,
    now: DateTime<Utc>,
    memo: HashMap<String, SkillAnalysis>,
}

impl AnalysisContext {
    pub fn new(config: GlobalConfig) -> Result<Self, ContextError> {
        let policy = config.policy.to_policy()?;
        let trust = TrustEngine::from_config(&config.trust)?;
        let patterns = Arc::new(PatternCatalog::builtin()?);
        Ok(Self {
            config,
            policy,
            trust,
            patterns,
            now: Utc::now(),
            memo: HashMap::new(),
        })
    }

    /// Pin the clock, for reproducible decay.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.config.analysis.severity_threshold = threshold;
        self
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Number of memoized analyses.
    pub fn cached(&self) -> usize {
        self.memo.len()
    }
}

fn fingerprint(record: &UnifiedSkillRecord) -> Option<String> {
    let bytes = serde_json::to_vec(record).ok()?;
    Some(format!("{:x}", Sha256::digest(&bytes)))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Analysis and trust only; resolution is reported as skipped.
pub async fn run_analysis(
    ctx: &mut AnalysisContext,
    records: Vec<UnifiedSkillRecord>,
) -> Result<RunReport, PipelineError> {
    run(ctx, records, false).await
}

/// Every stage, including resolution.
pub async fn run_pipeline(
    ctx: &mut AnalysisContext,
    records: Vec<UnifiedSkillRecord>,
) -> Result<RunReport, PipelineError> {
    run(ctx, records, true).await
}

async fn run(
    ctx: &mut AnalysisContext,
    records: Vec<UnifiedSkillRecord>,
    with_resolution: bool,
) -> Result<RunReport, PipelineError> {
    let (analyzed, mut malformed) = analyze_all(ctx, records).await?;
    malformed.sort_by(|a, b| a.origin.cmp(&b.origin).then_with(|| a.reason.cmp(&b.reason)));

    let trust = assess_trust(ctx, &analyzed)?;

    let resolution = if !with_resolution {
        ResolutionOutcome::Skipped {
            reason: "analysis only".to_string(),
        }
    } else {
        resolve_stage(ctx, &analyzed, &trust.intrinsic).await?
    };

    let threshold = ctx.config.analysis.severity_threshold;
    let skills: Vec<SkillReport> = analyzed
        .into_iter()
        .zip(trust.reported)
        .map(|(a, trust)| SkillReport {
            verdict: a.analysis.verdict(threshold),
            name: a.record.name,
            version: a.version.to_string(),
            format: a.record.format,
            source_path: a.record.source_path,
            capabilities: a.analysis.inferred,
            declared: a.record.declared,
            findings: a.analysis.findings,
            pola: a.analysis.pola,
            trust,
        })
        .collect();

    let report = RunReport {
        threshold,
        skills,
        malformed,
        cycles: trust.cycles,
        resolution,
    };
    tracing::info!(
        skills = report.skills.len(),
        malformed = report.malformed.len(),
        unsafe_skills = report.unsafe_count(),
        cycles = report.cycles.len(),
        exit = report.exit_status().code(),
        "pipeline complete"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Analysis stage
// ---------------------------------------------------------------------------

struct Analyzed {
    record: UnifiedSkillRecord,
    version: Version,
    analysis: SkillAnalysis,
}

async fn analyze_all(
    ctx: &mut AnalysisContext,
    records: Vec<UnifiedSkillRecord>,
) -> Result<(Vec<Analyzed>, Vec<MalformedRecord>), PipelineError> {
    let mut malformed = Vec::new();
    let mut seen: BTreeSet<(String, Version)> = BTreeSet::new();
    let mut analyzed = Vec::new();
    let mut pending = Vec::new();

    for record in records {
        let version = match record.validate() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed record");
                malformed.push(e);
                continue;
            }
        };
        if !seen.insert((record.name.clone(), version.clone())) {
            let e = MalformedRecord::new(record.origin(), format!("duplicate skill {}", record.id()));
            tracing::warn!(error = %e, "skipping duplicate record");
            malformed.push(e);
            continue;
        }

        let key = fingerprint(&record);
        match key.as_ref().and_then(|k| ctx.memo.get(k)) {
            Some(analysis) => {
                tracing::debug!(skill = %record.id(), "analysis reused");
                analyzed.push(Analyzed {
                    analysis: analysis.clone(),
                    record,
                    version,
                });
            }
            None => pending.push((record, version, key)),
        }
    }

    let settings = &ctx.config.analysis;
    let budget = Duration::from_secs(settings.timeout_secs);
    let semaphore = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));
    let catalog = settings.pattern_detection.then(|| Arc::clone(&ctx.patterns));

    let mut set = JoinSet::new();
    for (record, version, key) in pending {
        let semaphore = Arc::clone(&semaphore);
        let catalog = catalog.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = analyze(&record, catalog.as_deref());
            (record, version, key, result)
        });
    }

    let collected = tokio::time::timeout(budget, async {
        let mut finished = Vec::new();
        while let Some(joined) = set.join_next().await {
            finished.push(joined?);
        }
        Ok::<_, tokio::task::JoinError>(finished)
    })
    .await;

    let finished = match collected {
        Ok(result) => result?,
        Err(_) => {
            set.abort_all();
            tracing::error!(?budget, "analysis timed out");
            return Err(PipelineError::AnalysisTimeout(budget));
        }
    };

    for (record, version, key, result) in finished {
        match result {
            Ok(analysis) => {
                if let Some(key) = key {
                    ctx.memo.insert(key, analysis.clone());
                }
                analyzed.push(Analyzed {
                    record,
                    version,
                    analysis,
                });
            }
            Err(e) => malformed.push(e),
        }
    }

    analyzed.sort_by(|a, b| {
        a.record
            .name
            .cmp(&b.record.name)
            .then_with(|| a.version.cmp(&b.version))
    });
    Ok((analyzed, malformed))
}

// ---------------------------------------------------------------------------
// Trust stage
// ---------------------------------------------------------------------------

struct TrustStage {
    cycles: Vec<CyclicDependency>,
    /// Intrinsic-only score per analyzed record, same order.
    intrinsic: Vec<TrustScore>,
    /// Reported score per analyzed record; `None` when excluded by a cycle.
    reported: Vec<Option<TrustScore>>,
}

fn assess_trust(ctx: &AnalysisContext, analyzed: &[Analyzed]) -> Result<TrustStage, PipelineError> {
    let union = DependencyGraph::from_records(analyzed.iter().map(|a| &a.record));
    let (_, cycles, excluded) = union.split_cycles();
    for cycle in &cycles {
        tracing::warn!(cycle = %cycle, "skills excluded from trust propagation");
    }

    let mut intrinsic = Vec::with_capacity(analyzed.len());
    for a in analyzed {
        let signals = ctx
            .trust
            .signals_for(&a.record.trust_inputs, a.analysis.behavioral, ctx.now);
        let score = ctx.trust.intrinsic(&signals)?;
        intrinsic.push(TrustScore::intrinsic_only(score, signals));
    }

    // The highest version of each name stands for it in the name-level graph.
    let mut latest: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, a) in analyzed.iter().enumerate() {
        if excluded.contains(&a.record.name) {
            continue;
        }
        latest
            .entry(a.record.name.as_str())
            .and_modify(|j| {
                if a.version > analyzed[*j].version {
                    *j = i;
                }
            })
            .or_insert(i);
    }
    let graph = DependencyGraph::from_records(latest.values().map(|i| &analyzed[*i].record));
    let inputs = latest
        .iter()
        .map(|(name, i)| {
            let score = &intrinsic[*i];
            (name.to_string(), (score.intrinsic(), *score.signals()))
        })
        .collect();
    let by_name = propagate(&graph, &inputs)?;

    let reported = analyzed
        .iter()
        .zip(&intrinsic)
        .map(|(a, score)| {
            if excluded.contains(&a.record.name) {
                return None;
            }
            let deps: Vec<f64> = a
                .record
                .dependencies
                .keys()
                .filter_map(|d| by_name.get(d).map(TrustScore::effective))
                .collect();
            let floor = (!deps.is_empty()).then(|| effective_score(1.0, &deps));
            Some(TrustScore::capped(score.intrinsic(), *score.signals(), floor))
        })
        .collect();

    Ok(TrustStage {
        cycles,
        intrinsic,
        reported,
    })
}

// ---------------------------------------------------------------------------
// Resolution stage
// ---------------------------------------------------------------------------

async fn resolve_stage(
    ctx: &AnalysisContext,
    analyzed: &[Analyzed],
    intrinsic: &[TrustScore],
) -> Result<ResolutionOutcome, PipelineError> {
    if analyzed.is_empty() {
        return Ok(ResolutionOutcome::Skipped {
            reason: "no analyzable skills".to_string(),
        });
    }

    let candidates: Vec<Candidate> = analyzed
        .iter()
        .zip(intrinsic)
        .map(|(a, trust)| Candidate {
            record: a.record.clone(),
            version: a.version.clone(),
            inferred: a.analysis.inferred.clone(),
            trust: *trust,
        })
        .collect();
    let policy = ctx.policy.clone();
    let options = ResolveOptions::from(&ctx.config.resolver);
    let budget = Duration::from_secs(ctx.config.resolver.timeout_secs);

    let task = tokio::task::spawn_blocking(move || resolve(&candidates, &policy, &options));
    let result = match tokio::time::timeout(budget, task).await {
        Ok(joined) => joined?,
        Err(_) => {
            tracing::warn!(?budget, "resolution timed out");
            return Ok(ResolutionOutcome::Timeout);
        }
    };

    Ok(match result {
        Ok(resolution) => ResolutionOutcome::Resolved {
            configuration: resolution.configuration,
        },
        Err(ResolveError::Conflict(conflict)) => {
            for line in conflict.describe() {
                tracing::warn!(constraint = %line, "conflicting constraint");
            }
            ResolutionOutcome::Conflict {
                constraints: conflict.constraints,
            }
        }
        Err(ResolveError::Timeout) => {
            tracing::warn!("resolution exhausted its decision budget");
            ResolutionOutcome::Timeout
        }
        Err(ResolveError::Inconsistent(constraints)) => {
            tracing::error!(violations = constraints.len(), "resolved configuration failed verification");
            ResolutionOutcome::Inconsistent { constraints }
        }
        Err(e @ (ResolveError::NoSkills | ResolveError::Cycle(_))) => ResolutionOutcome::Skipped {
            reason: e.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use skillward_types::capability::{AccessLevel, CapabilitySet, Resource};
    use skillward_types::finding::Verdict;
    use skillward_types::skill::Evidence;
    use skillward_types::trust::TrustLevel;
    use skillward_types::version::VersionConstraint;

    use crate::report::ExitStatus;

    fn context() -> AnalysisContext {
        AnalysisContext::new(GlobalConfig::default())
            .unwrap()
            .with_now(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    fn record(name: &str, version: &str, deps: &[(&str, &str)]) -> UnifiedSkillRecord {
        let mut r = UnifiedSkillRecord::new(name, version, "record");
        r.declared = CapabilitySet::empty().with(Resource::Filesystem, AccessLevel::Read);
        r.evidence
            .push(Evidence::new(Resource::Filesystem, AccessLevel::Read, "SKILL.md:3"));
        for (dep, req) in deps {
            r.dependencies
                .insert(dep.to_string(), VersionConstraint::parse(req).unwrap());
        }
        r
    }

    #[tokio::test]
    async fn test_clean_skills_resolve() {
        let mut ctx = context();
        let records = vec![record("b", "1.0.0", &[]), record("a", "1.0.0", &[("b", "^1")])];
        let report = run_pipeline(&mut ctx, records).await.unwrap();

        assert_eq!(report.skills.len(), 2);
        assert_eq!(report.skills[0].name, "a");
        assert!(report.skills.iter().all(|s| s.verdict == Verdict::Safe));
        let config = report.resolution.configuration().unwrap();
        assert_eq!(config.skills["a"].dependencies["b"], "1.0.0");
        assert_eq!(report.exit_status(), ExitStatus::Success);
    }

    #[tokio::test]
    async fn test_malformed_record_isolated() {
        let mut ctx = context();
        let mut bad = record("bad", "not-a-version", &[]);
        bad.source_path = "skills/bad/SKILL.md".into();
        let report = run_pipeline(&mut ctx, vec![bad, record("good", "1.0.0", &[])])
            .await
            .unwrap();

        assert_eq!(report.skills.len(), 1);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.malformed[0].origin, "skills/bad/SKILL.md");
        assert!(report.resolution.configuration().is_some());
        assert_eq!(report.exit_status(), ExitStatus::InputError);
    }

    #[tokio::test]
    async fn test_duplicate_records_are_malformed() {
        let mut ctx = context();
        let report = run_analysis(&mut ctx, vec![record("a", "1.0.0", &[]), record("a", "1.0.0", &[])])
            .await
            .unwrap();
        assert_eq!(report.skills.len(), 1);
        assert!(report.malformed[0].reason.contains("duplicate skill a@1.0.0"));
    }

    #[tokio::test]
    async fn test_analysis_memo_reused_across_runs() {
        let mut ctx = context();
        let records = vec![record("a", "1.0.0", &[]), record("b", "1.0.0", &[])];
        let first = run_analysis(&mut ctx, records.clone()).await.unwrap();
        assert_eq!(ctx.cached(), 2);
        let second = run_analysis(&mut ctx, records).await.unwrap();
        assert_eq!(ctx.cached(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cycle_excludes_component_from_trust() {
        let mut ctx = context();
        let records = vec![
            record("a", "1.0.0", &[("b", "*")]),
            record("b", "1.0.0", &[("a", "*")]),
            record("c", "1.0.0", &[]),
        ];
        let report = run_pipeline(&mut ctx, records).await.unwrap();

        assert_eq!(report.cycles.len(), 1);
        assert!(report.skills[0].trust.is_none());
        assert!(report.skills[1].trust.is_none());
        assert!(report.skills[2].trust.is_some());
        let config = report.resolution.configuration().unwrap();
        assert_eq!(config.len(), 1);
        assert!(config.get("c").is_some());
        assert_eq!(report.exit_status(), ExitStatus::Failure);
    }

    #[tokio::test]
    async fn test_trust_capped_by_dependency() {
        let mut ctx = context();
        let mut app = record("app", "1.0.0", &[("lib", "^1")]);
        app.trust_inputs.provenance = Some(1.0);
        app.trust_inputs.community = Some(1.0);
        app.trust_inputs.historical = Some(1.0);
        let mut lib = record("lib", "1.0.0", &[]);
        lib.trust_inputs.provenance = Some(0.0);
        lib.trust_inputs.community = Some(0.0);
        lib.trust_inputs.historical = Some(0.0);

        let report = run_analysis(&mut ctx, vec![app, lib]).await.unwrap();
        let app = report.skills[0].trust.unwrap();
        assert!((app.intrinsic() - 1.0).abs() < 1e-9);
        // lib keeps only its behavioral signal: 0.3 * 1.0
        assert!((app.effective() - 0.3).abs() < 1e-9);
        assert_eq!(app.level(), TrustLevel::Signed);
    }

    #[tokio::test]
    async fn test_analysis_only_skips_resolution() {
        let mut ctx = context();
        let report = run_analysis(&mut ctx, vec![record("a", "1.0.0", &[])]).await.unwrap();
        assert!(matches!(report.resolution, ResolutionOutcome::Skipped { .. }));
        assert_eq!(report.exit_status(), ExitStatus::Success);
    }

    #[tokio::test]
    async fn test_no_records_is_input_error() {
        let mut ctx = context();
        let report = run_pipeline(&mut ctx, Vec::new()).await.unwrap();
        assert_eq!(report.exit_status(), ExitStatus::InputError);
    }
}

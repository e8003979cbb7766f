//! CLI entry point: `serve` runs the HTTP server; the rest
//! are offline jobs operating on the same store traits the server uses.
//!
//! The calibration pipeline has no store of its own (`aiq_calibration`'s
//! `RawResponse` is plain, file-friendly data), so `calibrate` reads a batch
//! of responses from a JSON file rather than querying a response log
//! directly -- the same shape a production deployment would stream out of
//! its persistent `ResponseLog` before handing it to the pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use aiq_calibration::{CalibrationPipeline, ClassicalStats, RawResponse};
use aiq_core::item::{DifficultyTier, Domain, QualityState};
use aiq_server::{routes, AppState, Settings};
use aiq_store::{ReliabilitySnapshot, ReliabilityStore};

#[derive(Parser)]
#[command(name = "aiq-server", about = "Adaptive cognitive assessment service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server. The default when no subcommand is given.
    Serve,

    /// Run the IRT calibration pipeline once against a batch of responses.
    Calibrate {
        /// Path to a JSON array of `{user_id, item_id, correct}` responses.
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = aiq_core::constants::MIN_RESPONSES_FOR_CALIBRATION)]
        min_responses: usize,
        #[arg(long, default_value_t = true)]
        bootstrap: bool,
        #[arg(long)]
        no_bootstrap: bool,
        /// Restrict calibration to these item ids; omit for the whole pool.
        #[arg(long, value_delimiter = ',')]
        question_ids: Option<Vec<i64>>,
        /// Compute and report without writing anything back to the item bank.
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-score item quality flags from their classical-stats fields.
    ReevaluateQuestions {
        /// Comma-separated domain names (pattern, logic, spatial, math, verbal, memory).
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<String>>,
        /// Comma-separated difficulty tiers (easy, medium, hard).
        #[arg(long, value_delimiter = ',')]
        difficulties: Option<Vec<String>>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value_t = 0.20)]
        min_score: f64,
        #[arg(long)]
        limit: Option<usize>,
        /// Recompute and report the would-be quality flag without writing it.
        #[arg(long)]
        only_recalculate: bool,
    },

    /// Emit the route/DTO shape of the API as JSON, for client generation.
    ExportOpenapi {
        path: Option<PathBuf>,
        #[arg(long)]
        no_transform: bool,
        #[arg(long)]
        validate: bool,
    },
}

fn parse_domain(s: &str) -> Option<Domain> {
    Domain::ALL.into_iter().find(|d| d.to_string() == s.to_lowercase())
}

fn parse_difficulty(s: &str) -> Option<DifficultyTier> {
    match s.to_lowercase().as_str() {
        "easy" => Some(DifficultyTier::Easy),
        "medium" => Some(DifficultyTier::Medium),
        "hard" => Some(DifficultyTier::Hard),
        _ => None,
    }
}

fn init_logging() {
    fmt()
        .with_env_filter(EnvFilter::from_env("AIQ_LOG"))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Calibrate {
            input,
            min_responses,
            bootstrap,
            no_bootstrap,
            question_ids,
            dry_run,
        } => calibrate(input, min_responses, bootstrap && !no_bootstrap, question_ids, dry_run).await,
        Command::ReevaluateQuestions {
            types,
            difficulties,
            dry_run,
            min_score,
            limit,
            only_recalculate,
        } => reevaluate_questions(types, difficulties, dry_run, min_score, limit, only_recalculate).await,
        Command::ExportOpenapi { path, no_transform, validate } => {
            export_openapi(path, no_transform, validate).await
        }
    }
}

async fn serve() -> ExitCode {
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::from(3);
        }
    };
    let addr = format!("{}:{}", settings.host, settings.port);
    let state = AppState::new(settings);
    let app = routes::build(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind listener");
            return ExitCode::from(4);
        }
    };
    tracing::info!(%addr, "aiq-server listening");

    let make_service = app.into_make_service_with_connect_info::<std::net::SocketAddr>();
    if let Err(err) = axum::serve(listener, make_service).await {
        tracing::error!(error = %err, "server error");
        return ExitCode::from(4);
    }
    ExitCode::SUCCESS
}

/// Point-biserial correlation of each item's 0/1 score against each
/// examinee's proportion-correct across the whole batch -- the same
/// quantity `priors::prior_from_ctt` expects as a discrimination prior.
fn classical_stats(responses: &[RawResponse]) -> HashMap<i64, ClassicalStats> {
    let mut totals: HashMap<i64, (u32, u32)> = HashMap::new();
    for r in responses {
        let entry = totals.entry(r.user_id).or_insert((0, 0));
        entry.0 += 1;
        if r.correct {
            entry.1 += 1;
        }
    }
    let proportion_correct = |user_id: i64| -> f64 {
        totals
            .get(&user_id)
            .map(|(n, correct)| *correct as f64 / *n as f64)
            .unwrap_or(0.0)
    };

    let mut by_item: HashMap<i64, Vec<&RawResponse>> = HashMap::new();
    for r in responses {
        by_item.entry(r.item_id).or_default().push(r);
    }

    by_item
        .into_iter()
        .map(|(item_id, rows)| {
            let n = rows.len() as f64;
            let empirical_p = rows.iter().filter(|r| r.correct).count() as f64 / n;
            let scores: Vec<f64> = rows.iter().map(|r| proportion_correct(r.user_id)).collect();
            let item_scores: Vec<f64> = rows.iter().map(|r| if r.correct { 1.0 } else { 0.0 }).collect();
            let point_biserial = pearson(&item_scores, &scores);
            (item_id, ClassicalStats { empirical_p, point_biserial })
        })
        .collect()
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

async fn calibrate(
    input: PathBuf,
    min_responses: usize,
    bootstrap: bool,
    question_ids: Option<Vec<i64>>,
    dry_run: bool,
) -> ExitCode {
    let raw = match std::fs::read_to_string(&input) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(error = %err, path = %input.display(), "failed to read input file");
            return ExitCode::from(4);
        }
    };
    let mut responses: Vec<RawResponse> = match serde_json::from_str(&raw) {
        Ok(r) => r,
        Err(err) => {
            tracing::error!(error = %err, "failed to parse input file");
            return ExitCode::from(3);
        }
    };
    if let Some(ids) = &question_ids {
        responses.retain(|r| ids.contains(&r.item_id));
    }
    if responses.len() < min_responses {
        tracing::warn!(count = responses.len(), min_responses, "below minimum response count");
        return ExitCode::from(1);
    }

    let classical = classical_stats(&responses);
    let pipeline = if bootstrap {
        CalibrationPipeline::new()
    } else {
        CalibrationPipeline::new().with_bootstrap_iterations(0)
    };

    match pipeline.run(&responses, &classical, &[], chrono::Utc::now()) {
        Ok(run) => {
            tracing::info!(
                calibrated = run.calibrated.len(),
                dropped_for_sparsity = run.dropped_for_sparsity.len(),
                examinees_used = run.examinees_used,
                bootstrap_skipped = run.bootstrap_skipped,
                total_ms = run.total_ms,
                cronbach_alpha = ?run.cronbach_alpha,
                test_retest = ?run.test_retest,
                split_half_spearman_brown = ?run.split_half_spearman_brown,
                dry_run,
                "calibration run complete"
            );

            if !dry_run {
                let settings = match Settings::load() {
                    Ok(s) => s,
                    Err(err) => {
                        tracing::error!(error = %err, "invalid configuration");
                        return ExitCode::from(3);
                    }
                };
                let state = AppState::new(settings);
                let snapshot = ReliabilitySnapshot {
                    computed_at: run.completed_at,
                    cronbach_alpha: run.cronbach_alpha,
                    test_retest: run.test_retest,
                    split_half_spearman_brown: run.split_half_spearman_brown,
                };
                if let Err(err) = state.reliability_store.record(snapshot).await {
                    tracing::error!(error = %err, "failed to record reliability snapshot");
                    return ExitCode::from(4);
                }
            }

            if run.validation.as_ref().is_some_and(|v| v.quality == aiq_calibration::FitQuality::Poor) {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "calibration failed");
            ExitCode::from(2)
        }
    }
}

async fn reevaluate_questions(
    types: Option<Vec<String>>,
    difficulties: Option<Vec<String>>,
    dry_run: bool,
    min_score: f64,
    limit: Option<usize>,
    only_recalculate: bool,
) -> ExitCode {
    let types: Option<Vec<Domain>> = match types {
        None => None,
        Some(raw) => match raw.iter().map(|t| parse_domain(t)).collect::<Option<Vec<_>>>() {
            Some(parsed) => Some(parsed),
            None => {
                tracing::error!("invalid --types value");
                return ExitCode::from(3);
            }
        },
    };
    let difficulties: Option<Vec<DifficultyTier>> = match difficulties {
        None => None,
        Some(raw) => match raw.iter().map(|d| parse_difficulty(d)).collect::<Option<Vec<_>>>() {
            Some(parsed) => Some(parsed),
            None => {
                tracing::error!("invalid --difficulties value");
                return ExitCode::from(3);
            }
        },
    };
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::from(3);
        }
    };
    let state = AppState::new(settings);

    let items = match state.item_bank.list_all().await {
        Ok(items) => items,
        Err(err) => {
            tracing::error!(error = %err, "failed to list items");
            return ExitCode::from(4);
        }
    };

    let mut candidates: Vec<_> = items
        .into_iter()
        .filter(|i| types.as_ref().is_none_or(|t| t.contains(&i.domain)))
        .filter(|i| difficulties.as_ref().is_none_or(|d| d.contains(&i.difficulty_tier)))
        .collect();
    if let Some(limit) = limit {
        candidates.truncate(limit);
    }

    let mut flagged = 0;
    let mut updates = Vec::new();
    for mut item in candidates {
        let below_threshold = item.point_biserial < min_score;
        if below_threshold {
            flagged += 1;
            if !only_recalculate {
                item.quality = QualityState::UnderReview;
                updates.push(item);
            }
        }
    }

    if !dry_run && !updates.is_empty() {
        if let Err(err) = state.item_bank.apply_calibration(&updates).await {
            tracing::error!(error = %err, "failed to write back quality flags");
            return ExitCode::from(4);
        }
    }

    tracing::info!(flagged, updated = updates.len(), dry_run, only_recalculate, "reevaluation complete");
    ExitCode::SUCCESS
}

/// Canonicalizes `path` and rejects anything outside the project root, per
/// .
fn validate_output_path(path: &Path) -> Result<PathBuf, ExitCode> {
    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(_) => return Err(ExitCode::from(4)),
    };
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let canonical_parent = match parent.canonicalize() {
        Ok(p) => p,
        Err(_) => return Err(ExitCode::from(4)),
    };
    if !canonical_parent.starts_with(&root) {
        return Err(ExitCode::from(4));
    }
    Ok(canonical_parent.join(path.file_name().unwrap_or_default()))
}

async fn export_openapi(path: Option<PathBuf>, no_transform: bool, validate: bool) -> ExitCode {
    let path = path.unwrap_or_else(|| PathBuf::from("openapi.json"));
    let resolved = match validate_output_path(&path) {
        Ok(p) => p,
        Err(code) => {
            tracing::error!(path = %path.display(), "output path is outside the project root");
            return code;
        }
    };

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": { "title": "aiq-server", "version": env!("CARGO_PKG_VERSION") },
        "paths": {
            "/v1/auth/register": {}, "/v1/auth/login": {}, "/v1/auth/refresh": {},
            "/v1/auth/logout": {}, "/v1/auth/logout-all": {},
            "/v1/auth/request-password-reset": {}, "/v1/auth/reset-password": {},
            "/v1/test/start": {}, "/v1/test/next": {}, "/v1/test/submit": {},
            "/v1/admin/reliability": {}, "/v1/admin/reliability/history": {},
            "/v1/admin/anchor-items": {}, "/v1/admin/anchor-items/auto-select": {},
            "/v1/admin/security/logout-all-events": {},
        },
    });
    let body = if no_transform {
        spec.to_string()
    } else {
        match serde_json::to_string_pretty(&spec) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to render openapi document");
                return ExitCode::from(2);
            }
        }
    };

    if let Err(err) = std::fs::write(&resolved, body) {
        tracing::error!(error = %err, path = %resolved.display(), "failed to write openapi document");
        return ExitCode::from(3);
    }

    if validate && serde_json::from_str::<serde_json::Value>(&std::fs::read_to_string(&resolved).unwrap_or_default()).is_err() {
        tracing::error!("written openapi document failed to re-parse");
        return ExitCode::from(5);
    }

    tracing::info!(path = %resolved.display(), "exported openapi document");
    ExitCode::SUCCESS
}

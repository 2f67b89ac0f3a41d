use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use showreel_budget::BudgetTracker;
use showreel_journal::RunJournal;
use showreel_memory::{LearningsConfig, LearningsManager};
use showreel_observability::{init_process_logging, ProcessKind};
use showreel_orchestrator::{PilotScheduler, SchedulerConfig};
use showreel_providers::{JobSupervisor, ProviderRegistry, RegistryConfig};
use showreel_types::{AudioTier, Brief, ProductionError, ProductionTier};

#[derive(Parser, Debug)]
#[command(name = "showreel-engine")]
#[command(about = "Headless Showreel production backend")]
struct Cli {
    /// Root directory for runs, memory, and logs.
    #[arg(long, default_value = "artifacts")]
    base_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce a video from a concept brief.
    Produce {
        #[arg(long)]
        concept: String,
        #[arg(long)]
        budget: f64,
        #[arg(long, default_value_t = 30.0)]
        duration: f64,
        /// Production tiers to pilot (repeatable).
        #[arg(long = "tier", value_parser = parse_tier)]
        tiers: Vec<ProductionTier>,
        #[arg(long, value_parser = parse_audio_tier, default_value = "simple_overlay")]
        audio_tier: AudioTier,
        /// Force deterministic mock providers (no spend).
        #[arg(long, default_value_t = false)]
        mock: bool,
        #[arg(long, default_value = "luma")]
        video_provider: String,
        #[arg(long, default_value = "openai_tts")]
        audio_provider: String,
        #[arg(long, default_value_t = 2)]
        max_concurrent_pilots: usize,
    },
    /// Resume a crashed or cancelled run by id.
    Resume { run_id: String },
    /// Inspect recorded runs.
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
    /// Inspect and administer the learnings store.
    Learnings {
        #[command(subcommand)]
        command: LearningsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RunsCommand {
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Show {
        run_id: String,
    },
    Delete {
        run_id: String,
    },
    /// Export one edit candidate in CMX3600 interchange form.
    ExportEdl {
        run_id: String,
        /// Candidate id; defaults to the recommended candidate.
        #[arg(long)]
        candidate: Option<String>,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
}

#[derive(Subcommand, Debug)]
enum LearningsCommand {
    /// List learnings for a provider across the namespace hierarchy.
    List {
        #[arg(long)]
        provider: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Record a validation outcome for one learning.
    Validate {
        namespace: String,
        record_id: String,
        #[arg(long, default_value_t = true)]
        success: bool,
    },
    /// List queued promotions awaiting approval.
    Approvals,
    /// Apply a queued promotion (admin operation).
    Approve { queue_record_id: String },
}

fn parse_tier(value: &str) -> Result<ProductionTier, String> {
    ProductionTier::parse(value).ok_or_else(|| format!("unknown tier `{value}`"))
}

fn parse_audio_tier(value: &str) -> Result<AudioTier, String> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(AudioTier::None),
        "music_only" => Ok(AudioTier::MusicOnly),
        "simple_overlay" => Ok(AudioTier::SimpleOverlay),
        "time_synced" => Ok(AudioTier::TimeSynced),
        "full_production" => Ok(AudioTier::FullProduction),
        other => Err(format!("unknown audio tier `{other}`")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let base_dir = PathBuf::from(&cli.base_dir);

    let _guard = match init_process_logging(ProcessKind::Engine, &base_dir.join("logs"), 14) {
        Ok((guard, _info)) => Some(guard),
        Err(err) => {
            eprintln!("logging init failed: {err}");
            None
        }
    };

    match run(cli, base_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            match err.downcast_ref::<ProductionError>() {
                Some(production_err) => ExitCode::from(production_err.exit_code() as u8),
                None => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli, base_dir: PathBuf) -> anyhow::Result<()> {
    match cli.command {
        Command::Produce {
            concept,
            budget,
            duration,
            tiers,
            audio_tier,
            mock,
            video_provider,
            audio_provider,
            max_concurrent_pilots,
        } => {
            let tiers = if tiers.is_empty() {
                vec![ProductionTier::Static, ProductionTier::Animated]
            } else {
                tiers
            };
            let mut brief = Brief::new(concept, duration, budget);
            brief.audio_tier = audio_tier;

            let scheduler = build_scheduler(
                &base_dir,
                RegistryConfig {
                    video_provider,
                    audio_provider,
                    mock_mode: mock,
                    ..RegistryConfig::default()
                },
                SchedulerConfig {
                    max_concurrent_pilots,
                    ..SchedulerConfig::default()
                },
            );

            let cancel = cancellation_on_ctrl_c();
            let report = scheduler.produce(brief, &tiers, cancel).await?;
            print_report(&report);
            Ok(())
        }
        Command::Resume { run_id } => {
            let scheduler = build_scheduler(
                &base_dir,
                RegistryConfig::default(),
                SchedulerConfig::default(),
            );
            let cancel = cancellation_on_ctrl_c();
            let report = scheduler.resume(&run_id, cancel).await?;
            print_report(&report);
            Ok(())
        }
        Command::Runs { command } => {
            let journal = RunJournal::new(&base_dir);
            match command {
                RunsCommand::List { limit } => {
                    for record in journal.list(limit).await? {
                        println!(
                            "{}  {}  {:.0}%  {}",
                            record.run_id, record.status_label(), record.progress_percent,
                            record.concept
                        );
                    }
                }
                RunsCommand::Show { run_id } => match journal.get(&run_id).await? {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => anyhow::bail!("unknown run `{run_id}`"),
                },
                RunsCommand::Delete { run_id } => {
                    if journal.delete(&run_id).await? {
                        println!("deleted {run_id}");
                    } else {
                        anyhow::bail!("unknown run `{run_id}`");
                    }
                }
                RunsCommand::ExportEdl {
                    run_id,
                    candidate,
                    fps,
                } => {
                    let record = journal
                        .get(&run_id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("unknown run `{run_id}`"))?;
                    let edl_path = record
                        .edl_path
                        .ok_or_else(|| anyhow::anyhow!("run `{run_id}` has no EDL"))?;
                    let raw = tokio::fs::read_to_string(&edl_path).await?;
                    let edl = showreel_edl::EditDecisionList::from_json(&raw)?;
                    let candidate_id = candidate
                        .or_else(|| edl.recommended_candidate_id.clone())
                        .ok_or_else(|| anyhow::anyhow!("no candidate to export"))?;
                    let chosen = edl
                        .candidate(&candidate_id)
                        .ok_or_else(|| anyhow::anyhow!("unknown candidate `{candidate_id}`"))?;
                    print!(
                        "{}",
                        showreel_edl::export_cmx3600(chosen, &edl.project_name, fps)
                    );
                }
            }
            Ok(())
        }
        Command::Learnings { command } => {
            let manager = build_learnings(&base_dir);
            let ctx = manager.context(None);
            match command {
                LearningsCommand::List { provider, limit } => {
                    let learnings = manager
                        .provider_learnings(&provider, &ctx, true, limit)
                        .await?;
                    for learning in learnings {
                        println!(
                            "[{:.2}] {}  {}  v{} c{:.2}",
                            learning.priority,
                            learning.record.record_id,
                            learning.namespace,
                            learning.record.validations,
                            learning.record.confidence,
                        );
                    }
                }
                LearningsCommand::Validate {
                    namespace,
                    record_id,
                    success,
                } => {
                    let promoted = manager
                        .validate_learning(&namespace, &record_id, success, &ctx)
                        .await?;
                    match promoted {
                        Some(new_id) => println!("validated; promoted as {new_id}"),
                        None => println!("validated"),
                    }
                }
                LearningsCommand::Approvals => {
                    for request in manager.pending_approvals().await? {
                        println!(
                            "{}  {}",
                            request.record_id,
                            serde_json::to_string(&request.content)?
                        );
                    }
                }
                LearningsCommand::Approve { queue_record_id } => {
                    match manager
                        .approve_promotion(&queue_record_id, &ctx, &ctx.actor_id)
                        .await?
                    {
                        Some(new_id) => println!("promoted as {new_id}"),
                        None => println!("nothing to promote"),
                    }
                }
            }
            Ok(())
        }
    }
}

fn build_scheduler(
    base_dir: &PathBuf,
    registry_config: RegistryConfig,
    scheduler_config: SchedulerConfig,
) -> PilotScheduler {
    let budget = Arc::new(BudgetTracker::new());
    let journal = Arc::new(RunJournal::new(base_dir));
    let registry = Arc::new(ProviderRegistry::new(registry_config));
    let supervisor = JobSupervisor::start();
    let learnings = Arc::new(build_learnings(base_dir));

    PilotScheduler::new(budget, journal, registry, supervisor, scheduler_config)
        .with_learnings(learnings)
}

fn build_learnings(base_dir: &PathBuf) -> LearningsManager {
    let mut config = LearningsConfig::from_env();
    if std::env::var("MEMORY_BASE_PATH").is_err() {
        config.base_path = base_dir.join("memory").display().to_string();
    }
    LearningsManager::new(config)
}

fn cancellation_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested");
            for_signal.cancel();
        }
    });
    cancel
}

fn print_report(report: &showreel_orchestrator::RunReport) {
    println!("run:      {}", report.run_id);
    println!("status:   {:?}", report.status);
    if let Some(winner) = &report.winning_pilot_id {
        println!("winner:   {winner}");
    }
    if let Some(edl) = &report.edl_path {
        println!("edl:      {edl}");
    }
    match &report.final_video_path {
        Some(path) => println!("video:    {path}"),
        None => println!("video:    (not rendered)"),
    }
    if report.simulated {
        println!("note:     simulated output only (mock providers were used)");
    }
    println!("spent:    ${:.2}", report.total_spent_usd);
}

// The scheduler: one run from brief to EDL. Pilots execute with bounded
// parallelism; every stage checkpoints through the journal so a crashed or
// cancelled run resumes without re-spending.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use showreel_budget::BudgetTracker;
use showreel_edl::{AssemblyPlanner, FfmpegAssembler, PlannerConfig, SceneCut};
use showreel_journal::{RunJournal, RunRecord, RunStatus};
use showreel_memory::{LearningsManager, NamespaceLevel};
use showreel_pipeline::{
    FigureGraph, HeuristicScriptPlanner, PilotRunOutcome, ScenePipeline, ScenePipelineConfig,
    SceneStatus, ScriptPlanner,
};
use showreel_providers::{ImageProvider, JobSupervisor, ProviderRegistry, StorageProvider};
use showreel_types::{
    Brief, MediaAsset, MediaKind, Pilot, PilotStatus, ProductionError, ProductionResult,
    ProductionTier, RunStage, Scene,
};

use crate::evaluator::{evaluate_pilot, rank_pilots, PilotEvaluation, RankedPilot};
use crate::planner::plan_pilots;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_pilots: usize,
    pub reserve_fraction: f64,
    /// When an approved pilot reaches this score, remaining pilots are
    /// cancelled to save budget.
    pub early_termination_score: Option<f64>,
    pub max_edit_candidates: usize,
    pub pipeline: ScenePipelineConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pilots: 2,
            reserve_fraction: 0.1,
            early_termination_score: None,
            max_edit_candidates: 3,
            pipeline: ScenePipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub winning_pilot_id: Option<String>,
    pub edl_path: Option<String>,
    pub final_video_path: Option<String>,
    pub simulated: bool,
    pub total_spent_usd: f64,
}

struct PilotResult {
    pilot: Pilot,
    outcome: Option<PilotRunOutcome>,
}

pub struct PilotScheduler {
    budget: Arc<BudgetTracker>,
    journal: Arc<RunJournal>,
    registry: Arc<ProviderRegistry>,
    supervisor: JobSupervisor,
    learnings: Option<Arc<LearningsManager>>,
    script: Arc<dyn ScriptPlanner>,
    figures: Option<FigureGraph>,
    config: SchedulerConfig,
}

impl PilotScheduler {
    pub fn new(
        budget: Arc<BudgetTracker>,
        journal: Arc<RunJournal>,
        registry: Arc<ProviderRegistry>,
        supervisor: JobSupervisor,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            budget,
            journal,
            registry,
            supervisor,
            learnings: None,
            script: Arc::new(HeuristicScriptPlanner),
            figures: None,
            config,
        }
    }

    pub fn with_learnings(mut self, learnings: Arc<LearningsManager>) -> Self {
        self.learnings = Some(learnings);
        self
    }

    pub fn with_script_planner(mut self, script: Arc<dyn ScriptPlanner>) -> Self {
        self.script = script;
        self
    }

    pub fn with_figures(mut self, figures: FigureGraph) -> Self {
        self.figures = Some(figures);
        self
    }

    /// Start a fresh run.
    pub async fn produce(
        &self,
        brief: Brief,
        tiers: &[ProductionTier],
        cancel: CancellationToken,
    ) -> ProductionResult<RunReport> {
        let run_id = format!("run_{}", Uuid::new_v4().simple());
        self.journal
            .begin(
                &run_id,
                &brief.concept,
                brief.total_budget_usd,
                brief.audio_tier,
            )
            .await?;
        self.persist_brief(&run_id, &brief).await?;
        self.run_inner(run_id, brief, tiers.to_vec(), cancel).await
    }

    /// Re-enter an existing run. Completed runs are a no-op; otherwise
    /// terminal pilots are kept and unfinished work re-executes against
    /// the remaining balance only.
    pub async fn resume(
        &self,
        run_id: &str,
        cancel: CancellationToken,
    ) -> ProductionResult<RunReport> {
        let record = self
            .journal
            .get(run_id)
            .await?
            .ok_or_else(|| ProductionError::InputInvalid(format!("unknown run `{run_id}`")))?;

        if record.status == RunStatus::Completed {
            tracing::info!(run_id, "run already completed, resume is a no-op");
            return Ok(report_from_record(&record));
        }

        let brief = self.load_brief(run_id).await?;
        let tiers: Vec<ProductionTier> = if record.pilots.is_empty() {
            vec![ProductionTier::Static]
        } else {
            record.pilots.iter().map(|p| p.tier).collect()
        };
        self.run_inner(run_id.to_string(), brief, tiers, cancel)
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        brief: Brief,
        tiers: Vec<ProductionTier>,
        cancel: CancellationToken,
    ) -> ProductionResult<RunReport> {
        match self
            .drive(&run_id, &brief, &tiers, cancel.clone())
            .await
        {
            Ok(report) => Ok(report),
            Err(ProductionError::Cancelled) => {
                self.journal.complete(&run_id, RunStatus::Cancelled).await?;
                Err(ProductionError::Cancelled)
            }
            Err(err) => {
                // Partial artifacts stay on disk for post-mortem.
                self.journal
                    .add_error(&run_id, &format!("run failed [{}]: {err}", err.kind()))
                    .await?;
                self.journal.complete(&run_id, RunStatus::Failed).await?;
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        run_id: &str,
        brief: &Brief,
        tiers: &[ProductionTier],
        cancel: CancellationToken,
    ) -> ProductionResult<RunReport> {
        self.budget
            .open_run_persisted(
                run_id,
                brief.total_budget_usd,
                self.journal.ledger_path(run_id),
            )
            .await?;

        // Pilot plans survive restarts; only plan when the journal has none.
        let record = self
            .journal
            .get(run_id)
            .await?
            .ok_or_else(|| ProductionError::InputInvalid(format!("unknown run `{run_id}`")))?;
        let pilots = if record.pilots.is_empty() {
            self.journal
                .advance(run_id, RunStage::PlanningPilots, json!({"tiers": tiers.len()}))
                .await?;
            let pilots = plan_pilots(brief, tiers, self.config.reserve_fraction)?;
            for pilot in &pilots {
                self.journal.add_pilot(run_id, pilot.clone()).await?;
            }
            pilots
        } else {
            record.pilots.clone()
        };

        let style_frame = self.analyze_assets(run_id, brief).await?;

        // One scene list per run: the layout contract keeps scripts under
        // `scenes/{scene_id}.json`, shared by every pilot.
        let scenes = self.load_or_plan_scenes(run_id, brief, &pilots[0]).await?;

        self.journal
            .advance(
                run_id,
                RunStage::GeneratingVideo,
                json!({"pilots": pilots.len(), "scenes": scenes.len()}),
            )
            .await?;

        let results = self
            .run_pilots(run_id, brief, pilots, &scenes, style_frame, cancel.clone())
            .await?;
        if cancel.is_cancelled() {
            return Err(ProductionError::Cancelled);
        }

        self.journal
            .advance(run_id, RunStage::Evaluating, serde_json::Value::Null)
            .await?;

        let ranking = rank_pilots(
            results
                .iter()
                .map(|r| RankedPilot {
                    pilot_id: r.pilot.pilot_id.clone(),
                    approved: r.pilot.status == PilotStatus::Approved,
                    critic_score: r.pilot.critic_score.unwrap_or(0.0),
                    avg_qa_score: r.pilot.avg_qa_score.unwrap_or(0.0),
                    spent_usd: r.pilot.spent_usd,
                })
                .collect(),
        );

        let winner = ranking.first().filter(|r| r.approved).cloned();
        let Some(winner) = winner else {
            return Err(ProductionError::ProviderPermanent(
                "no pilot was approved".to_string(),
            ));
        };
        self.journal
            .set_winning_pilot(run_id, &winner.pilot_id)
            .await?;

        let winning = results
            .into_iter()
            .find(|r| r.pilot.pilot_id == winner.pilot_id)
            .ok_or_else(|| {
                ProductionError::ProviderPermanent("winning pilot outcome missing".to_string())
            })?;
        let outcome = winning.outcome.ok_or_else(|| {
            ProductionError::ProviderPermanent("winning pilot has no scene outcomes".to_string())
        })?;

        let edl_path = self.build_edl(run_id, brief, &outcome).await?;

        self.journal
            .advance(run_id, RunStage::Rendering, serde_json::Value::Null)
            .await?;
        let final_video_path = self.render(run_id, &edl_path, &outcome).await?;

        self.journal
            .set_final_paths(run_id, Some(edl_path.clone()), final_video_path.clone())
            .await?;
        self.journal.complete(run_id, RunStatus::Completed).await?;

        let record = self
            .journal
            .get(run_id)
            .await?
            .ok_or_else(|| ProductionError::JournalIo("journal vanished".to_string()))?;
        Ok(RunReport {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
            winning_pilot_id: Some(winner.pilot_id),
            edl_path: Some(edl_path),
            final_video_path,
            simulated: record.is_simulated(),
            total_spent_usd: self.budget.committed(run_id).await,
        })
    }

    /// Analyze the brief's inputs: seed assets are copied into run storage;
    /// without any, a single concept style frame is generated so seed-image
    /// providers have something to animate.
    async fn analyze_assets(
        &self,
        run_id: &str,
        brief: &Brief,
    ) -> ProductionResult<Option<String>> {
        // A resumed run reuses its recorded style frame rather than paying
        // for a new one.
        if let Some(record) = self.journal.get(run_id).await? {
            if let Some(existing) = record
                .assets
                .iter()
                .find(|a| a.kind == MediaKind::Image)
                .and_then(|a| a.remote_url.clone())
            {
                return Ok(Some(existing));
            }
        }

        self.journal
            .advance(
                run_id,
                RunStage::AnalyzingAssets,
                json!({"seed_assets": brief.seed_assets.len()}),
            )
            .await?;

        if !brief.seed_assets.is_empty() {
            let storage = self.registry.storage();
            for seed in &brief.seed_assets {
                let source = Path::new(&seed.path);
                if !source.is_file() {
                    self.journal
                        .add_warning(run_id, &format!("seed asset `{}` not found", seed.path))
                        .await?;
                    continue;
                }
                let remote = format!("runs/{run_id}/seeds/{}", seed.asset_id);
                let stored = storage.upload(source, &remote).await?;
                tracing::debug!(
                    asset_id = %seed.asset_id,
                    path = stored.file_path.as_deref().unwrap_or(""),
                    "seed asset staged"
                );
            }
            // The first image-role seed doubles as the style frame.
            let frame = brief
                .seed_assets
                .iter()
                .find(|s| Path::new(&s.path).is_file())
                .map(|s| s.path.clone());
            return Ok(frame);
        }

        let image = self.registry.image().await?;
        self.journal
            .set_actual_provider(run_id, "image", &image.name)
            .await?;

        let options = std::collections::BTreeMap::new();
        let size = "1792x1024";
        let estimate = image.provider.estimate_cost(size, &options);
        let reservation = self
            .budget
            .reserve(run_id, None, "image", estimate)
            .await?;

        let prompt = format!(
            "A single clean establishing frame for: {}. Professional, centered composition.",
            brief.concept
        );
        let result = match image.provider.generate(&prompt, size, &options).await {
            Ok(result) => result,
            Err(err) => {
                self.budget.release(&reservation).await?;
                self.journal
                    .add_warning(run_id, &format!("style frame generation failed: {err}"))
                    .await?;
                return Ok(None);
            }
        };

        let mut asset = MediaAsset::new(MediaKind::Image, &image.name);
        asset.remote_url = result.url.clone();
        asset.cost_usd = result.cost_usd;
        let asset_id = asset.asset_id.clone();
        self.journal.add_asset(run_id, asset).await?;
        self.budget
            .commit(&reservation, result.cost_usd, Some(&asset_id))
            .await?;

        Ok(result.url)
    }

    /// Bounded-parallel pilot execution. Over-budget rejects the pilot but
    /// not the run; a terminal pilot status in the journal is never re-run.
    #[allow(clippy::too_many_arguments)]
    async fn run_pilots(
        &self,
        run_id: &str,
        brief: &Brief,
        pilots: Vec<Pilot>,
        scenes: &[Scene],
        style_frame: Option<String>,
        cancel: CancellationToken,
    ) -> ProductionResult<Vec<PilotResult>> {
        let pool = Arc::new(Semaphore::new(self.config.max_concurrent_pilots.max(1)));
        let early_stop = CancellationToken::new();
        let mut set: JoinSet<ProductionResult<PilotResult>> = JoinSet::new();

        for pilot in pilots {
            let pool = pool.clone();
            let cancel = cancel.clone();
            let early_stop = early_stop.clone();
            let run_id = run_id.to_string();
            let brief = brief.clone();
            let scenes = scenes.to_vec();
            let style_frame = style_frame.clone();
            let this = self.clone_handles();
            let early_threshold = self.config.early_termination_score;

            set.spawn(async move {
                let _permit = pool
                    .acquire()
                    .await
                    .map_err(|_| ProductionError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(ProductionError::Cancelled);
                }
                if early_stop.is_cancelled() {
                    return this.skip_pilot(&run_id, pilot, "early termination").await;
                }

                let result = this
                    .run_single_pilot(&run_id, &brief, pilot, scenes, style_frame, &cancel)
                    .await?;
                if let Some(threshold) = early_threshold {
                    if result.pilot.status == PilotStatus::Approved
                        && result.pilot.critic_score.unwrap_or(0.0) >= threshold
                    {
                        early_stop.cancel();
                    }
                }
                Ok(result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            let result = joined
                .map_err(|e| ProductionError::ProviderTransient(format!("pilot task: {e}")))?;
            match result {
                Ok(result) => results.push(result),
                Err(ProductionError::Cancelled) => {
                    cancel.cancel();
                    set.abort_all();
                    return Err(ProductionError::Cancelled);
                }
                Err(err) => {
                    set.abort_all();
                    return Err(err);
                }
            }
        }
        Ok(results)
    }

    async fn run_single_pilot(
        &self,
        run_id: &str,
        brief: &Brief,
        mut pilot: Pilot,
        scenes: Vec<Scene>,
        style_frame: Option<String>,
        cancel: &CancellationToken,
    ) -> ProductionResult<PilotResult> {
        // A terminal status in the journal means this pilot already ran to
        // completion in a previous process.
        if pilot.status.is_terminal() {
            tracing::info!(pilot_id = %pilot.pilot_id, status = %pilot.status, "skipping terminal pilot");
            let outcome = if pilot.status == PilotStatus::Approved {
                self.reconstruct_outcome(run_id, &pilot).await?
            } else {
                None
            };
            return Ok(PilotResult { pilot, outcome });
        }

        pilot.status = PilotStatus::Running;
        self.journal.update_pilot(run_id, pilot.clone()).await?;

        let mut pipeline = ScenePipeline::new(
            self.budget.clone(),
            self.journal.clone(),
            self.registry.clone(),
            self.supervisor.clone(),
            self.config.pipeline.clone(),
        );
        if let Some(learnings) = &self.learnings {
            pipeline = pipeline.with_learnings(learnings.clone());
        }
        if let Some(figures) = &self.figures {
            pipeline = pipeline.with_figures(figures.clone());
        }
        if let Some(frame) = style_frame {
            pipeline = pipeline.with_style_frame(frame);
        }

        let outcome = match pipeline
            .run(run_id, brief, &pilot, scenes, cancel.child_token())
            .await
        {
            Ok(outcome) => outcome,
            Err(ProductionError::OverBudget {
                requested,
                remaining,
            }) => {
                pilot.status = PilotStatus::Rejected;
                pilot.rejection_reason = Some(format!(
                    "budget: needed ${requested:.2}, ${remaining:.2} available"
                ));
                self.journal.update_pilot(run_id, pilot.clone()).await?;
                self.journal
                    .add_warning(
                        run_id,
                        &format!(
                            "pilot `{}` rejected over budget (needed ${requested:.2})",
                            pilot.pilot_id
                        ),
                    )
                    .await?;
                return Ok(PilotResult {
                    pilot,
                    outcome: None,
                });
            }
            Err(ProductionError::Cancelled) => {
                pilot.status = PilotStatus::Cancelled;
                self.journal.update_pilot(run_id, pilot.clone()).await?;
                return Err(ProductionError::Cancelled);
            }
            Err(err) => return Err(err),
        };

        let evaluation = evaluate_pilot(brief, &pilot, &outcome);
        pilot.status = if evaluation.approved {
            PilotStatus::Approved
        } else {
            PilotStatus::Rejected
        };
        if !evaluation.approved {
            pilot.rejection_reason = Some(evaluation.reasoning.clone());
        }
        pilot.spent_usd = outcome.spent_usd;
        pilot.critic_score = Some(evaluation.critic_score);
        pilot.avg_qa_score = Some(evaluation.avg_qa_score);
        self.journal.update_pilot(run_id, pilot.clone()).await?;

        self.record_learning(&pilot, &outcome, &evaluation).await;

        Ok(PilotResult {
            pilot,
            outcome: Some(outcome),
        })
    }

    async fn skip_pilot(
        &self,
        run_id: &str,
        mut pilot: Pilot,
        reason: &str,
    ) -> ProductionResult<PilotResult> {
        pilot.status = PilotStatus::Cancelled;
        pilot.rejection_reason = Some(reason.to_string());
        self.journal.update_pilot(run_id, pilot.clone()).await?;
        Ok(PilotResult {
            pilot,
            outcome: None,
        })
    }

    /// Record what the evaluation learned about the provider; validation
    /// feeds the promotion machinery.
    async fn record_learning(
        &self,
        pilot: &Pilot,
        outcome: &PilotRunOutcome,
        evaluation: &PilotEvaluation,
    ) {
        let Some(manager) = &self.learnings else {
            return;
        };
        let ctx = manager.context(None);
        let content = json!({
            "provider": outcome.video_provider,
            "tier": pilot.tier,
            "approved": evaluation.approved,
            "critic_score": evaluation.critic_score,
            "avg_qa_score": evaluation.avg_qa_score,
            "pattern": format!(
                "{} pilots at tier {} {}",
                outcome.video_provider,
                pilot.tier,
                if evaluation.approved { "deliver" } else { "struggle" }
            ),
        });

        let stored = manager
            .store_provider_learning(
                &outcome.video_provider,
                content,
                NamespaceLevel::User,
                &ctx,
                None,
                Vec::new(),
            )
            .await;

        match stored {
            Ok(record_id) => {
                let namespace = format!(
                    "/org/{}/actor/{}/learnings/provider/{}",
                    ctx.org_id, ctx.actor_id, outcome.video_provider
                );
                if let Err(err) = manager
                    .validate_learning(&namespace, &record_id, evaluation.approved, &ctx)
                    .await
                {
                    tracing::debug!(%err, "learning validation failed");
                }
            }
            Err(err) => tracing::debug!(%err, "could not record provider learning"),
        }
    }

    async fn load_or_plan_scenes(
        &self,
        run_id: &str,
        brief: &Brief,
        pilot: &Pilot,
    ) -> ProductionResult<Vec<Scene>> {
        let existing = self.load_scenes(run_id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        self.journal
            .advance(
                run_id,
                RunStage::GeneratingScripts,
                json!({"seed_pilot": pilot.pilot_id}),
            )
            .await?;
        let scenes = self.script.plan_scenes(brief, pilot).await?;

        let scenes_dir = self.journal.scenes_dir(run_id);
        for scene in &scenes {
            let path = scenes_dir.join(format!("{}.json", scene.scene_id));
            let raw = serde_json::to_vec_pretty(scene)
                .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
            tokio::fs::write(&path, raw)
                .await
                .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        }
        Ok(scenes)
    }

    async fn load_scenes(&self, run_id: &str) -> ProductionResult<Vec<Scene>> {
        let scenes_dir = self.journal.scenes_dir(run_id);
        if !scenes_dir.exists() {
            return Ok(Vec::new());
        }
        let mut scenes = Vec::new();
        let mut entries = tokio::fs::read_dir(&scenes_dir)
            .await
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?
        {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read_to_string(entry.path())
                .await
                .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
            match serde_json::from_str::<Scene>(&raw) {
                Ok(scene) => scenes.push(scene),
                Err(err) => tracing::warn!(path = %entry.path().display(), %err, "bad scene file"),
            }
        }
        scenes.sort_by_key(|s| s.ordinal);
        Ok(scenes)
    }

    /// Rebuild an approved pilot's outcome from the journal: winners are
    /// the highest-scoring downloaded video per scene.
    async fn reconstruct_outcome(
        &self,
        run_id: &str,
        pilot: &Pilot,
    ) -> ProductionResult<Option<PilotRunOutcome>> {
        let Some(record) = self.journal.get(run_id).await? else {
            return Ok(None);
        };
        let scenes = self.load_scenes(run_id).await?;
        if scenes.is_empty() {
            return Ok(None);
        }

        let mut outcomes = Vec::new();
        for scene in scenes {
            let mut variations: Vec<MediaAsset> = record
                .assets
                .iter()
                .filter(|a| {
                    a.kind == MediaKind::Video
                        && a.scene_id.as_deref() == Some(scene.scene_id.as_str())
                        && a.local_path
                            .as_deref()
                            .map(|p| Path::new(p).is_file())
                            .unwrap_or(false)
                })
                .cloned()
                .collect();
            variations.sort_by(|a, b| {
                b.quality_score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.quality_score.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let winner = variations.first().cloned().map(|asset| (asset, 0u32));
            outcomes.push(showreel_pipeline::SceneOutcome {
                status: if winner.is_some() {
                    SceneStatus::Completed
                } else {
                    SceneStatus::Failed("no downloaded variation on disk".to_string())
                },
                scene,
                winner,
                variations,
            });
        }

        let audio_tracks = record
            .assets
            .iter()
            .filter(|a| a.kind == MediaKind::Audio && a.local_path.is_some())
            .map(|a| {
                showreel_pipeline::audio::voiceover_track(
                    a.local_path.clone().unwrap_or_default(),
                    a.scene_id.as_deref().unwrap_or(""),
                    0.0,
                    a.duration_sec.unwrap_or(0.0),
                )
            })
            .collect();

        Ok(Some(PilotRunOutcome {
            pilot_id: pilot.pilot_id.clone(),
            outcomes,
            audio_tracks,
            spent_usd: pilot.spent_usd,
            video_provider: record
                .actual_providers
                .get("video")
                .cloned()
                .unwrap_or_default(),
            audio_provider: record.actual_providers.get("audio").cloned(),
            simulated: record.is_simulated(),
        }))
    }

    async fn build_edl(
        &self,
        run_id: &str,
        brief: &Brief,
        outcome: &PilotRunOutcome,
    ) -> ProductionResult<String> {
        self.journal
            .advance(run_id, RunStage::Editing, serde_json::Value::Null)
            .await?;

        let cuts: Vec<SceneCut> = outcome
            .outcomes
            .iter()
            .filter_map(|o| {
                o.winner.as_ref().map(|(asset, variation)| SceneCut {
                    scene: o.scene.clone(),
                    asset: asset.clone(),
                    variation_index: *variation,
                })
            })
            .collect();

        let planner = AssemblyPlanner::new(PlannerConfig {
            max_candidates: self.config.max_edit_candidates,
            ..PlannerConfig::default()
        });
        let mut audio_tracks = outcome.audio_tracks.clone();
        planner.apply_ducking(&mut audio_tracks);

        let project_name = if brief.project_name.is_empty() {
            brief.concept.clone()
        } else {
            brief.project_name.clone()
        };
        let edl = planner.plan(&project_name, &cuts, &audio_tracks);

        let edl_dir = self.journal.edl_dir(run_id);
        let edl_path = edl_dir.join("edit_candidates.json");
        let raw = edl
            .to_json()
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        tokio::fs::write(&edl_path, &raw)
            .await
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        for candidate in &edl.candidates {
            let candidate_path = edl_dir.join(format!("{}.json", candidate.candidate_id));
            let raw = serde_json::to_string_pretty(candidate)
                .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
            tokio::fs::write(&candidate_path, raw)
                .await
                .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        }

        Ok(edl_path.display().to_string())
    }

    /// Invoke the external assembler on the recommended candidate. Missing
    /// assembler or simulated media is non-fatal: the run keeps its EDL.
    async fn render(
        &self,
        run_id: &str,
        edl_path: &str,
        outcome: &PilotRunOutcome,
    ) -> ProductionResult<Option<String>> {
        if outcome.simulated {
            self.journal
                .add_warning(run_id, "simulated providers, skipping final render")
                .await?;
            return Ok(None);
        }

        let raw = tokio::fs::read_to_string(edl_path)
            .await
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        let edl = showreel_edl::EditDecisionList::from_json(&raw)
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        let Some(candidate_id) = edl.recommended_candidate_id.clone() else {
            self.journal
                .add_warning(run_id, "no recommended candidate, skipping render")
                .await?;
            return Ok(None);
        };

        let assembler = FfmpegAssembler::new(self.journal.renders_dir(run_id));
        let status = assembler.check_installed().await;
        if !status.installed {
            self.journal
                .add_warning(run_id, "assembler (ffmpeg) not installed, skipping render")
                .await?;
            return Ok(None);
        }

        let result = assembler
            .render(&edl, &candidate_id, &outcome.audio_tracks, run_id)
            .await?;
        if result.success {
            Ok(result.output_path)
        } else {
            self.journal
                .add_warning(
                    run_id,
                    &format!(
                        "render failed: {}",
                        result.error.unwrap_or_else(|| "unknown".to_string())
                    ),
                )
                .await?;
            Ok(None)
        }
    }

    async fn persist_brief(&self, run_id: &str, brief: &Brief) -> ProductionResult<()> {
        let path = self.journal.run_dir(run_id).join("brief.json");
        let raw = serde_json::to_vec_pretty(brief)
            .map_err(|e| ProductionError::JournalIo(e.to_string()))?;
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| ProductionError::JournalIo(e.to_string()))
    }

    async fn load_brief(&self, run_id: &str) -> ProductionResult<Brief> {
        let path = self.journal.run_dir(run_id).join("brief.json");
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProductionError::JournalIo(format!("brief.json: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| ProductionError::JournalIo(e.to_string()))
    }

    fn clone_handles(&self) -> PilotScheduler {
        PilotScheduler {
            budget: self.budget.clone(),
            journal: self.journal.clone(),
            registry: self.registry.clone(),
            supervisor: self.supervisor.clone(),
            learnings: self.learnings.clone(),
            script: self.script.clone(),
            figures: self.figures.clone(),
            config: self.config.clone(),
        }
    }
}

fn report_from_record(record: &RunRecord) -> RunReport {
    RunReport {
        run_id: record.run_id.clone(),
        status: record.status,
        winning_pilot_id: record.winning_pilot_id.clone(),
        edl_path: record.edl_path.clone(),
        final_video_path: record.final_video_path.clone(),
        simulated: record.is_simulated(),
        total_spent_usd: record
            .pilots
            .iter()
            .filter(|p| p.status == PilotStatus::Approved)
            .map(|p| p.spent_usd)
            .sum(),
    }
}

// Per-pilot scene fan-out: reserve, submit, poll, download, score, select.
// Scenes run in parallel under a bounded pool; audio runs concurrently in
// its own pool with its own reservations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use showreel_budget::BudgetTracker;
use showreel_edl::AudioTrack;
use showreel_journal::RunJournal;
use showreel_memory::LearningsManager;
use showreel_providers::{
    with_retries, AudioProvider, GenerateOutcome, JobSupervisor, MusicProvider, ProviderRegistry,
    ResolvedAudio, ResolvedVideo, RetryPolicy, VideoProvider, VideoRequest,
};
use showreel_types::{
    Brief, MediaAsset, MediaKind, Pilot, ProductionError, ProductionResult, Scene,
};

use crate::audio::{music_track, scene_offsets, voiceover_track, AudioConfig};
use crate::figures::{FigureGraph, SceneFigureIndex};
use crate::prompt::PromptBuilder;
use crate::qa::{score_variation, VisionAnalyzer};

const BALANCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ScenePipelineConfig {
    pub max_parallel_scenes: usize,
    pub max_parallel_audio: usize,
    pub audio: AudioConfig,
}

impl Default for ScenePipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_scenes: 3,
            max_parallel_audio: 2,
            audio: AudioConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneStatus {
    Completed,
    Failed(String),
}

/// Result for one scene: the winning variation plus every rejected one,
/// kept for audit.
#[derive(Debug, Clone)]
pub struct SceneOutcome {
    pub scene: Scene,
    pub status: SceneStatus,
    pub winner: Option<(MediaAsset, u32)>,
    pub variations: Vec<MediaAsset>,
}

#[derive(Debug, Clone)]
pub struct PilotRunOutcome {
    pub pilot_id: String,
    pub outcomes: Vec<SceneOutcome>,
    pub audio_tracks: Vec<AudioTrack>,
    pub spent_usd: f64,
    pub video_provider: String,
    pub audio_provider: Option<String>,
    pub simulated: bool,
}

impl PilotRunOutcome {
    pub fn completed_scenes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == SceneStatus::Completed)
            .count()
    }

    pub fn avg_qa_score(&self) -> f64 {
        let scores: Vec<f64> = self
            .outcomes
            .iter()
            .filter_map(|o| o.winner.as_ref())
            .filter_map(|(asset, _)| asset.quality_score)
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}

pub struct ScenePipeline {
    budget: Arc<BudgetTracker>,
    journal: Arc<RunJournal>,
    registry: Arc<ProviderRegistry>,
    supervisor: JobSupervisor,
    learnings: Option<Arc<LearningsManager>>,
    figures: Option<FigureGraph>,
    vision: Option<Arc<dyn VisionAnalyzer>>,
    style_frame_url: Option<String>,
    config: ScenePipelineConfig,
}

impl ScenePipeline {
    pub fn new(
        budget: Arc<BudgetTracker>,
        journal: Arc<RunJournal>,
        registry: Arc<ProviderRegistry>,
        supervisor: JobSupervisor,
        config: ScenePipelineConfig,
    ) -> Self {
        Self {
            budget,
            journal,
            registry,
            supervisor,
            learnings: None,
            figures: None,
            vision: None,
            style_frame_url: None,
            config,
        }
    }

    pub fn with_learnings(mut self, learnings: Arc<LearningsManager>) -> Self {
        self.learnings = Some(learnings);
        self
    }

    pub fn with_figures(mut self, figures: FigureGraph) -> Self {
        self.figures = Some(figures);
        self
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionAnalyzer>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Seed image used when a scene has no matched figure of its own.
    pub fn with_style_frame(mut self, url: impl Into<String>) -> Self {
        self.style_frame_url = Some(url.into());
        self
    }

    /// Run one pilot's scenes to completion. Video and audio pools run
    /// concurrently; cancellation propagates to both.
    pub async fn run(
        &self,
        run_id: &str,
        brief: &Brief,
        pilot: &Pilot,
        scenes: Vec<Scene>,
        cancel: CancellationToken,
    ) -> ProductionResult<PilotRunOutcome> {
        let video = self.registry.video().await?;
        self.journal
            .set_actual_provider(run_id, "video", &video.name)
            .await?;

        let learnings = self.retrieve_learnings(&video.name).await;
        let figure_index = self
            .figures
            .as_ref()
            .map(|graph| SceneFigureIndex::build(graph, &scenes))
            .unwrap_or_default();

        // Prompts are assembled up front so spawned tasks own their data.
        let builder = PromptBuilder::new(brief, &learnings);
        let jobs: Vec<SceneJob> = scenes
            .iter()
            .map(|scene| {
                let figure = figure_index.for_scene(&scene.scene_id);
                SceneJob {
                    scene: scene.clone(),
                    prompt: builder.video_prompt(scene, figure),
                    seed_image_url: figure
                        .and_then(|f| f.image_url.clone())
                        .or_else(|| self.style_frame_url.clone()),
                }
            })
            .collect();

        let pilot_spent = Arc::new(Mutex::new(0.0f64));
        let scene_pool = Arc::new(Semaphore::new(
            self.config.max_parallel_scenes.max(1).min(scenes.len().max(1)),
        ));

        let video_work = self.run_video_scenes(
            run_id,
            brief,
            pilot,
            &video,
            jobs,
            scene_pool,
            pilot_spent.clone(),
            cancel.child_token(),
        );
        let audio_work = self.run_audio(run_id, brief, pilot, &scenes, cancel.child_token());

        let (video_result, audio_result) = tokio::join!(video_work, audio_work);
        if cancel.is_cancelled() {
            return Err(ProductionError::Cancelled);
        }
        let outcomes = video_result?;
        let (audio_tracks, audio_provider) = audio_result?;

        let completed = outcomes
            .iter()
            .filter(|o| o.status == SceneStatus::Completed)
            .count() as u32;
        self.journal
            .set_scene_counts(run_id, outcomes.len() as u32, completed)
            .await?;

        let spent = *pilot_spent.lock().await;
        Ok(PilotRunOutcome {
            pilot_id: pilot.pilot_id.clone(),
            outcomes,
            audio_tracks,
            spent_usd: spent,
            simulated: video.is_mock,
            video_provider: video.name,
            audio_provider,
        })
    }

    async fn retrieve_learnings(
        &self,
        provider: &str,
    ) -> Vec<showreel_memory::PrioritizedLearning> {
        let Some(manager) = &self.learnings else {
            return Vec::new();
        };
        let ctx = manager.context(None);
        match manager.provider_learnings(provider, &ctx, false, 10).await {
            Ok(learnings) => learnings,
            Err(err) => {
                tracing::debug!(provider, %err, "learnings unavailable, proceeding unbiased");
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_video_scenes(
        &self,
        run_id: &str,
        brief: &Brief,
        pilot: &Pilot,
        video: &ResolvedVideo,
        jobs: Vec<SceneJob>,
        pool: Arc<Semaphore>,
        pilot_spent: Arc<Mutex<f64>>,
        cancel: CancellationToken,
    ) -> ProductionResult<Vec<SceneOutcome>> {
        let mut set: JoinSet<ProductionResult<SceneOutcome>> = JoinSet::new();

        for job in jobs {
            let ctx = SceneTaskContext {
                run_id: run_id.to_string(),
                pilot: pilot.clone(),
                aspect_ratio: brief.aspect_ratio.clone(),
                video: video.clone(),
                budget: self.budget.clone(),
                journal: self.journal.clone(),
                supervisor: self.supervisor.clone(),
                vision: self.vision.clone(),
                timeout_secs: self.registry.config().timeout_secs,
                max_retries: self.registry.config().max_retries,
                pilot_spent: pilot_spent.clone(),
            };
            let pool = pool.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = pool
                    .acquire()
                    .await
                    .map_err(|_| ProductionError::Cancelled)?;
                run_scene(ctx, job, cancel).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            let result = joined
                .map_err(|e| ProductionError::ProviderTransient(format!("scene task: {e}")))?;
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    // Budget exhaustion and cancellation abort the whole
                    // pilot; everything else became a FAILED scene below.
                    cancel.cancel();
                    set.abort_all();
                    return Err(err);
                }
            }
        }

        outcomes.sort_by_key(|o| o.scene.ordinal);
        Ok(outcomes)
    }

    /// Voiceover and music generation with its own bounded pool and its
    /// own reservations.
    async fn run_audio(
        &self,
        run_id: &str,
        brief: &Brief,
        pilot: &Pilot,
        scenes: &[Scene],
        cancel: CancellationToken,
    ) -> ProductionResult<(Vec<AudioTrack>, Option<String>)> {
        let tier = brief.audio_tier;
        if !tier.wants_voiceover() && !tier.wants_music() {
            return Ok((Vec::new(), None));
        }

        let mut tracks = Vec::new();
        let mut provider_name = None;

        if tier.wants_voiceover() {
            let audio = self.registry.audio().await?;
            self.journal
                .set_actual_provider(run_id, "audio", &audio.name)
                .await?;
            provider_name = Some(audio.name.clone());

            let offsets: std::collections::HashMap<String, f64> =
                scene_offsets(scenes).into_iter().collect();
            let pool = Arc::new(Semaphore::new(self.config.max_parallel_audio.max(1)));
            let mut set: JoinSet<ProductionResult<Option<AudioTrack>>> = JoinSet::new();

            for scene in scenes.iter().filter(|s| s.voiceover_text.is_some()) {
                let ctx = AudioTaskContext {
                    run_id: run_id.to_string(),
                    pilot_id: pilot.pilot_id.clone(),
                    audio: audio.clone(),
                    budget: self.budget.clone(),
                    journal: self.journal.clone(),
                    config: self.config.audio.clone(),
                    max_retries: self.registry.config().max_retries,
                };
                let scene = scene.clone();
                let start_time = offsets.get(&scene.scene_id).copied().unwrap_or(0.0);
                let pool = pool.clone();
                let cancel = cancel.clone();
                set.spawn(async move {
                    let _permit = pool
                        .acquire()
                        .await
                        .map_err(|_| ProductionError::Cancelled)?;
                    if cancel.is_cancelled() {
                        return Err(ProductionError::Cancelled);
                    }
                    run_voiceover(ctx, scene, start_time).await
                });
            }

            while let Some(joined) = set.join_next().await {
                let result = joined
                    .map_err(|e| ProductionError::ProviderTransient(format!("audio task: {e}")))?;
                match result {
                    Ok(Some(track)) => tracks.push(track),
                    Ok(None) => {}
                    Err(ProductionError::Cancelled) => return Err(ProductionError::Cancelled),
                    Err(err) => {
                        // A missing voiceover degrades the cut, it does not
                        // sink the pilot.
                        self.journal
                            .add_warning(run_id, &format!("voiceover generation failed: {err}"))
                            .await?;
                    }
                }
            }
            tracks.sort_by(|a, b| {
                a.start_time
                    .partial_cmp(&b.start_time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        if tier.wants_music() {
            match self.run_music(run_id, brief, pilot).await {
                Ok(Some(track)) => tracks.push(track),
                Ok(None) => {}
                Err(err) => {
                    self.journal
                        .add_warning(run_id, &format!("music generation failed: {err}"))
                        .await?;
                }
            }
        }

        Ok((tracks, provider_name))
    }

    async fn run_music(
        &self,
        run_id: &str,
        brief: &Brief,
        pilot: &Pilot,
    ) -> ProductionResult<Option<AudioTrack>> {
        let music = self.registry.music().await?;
        self.journal
            .set_actual_provider(run_id, "music", &music.name)
            .await?;

        let options = BTreeMap::new();
        let estimate = music
            .provider
            .estimate_cost(brief.target_duration_sec, &options);
        let reservation = self
            .budget
            .reserve(run_id, Some(&pilot.pilot_id), "music", estimate)
            .await?;

        let result = music
            .provider
            .generate(
                &self.config.audio.music_mood,
                brief.target_duration_sec,
                &self.config.audio.music_tempo,
                &options,
            )
            .await;

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                self.budget.release(&reservation).await?;
                return Err(err);
            }
        };

        let path = self.journal.audio_dir(run_id).join("music_bed.mp3");
        if let Some(url) = &result.url {
            if url.starts_with("mock://") {
                tokio::fs::write(&path, format!("MOCK-MUSIC {url}\n"))
                    .await
                    .map_err(|e| ProductionError::ProviderTransient(e.to_string()))?;
            }
        }

        let mut asset = MediaAsset::new(MediaKind::Music, &music.name);
        asset.local_path = path.exists().then(|| path.display().to_string());
        asset.remote_url = result.url.clone();
        asset.duration_sec = Some(result.duration_sec);
        asset.cost_usd = result.cost_usd;
        let asset_id = asset.asset_id.clone();
        self.journal.add_asset(run_id, asset).await?;
        self.budget
            .commit(&reservation, result.cost_usd, Some(&asset_id))
            .await?;

        let track_path = if path.exists() {
            path.display().to_string()
        } else {
            result.url.unwrap_or_default()
        };
        Ok(Some(music_track(track_path, brief.target_duration_sec)))
    }
}

struct SceneJob {
    scene: Scene,
    prompt: String,
    seed_image_url: Option<String>,
}

struct SceneTaskContext {
    run_id: String,
    pilot: Pilot,
    aspect_ratio: String,
    video: ResolvedVideo,
    budget: Arc<BudgetTracker>,
    journal: Arc<RunJournal>,
    supervisor: JobSupervisor,
    vision: Option<Arc<dyn VisionAnalyzer>>,
    timeout_secs: u64,
    max_retries: u32,
    pilot_spent: Arc<Mutex<f64>>,
}

/// Generate, score, and select one scene's variations. Returns a FAILED
/// outcome for provider-permanent trouble; budget and cancellation errors
/// propagate to abort the pilot.
async fn run_scene(
    ctx: SceneTaskContext,
    job: SceneJob,
    cancel: CancellationToken,
) -> ProductionResult<SceneOutcome> {
    if cancel.is_cancelled() {
        return Err(ProductionError::Cancelled);
    }

    let scene = job.scene;
    // The tier's cost model rides along so simulated estimates line up
    // with live planning.
    let mut options = BTreeMap::new();
    options.insert(
        "cost_per_second".to_string(),
        json!(ctx.pilot.tier.cost_per_second()),
    );
    let per_variation = ctx
        .video
        .provider
        .estimate_cost(scene.target_duration_sec, &options);
    let batch = per_variation * ctx.pilot.variations_per_scene.max(1) as f64;

    // Pilot allocation gate before the run-level reservation.
    {
        let spent = ctx.pilot_spent.lock().await;
        let remaining = ctx.pilot.allocated_budget_usd - *spent;
        if batch > remaining + BALANCE_EPSILON {
            return Err(ProductionError::OverBudget {
                requested: batch,
                remaining: remaining.max(0.0),
            });
        }
    }

    let reservation = ctx
        .budget
        .reserve(&ctx.run_id, Some(&ctx.pilot.pilot_id), "video", batch)
        .await?;

    let mut variations: Vec<MediaAsset> = Vec::new();
    let mut last_failure: Option<String> = None;

    for index in 0..ctx.pilot.variations_per_scene.max(1) {
        if cancel.is_cancelled() {
            ctx.budget.release(&reservation).await?;
            return Err(ProductionError::Cancelled);
        }

        match generate_variation(
            &ctx,
            &scene,
            &job.prompt,
            &job.seed_image_url,
            &options,
            index,
            &cancel,
        )
        .await
        {
            Ok(asset) => variations.push(asset),
            Err(ProductionError::Cancelled) => {
                ctx.budget.release(&reservation).await?;
                return Err(ProductionError::Cancelled);
            }
            Err(err @ ProductionError::OverBudget { .. }) => {
                ctx.budget.release(&reservation).await?;
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    scene_id = %scene.scene_id,
                    variation = index,
                    error = %err,
                    "variation failed"
                );
                last_failure = Some(err.to_string());
            }
        }
    }

    if variations.is_empty() {
        ctx.budget.release(&reservation).await?;
        let reason = last_failure.unwrap_or_else(|| "no variation produced".to_string());
        ctx.journal
            .add_error(
                &ctx.run_id,
                &format!("scene `{}` failed: {reason}", scene.scene_id),
            )
            .await?;
        return Ok(SceneOutcome {
            scene,
            status: SceneStatus::Failed(reason),
            winner: None,
            variations: Vec::new(),
        });
    }

    // QA-score every variation that made it to disk.
    for asset in variations.iter_mut() {
        let analysis = match &ctx.vision {
            Some(vision) => vision.analyze(&scene, asset).await,
            None => None,
        };
        let score = score_variation(&scene, asset, analysis.as_ref());
        asset.quality_score = Some(score.overall());
    }

    let actual_total: f64 = variations.iter().map(|a| a.cost_usd).sum();
    for asset in &variations {
        ctx.journal.add_asset(&ctx.run_id, asset.clone()).await?;
    }

    // Winner: highest score above the tier threshold, ties by lowest cost.
    let threshold = ctx.pilot.tier.pass_threshold();
    let winner = variations
        .iter()
        .enumerate()
        .filter(|(_, a)| a.quality_score.unwrap_or(0.0) >= threshold)
        .max_by(|(_, a), (_, b)| {
            let score_a = a.quality_score.unwrap_or(0.0);
            let score_b = b.quality_score.unwrap_or(0.0);
            score_a
                .partial_cmp(&score_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.cost_usd
                        .partial_cmp(&a.cost_usd)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        })
        .map(|(index, asset)| (asset.clone(), index as u32));

    let winner_id = winner.as_ref().map(|(asset, _)| asset.asset_id.clone());
    ctx.budget
        .commit(&reservation, actual_total, winner_id.as_deref())
        .await?;
    *ctx.pilot_spent.lock().await += actual_total;

    match winner {
        Some(winner) => Ok(SceneOutcome {
            scene,
            status: SceneStatus::Completed,
            winner: Some(winner),
            variations,
        }),
        None => {
            let best = variations
                .iter()
                .filter_map(|a| a.quality_score)
                .fold(0.0f64, f64::max);
            let reason = format!("no variation reached the pass threshold ({best:.1} < {threshold:.1})");
            ctx.journal
                .add_error(
                    &ctx.run_id,
                    &format!("scene `{}` failed: {reason}", scene.scene_id),
                )
                .await?;
            Ok(SceneOutcome {
                scene,
                status: SceneStatus::Failed(reason),
                winner: None,
                variations,
            })
        }
    }
}

async fn generate_variation(
    ctx: &SceneTaskContext,
    scene: &Scene,
    prompt: &str,
    seed_image_url: &Option<String>,
    options: &BTreeMap<String, serde_json::Value>,
    index: u32,
    cancel: &CancellationToken,
) -> ProductionResult<MediaAsset> {
    let request = VideoRequest {
        prompt: prompt.to_string(),
        duration_sec: scene.target_duration_sec,
        aspect_ratio: ctx.aspect_ratio.clone(),
        seed_image_url: seed_image_url.clone(),
        options: options.clone(),
    };

    let policy = RetryPolicy {
        max_retries: ctx.max_retries,
        ..RetryPolicy::default()
    };
    let label = format!("{}_v{index}", scene.scene_id);

    let provider = ctx.video.provider.clone();
    let outcome = with_retries(policy, &label, || {
        let provider = provider.clone();
        let request = request.clone();
        async move { provider.generate(&request).await }
    })
    .await?;

    let (url, duration_sec, cost_usd, mut metadata) = match outcome {
        GenerateOutcome::Succeeded(media) => (
            media.url,
            media.duration_sec,
            media.cost_usd,
            media.metadata,
        ),
        GenerateOutcome::Pending(handle) => {
            let url = ctx
                .supervisor
                .watch(
                    provider.clone(),
                    handle.clone(),
                    std::time::Duration::from_secs(ctx.timeout_secs),
                    cancel.clone(),
                )
                .await?;
            (
                url,
                handle.expected_duration_sec,
                handle.estimated_cost_usd,
                BTreeMap::new(),
            )
        }
        GenerateOutcome::Failed(reason) => {
            return Err(ProductionError::ProviderPermanent(reason));
        }
    };

    let local_path = ctx
        .journal
        .videos_dir(&ctx.run_id)
        .join(format!("{}_v{index}.mp4", scene.scene_id));
    ctx.video.provider.download(&url, &local_path).await?;

    metadata.insert("prompt".to_string(), json!(prompt));
    metadata.insert("variation".to_string(), json!(index));
    let mut asset = MediaAsset::for_scene(MediaKind::Video, &ctx.video.name, &scene.scene_id);
    asset.local_path = Some(local_path.display().to_string());
    asset.remote_url = Some(url);
    asset.duration_sec = Some(duration_sec);
    asset.cost_usd = cost_usd;
    asset.metadata = metadata;
    Ok(asset)
}

struct AudioTaskContext {
    run_id: String,
    pilot_id: String,
    audio: ResolvedAudio,
    budget: Arc<BudgetTracker>,
    journal: Arc<RunJournal>,
    config: AudioConfig,
    max_retries: u32,
}

async fn run_voiceover(
    ctx: AudioTaskContext,
    scene: Scene,
    start_time: f64,
) -> ProductionResult<Option<AudioTrack>> {
    let Some(text) = scene.voiceover_text.clone() else {
        return Ok(None);
    };

    let options = BTreeMap::new();
    let estimate = ctx.audio.provider.estimate_cost(&text, &options);
    let reservation = ctx
        .budget
        .reserve(&ctx.run_id, Some(&ctx.pilot_id), "audio", estimate)
        .await?;

    let policy = RetryPolicy {
        max_retries: ctx.max_retries,
        ..RetryPolicy::default()
    };
    let request = showreel_providers::AudioRequest {
        text,
        voice_id: ctx.config.voice_id.clone(),
        speed: ctx.config.speed,
        options,
    };

    let provider = ctx.audio.provider.clone();
    let result = with_retries(policy, &format!("{}_vo", scene.scene_id), || {
        let provider = provider.clone();
        let request = request.clone();
        async move { provider.synthesize(&request).await }
    })
    .await;

    let result = match result {
        Ok(result) => result,
        Err(err) => {
            ctx.budget.release(&reservation).await?;
            return Err(err);
        }
    };

    let path = ctx
        .journal
        .audio_dir(&ctx.run_id)
        .join(format!("{}_vo.{}", scene.scene_id, result.format));
    if let Some(bytes) = &result.bytes {
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ProductionError::ProviderTransient(e.to_string()))?;
    }

    let mut asset = MediaAsset::for_scene(MediaKind::Audio, &ctx.audio.name, &scene.scene_id);
    asset.local_path = Some(path.display().to_string());
    asset.duration_sec = Some(result.duration_sec);
    asset.cost_usd = result.cost_usd;
    asset.metadata.insert(
        "sync_tolerance_sec".to_string(),
        json!(ctx.config.sync_profile.tolerance_sec()),
    );
    let asset_id = asset.asset_id.clone();
    ctx.journal.add_asset(&ctx.run_id, asset).await?;
    ctx.budget
        .commit(&reservation, result.cost_usd, Some(&asset_id))
        .await?;

    Ok(Some(voiceover_track(
        path.display().to_string(),
        &scene.scene_id,
        start_time,
        result.duration_sec,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use showreel_providers::RegistryConfig;
    use showreel_types::{AudioTier, PilotStatus, ProductionTier};

    async fn fixture(
        budget_usd: f64,
    ) -> (
        ScenePipeline,
        Arc<BudgetTracker>,
        Arc<RunJournal>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(RunJournal::new(dir.path()));
        let budget = Arc::new(BudgetTracker::new());
        budget.open_run("run-1", budget_usd).await;

        let registry = Arc::new(ProviderRegistry::new(RegistryConfig {
            mock_mode: true,
            ..RegistryConfig::default()
        }));
        let supervisor = JobSupervisor::start_with(
            std::time::Duration::from_millis(1),
            std::time::Duration::from_millis(4),
        );
        let pipeline = ScenePipeline::new(
            budget.clone(),
            journal.clone(),
            registry,
            supervisor,
            ScenePipelineConfig::default(),
        );
        (pipeline, budget, journal, dir)
    }

    fn pilot(tier: ProductionTier, allocation: f64) -> Pilot {
        let mut pilot = Pilot::new(tier, allocation);
        pilot.status = PilotStatus::Running;
        pilot
    }

    #[tokio::test]
    async fn mock_run_produces_winner_on_disk_with_zero_debits() {
        let (pipeline, budget, journal, _dir) = fixture(2.0).await;
        let mut brief = Brief::new("Logo reveal", 5.0, 2.0);
        brief.audio_tier = AudioTier::None;
        journal
            .begin("run-1", &brief.concept, 2.0, brief.audio_tier)
            .await
            .unwrap();

        let pilot = pilot(ProductionTier::Static, 1.8);
        let scenes = vec![Scene::new(0, "logo", 5.0)];
        let outcome = pipeline
            .run("run-1", &brief, &pilot, scenes, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.completed_scenes(), 1);
        assert!(outcome.simulated);
        assert_eq!(outcome.video_provider, "mock");

        let (winner, variation) = outcome.outcomes[0].winner.clone().unwrap();
        assert_eq!(variation, 0);
        let path = winner.local_path.unwrap();
        assert!(path.ends_with("scene_000_v0.mp4"));
        assert!(std::path::Path::new(&path).is_file());

        // Simulated runs never debit the ledger.
        assert_eq!(budget.committed("run-1").await, 0.0);
        assert!(budget.entries("run-1").await.is_empty());
    }

    #[tokio::test]
    async fn starved_allocation_fails_over_budget_on_first_reservation() {
        let (pipeline, _budget, journal, _dir) = fixture(1.0).await;
        let mut brief = Brief::new("Product demo", 30.0, 1.0);
        brief.audio_tier = AudioTier::None;
        journal
            .begin("run-1", &brief.concept, 1.0, brief.audio_tier)
            .await
            .unwrap();

        // Animated needs 2 variations x 7.5s x $0.08/s per scene batch;
        // an allocation below that denies the first reservation.
        let pilot = pilot(ProductionTier::Animated, 0.5);
        let scenes = vec![Scene::new(0, "demo", 7.5), Scene::new(1, "demo", 7.5)];
        let err = pipeline
            .run("run-1", &brief, &pilot, scenes, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProductionError::OverBudget { .. }));
    }

    #[tokio::test]
    async fn voiceover_scenes_produce_positioned_tracks() {
        let (pipeline, budget, journal, _dir) = fixture(5.0).await;
        let mut brief = Brief::new("Two part story", 10.0, 5.0);
        brief.audio_tier = AudioTier::SimpleOverlay;
        journal
            .begin("run-1", &brief.concept, 5.0, brief.audio_tier)
            .await
            .unwrap();

        let pilot = pilot(ProductionTier::Static, 4.0);
        let mut first = Scene::new(0, "part one", 5.0);
        first.voiceover_text = Some("Part one.".to_string());
        let mut second = Scene::new(1, "part two", 5.0);
        second.voiceover_text = Some("Part two.".to_string());

        let outcome = pipeline
            .run(
                "run-1",
                &brief,
                &pilot,
                vec![first, second],
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.audio_tracks.len(), 2);
        assert_eq!(outcome.audio_tracks[0].start_time, 0.0);
        assert_eq!(outcome.audio_tracks[1].start_time, 5.0);
        assert_eq!(outcome.audio_provider.as_deref(), Some("mock"));
        for track in &outcome.audio_tracks {
            assert!(std::path::Path::new(&track.path).is_file());
        }
        assert_eq!(budget.committed("run-1").await, 0.0);
    }

    #[tokio::test]
    async fn cancellation_surfaces_cancelled() {
        let (pipeline, _budget, journal, _dir) = fixture(2.0).await;
        let brief = Brief::new("Logo reveal", 5.0, 2.0);
        journal
            .begin("run-1", &brief.concept, 2.0, brief.audio_tier)
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline
            .run(
                "run-1",
                &brief,
                &pilot(ProductionTier::Static, 1.0),
                vec![Scene::new(0, "logo", 5.0)],
                cancel,
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProductionError::Cancelled));
    }
}

// Run Journal
// Per-run append-only state on disk: timeline events with monotonic
// sequence numbers, pilots, assets, and resumption checkpoints. The journal
// file is the source of truth; media files are referenced by relative path.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;

use showreel_types::{
    AudioTier, MediaAsset, Pilot, PilotStatus, ProductionError, ProductionResult, RunStage,
};

pub const JOURNAL_FILE: &str = "memory.json";
pub const METADATA_FILE: &str = "metadata.json";

/// One entry in the run timeline. Sequence numbers are monotonic per run
/// with no gaps; `finished_at` is stamped when the next stage begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub seq: u64,
    pub stage: RunStage,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal status of a run as recorded in the journal head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// The whole journal document for one run: head (mutated in place) plus the
/// append-only timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub concept: String,
    pub budget_total_usd: f64,
    pub audio_tier: AudioTier,
    pub status: RunStatus,

    pub current_stage: RunStage,
    pub progress_percent: f64,

    #[serde(default)]
    pub pilots: Vec<Pilot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_pilot_id: Option<String>,

    #[serde(default)]
    pub total_scenes: u32,
    #[serde(default)]
    pub scenes_completed: u32,

    #[serde(default)]
    pub assets: Vec<MediaAsset>,

    #[serde(default)]
    pub timeline: Vec<StageEvent>,

    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Provider actually used per capability after any mock fallback,
    /// e.g. `{"video": "mock"}` on a simulated run.
    #[serde(default)]
    pub actual_providers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edl_path: Option<String>,
}

impl RunRecord {
    pub fn is_simulated(&self) -> bool {
        self.actual_providers.values().any(|p| p == "mock")
    }

    pub fn status_label(&self) -> &'static str {
        match self.status {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    fn next_seq(&self) -> u64 {
        self.timeline.last().map(|e| e.seq + 1).unwrap_or(0)
    }
}

/// Journal store rooted at a base directory. Every run lives under
/// `runs/{run_id}/` with the layout external tools depend on.
pub struct RunJournal {
    base: PathBuf,
    runs: RwLock<HashMap<String, RunRecord>>,
}

impl RunJournal {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.base.join("runs").join(run_id)
    }

    pub fn scenes_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("scenes")
    }

    pub fn videos_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("videos")
    }

    pub fn audio_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("audio")
    }

    pub fn edl_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("edl")
    }

    pub fn renders_dir(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("renders").join(run_id)
    }

    pub fn ledger_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("ledger.json")
    }

    /// Start a new run: creates the directory tree and the journal head.
    pub async fn begin(
        &self,
        run_id: &str,
        concept: &str,
        budget_total_usd: f64,
        audio_tier: AudioTier,
    ) -> ProductionResult<()> {
        for dir in [
            self.scenes_dir(run_id),
            self.videos_dir(run_id),
            self.audio_dir(run_id),
            self.edl_dir(run_id),
            self.renders_dir(run_id),
        ] {
            fs::create_dir_all(&dir).await.map_err(journal_io)?;
        }

        let now = Utc::now();
        let record = RunRecord {
            run_id: run_id.to_string(),
            concept: concept.to_string(),
            budget_total_usd,
            audio_tier,
            status: RunStatus::Running,
            current_stage: RunStage::Initialized,
            progress_percent: RunStage::Initialized.progress_percent(),
            pilots: Vec::new(),
            winning_pilot_id: None,
            total_scenes: 0,
            scenes_completed: 0,
            assets: Vec::new(),
            timeline: vec![StageEvent {
                seq: 0,
                stage: RunStage::Initialized,
                started_at: now,
                finished_at: None,
                details: serde_json::Value::Null,
                error: None,
            }],
            started_at: now,
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            actual_providers: BTreeMap::new(),
            final_video_path: None,
            edl_path: None,
        };

        let mut runs = self.runs.write().await;
        runs.insert(run_id.to_string(), record);
        self.flush_locked(&runs, run_id).await
    }

    /// Advance to a stage: closes the open timeline event and appends a new
    /// one with the next sequence number.
    pub async fn advance(
        &self,
        run_id: &str,
        stage: RunStage,
        details: serde_json::Value,
    ) -> ProductionResult<()> {
        self.mutate(run_id, |record| {
            let now = Utc::now();
            if let Some(last) = record.timeline.last_mut() {
                if last.finished_at.is_none() {
                    last.finished_at = Some(now);
                }
            }
            let seq = record.next_seq();
            record.timeline.push(StageEvent {
                seq,
                stage,
                started_at: now,
                finished_at: None,
                details,
                error: None,
            });
            record.current_stage = stage;
            record.progress_percent = stage.progress_percent();
        })
        .await
    }

    pub async fn add_pilot(&self, run_id: &str, pilot: Pilot) -> ProductionResult<()> {
        self.mutate(run_id, |record| record.pilots.push(pilot)).await
    }

    /// Replace a pilot by id. Terminal pilot statuses are never downgraded.
    pub async fn update_pilot(&self, run_id: &str, pilot: Pilot) -> ProductionResult<()> {
        self.mutate(run_id, |record| {
            if let Some(slot) = record
                .pilots
                .iter_mut()
                .find(|p| p.pilot_id == pilot.pilot_id)
            {
                if !slot.status.is_terminal() {
                    *slot = pilot;
                }
            } else {
                record.pilots.push(pilot);
            }
        })
        .await
    }

    pub async fn set_winning_pilot(&self, run_id: &str, pilot_id: &str) -> ProductionResult<()> {
        let pilot_id = pilot_id.to_string();
        self.mutate(run_id, move |record| {
            record.winning_pilot_id = Some(pilot_id)
        })
        .await
    }

    pub async fn add_asset(&self, run_id: &str, asset: MediaAsset) -> ProductionResult<()> {
        self.mutate(run_id, |record| record.assets.push(asset)).await
    }

    pub async fn set_scene_counts(
        &self,
        run_id: &str,
        total: u32,
        completed: u32,
    ) -> ProductionResult<()> {
        self.mutate(run_id, move |record| {
            record.total_scenes = total;
            record.scenes_completed = completed;
        })
        .await
    }

    pub async fn add_error(&self, run_id: &str, error: &str) -> ProductionResult<()> {
        let error = error.to_string();
        self.mutate(run_id, move |record| record.errors.push(error))
            .await
    }

    pub async fn add_warning(&self, run_id: &str, warning: &str) -> ProductionResult<()> {
        let warning = warning.to_string();
        self.mutate(run_id, move |record| record.warnings.push(warning))
            .await
    }

    /// Record the provider actually used for a capability after fallback.
    pub async fn set_actual_provider(
        &self,
        run_id: &str,
        kind: &str,
        provider: &str,
    ) -> ProductionResult<()> {
        let kind = kind.to_string();
        let provider = provider.to_string();
        self.mutate(run_id, move |record| {
            record.actual_providers.insert(kind, provider);
        })
        .await
    }

    pub async fn set_final_paths(
        &self,
        run_id: &str,
        edl_path: Option<String>,
        final_video_path: Option<String>,
    ) -> ProductionResult<()> {
        self.mutate(run_id, move |record| {
            if edl_path.is_some() {
                record.edl_path = edl_path;
            }
            if final_video_path.is_some() {
                record.final_video_path = final_video_path;
            }
        })
        .await
    }

    /// Terminal transition; also writes `metadata.json` for external tools.
    pub async fn complete(&self, run_id: &str, status: RunStatus) -> ProductionResult<()> {
        self.mutate(run_id, move |record| {
            let now = Utc::now();
            if let Some(last) = record.timeline.last_mut() {
                if last.finished_at.is_none() {
                    last.finished_at = Some(now);
                }
            }
            let stage = match status {
                RunStatus::Completed => RunStage::Completed,
                _ => RunStage::Failed,
            };
            let seq = record.next_seq();
            record.timeline.push(StageEvent {
                seq,
                stage,
                started_at: now,
                finished_at: Some(now),
                details: serde_json::Value::Null,
                error: None,
            });
            record.status = status;
            record.current_stage = stage;
            record.progress_percent = stage.progress_percent();
            record.completed_at = Some(now);
        })
        .await?;

        let record = self
            .get(run_id)
            .await?
            .ok_or_else(|| ProductionError::JournalIo(format!("run `{run_id}` vanished")))?;
        let metadata = serde_json::json!({
            "run_id": record.run_id,
            "concept": record.concept,
            "status": record.status,
            "started_at": record.started_at,
            "completed_at": record.completed_at,
            "budget_total_usd": record.budget_total_usd,
            "winning_pilot_id": record.winning_pilot_id,
            "simulated": record.is_simulated(),
            "edl_path": record.edl_path,
            "final_video_path": record.final_video_path,
        });
        let path = self.run_dir(run_id).join(METADATA_FILE);
        write_durable(&path, &serde_json::to_vec_pretty(&metadata).map_err(journal_io)?).await
    }

    /// Load a run's journal, preferring the in-memory copy.
    pub async fn get(&self, run_id: &str) -> ProductionResult<Option<RunRecord>> {
        if let Some(record) = self.runs.read().await.get(run_id) {
            return Ok(Some(record.clone()));
        }
        let path = self.run_dir(run_id).join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).await.map_err(journal_io)?;
        let record: RunRecord = serde_json::from_str(&raw).map_err(journal_io)?;
        self.runs
            .write()
            .await
            .insert(run_id.to_string(), record.clone());
        Ok(Some(record))
    }

    /// Newest-first run ids, bounded by `limit`.
    pub async fn list(&self, limit: usize) -> ProductionResult<Vec<RunRecord>> {
        let runs_root = self.base.join("runs");
        if !runs_root.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&runs_root).await.map_err(journal_io)?;
        while let Some(entry) = entries.next_entry().await.map_err(journal_io)? {
            let Some(run_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(record) = self.get(&run_id).await? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Remove a run's directory tree. Never called implicitly.
    pub async fn delete(&self, run_id: &str) -> ProductionResult<bool> {
        self.runs.write().await.remove(run_id);
        let dir = self.run_dir(run_id);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).await.map_err(journal_io)?;
        Ok(true)
    }

    /// Pilot ids with a terminal status entry, used by resume to decide
    /// what not to re-run.
    pub async fn terminal_pilots(&self, run_id: &str) -> ProductionResult<Vec<(String, PilotStatus)>> {
        let Some(record) = self.get(run_id).await? else {
            return Ok(Vec::new());
        };
        Ok(record
            .pilots
            .iter()
            .filter(|p| p.status.is_terminal())
            .map(|p| (p.pilot_id.clone(), p.status))
            .collect())
    }

    async fn mutate<F>(&self, run_id: &str, apply: F) -> ProductionResult<()>
    where
        F: FnOnce(&mut RunRecord),
    {
        // Hydrate from disk first so resumed runs mutate real state.
        if self.runs.read().await.get(run_id).is_none() {
            self.get(run_id).await?;
        }
        let mut runs = self.runs.write().await;
        let record = runs
            .get_mut(run_id)
            .ok_or_else(|| ProductionError::InputInvalid(format!("unknown run `{run_id}`")))?;
        apply(record);
        self.flush_locked(&runs, run_id).await
    }

    async fn flush_locked(
        &self,
        runs: &HashMap<String, RunRecord>,
        run_id: &str,
    ) -> ProductionResult<()> {
        let record = runs
            .get(run_id)
            .ok_or_else(|| ProductionError::JournalIo(format!("run `{run_id}` missing")))?;
        let path = self.run_dir(run_id).join(JOURNAL_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(journal_io)?;
        }
        let raw = serde_json::to_vec_pretty(record).map_err(journal_io)?;
        write_durable(&path, &raw).await
    }
}

/// Write then fsync: the journal acknowledges nothing it cannot replay.
async fn write_durable(path: &Path, bytes: &[u8]) -> ProductionResult<()> {
    fs::write(path, bytes).await.map_err(journal_io)?;
    let file = fs::File::open(path).await.map_err(journal_io)?;
    file.sync_all().await.map_err(journal_io)?;
    Ok(())
}

fn journal_io(err: impl std::fmt::Display) -> ProductionError {
    ProductionError::JournalIo(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use showreel_types::ProductionTier;

    async fn journal() -> (RunJournal, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::new(dir.path());
        (journal, dir)
    }

    #[tokio::test]
    async fn begin_creates_the_layout() {
        let (journal, dir) = journal().await;
        journal
            .begin("run-1", "Logo reveal", 2.0, AudioTier::None)
            .await
            .unwrap();

        for sub in ["scenes", "videos", "audio", "edl"] {
            assert!(dir.path().join("runs/run-1").join(sub).is_dir());
        }
        assert!(dir.path().join("runs/run-1/renders/run-1").is_dir());
        assert!(dir.path().join("runs/run-1/memory.json").is_file());
    }

    #[tokio::test]
    async fn timeline_sequence_is_monotonic_without_gaps() {
        let (journal, _dir) = journal().await;
        journal
            .begin("run-1", "Demo", 5.0, AudioTier::SimpleOverlay)
            .await
            .unwrap();
        journal
            .advance("run-1", RunStage::PlanningPilots, json!({"pilots": 2}))
            .await
            .unwrap();
        journal
            .advance("run-1", RunStage::GeneratingVideo, json!({}))
            .await
            .unwrap();
        journal.complete("run-1", RunStatus::Completed).await.unwrap();

        let record = journal.get("run-1").await.unwrap().unwrap();
        let seqs: Vec<u64> = record.timeline.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        // Every event but the last is closed.
        for event in &record.timeline[..record.timeline.len() - 1] {
            assert!(event.finished_at.is_some());
        }
    }

    #[tokio::test]
    async fn reread_preserves_event_order() {
        let (journal, dir) = journal().await;
        journal
            .begin("run-1", "Demo", 5.0, AudioTier::None)
            .await
            .unwrap();
        journal
            .advance("run-1", RunStage::GeneratingScripts, json!({}))
            .await
            .unwrap();

        // A fresh store (new process) must observe the same total order.
        let reopened = RunJournal::new(dir.path());
        let record = reopened.get("run-1").await.unwrap().unwrap();
        let seqs: Vec<u64> = record.timeline.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(record.current_stage, RunStage::GeneratingScripts);
    }

    #[tokio::test]
    async fn terminal_pilot_status_is_never_downgraded() {
        let (journal, _dir) = journal().await;
        journal
            .begin("run-1", "Demo", 5.0, AudioTier::None)
            .await
            .unwrap();

        let mut pilot = Pilot::new(ProductionTier::Static, 1.0);
        journal.add_pilot("run-1", pilot.clone()).await.unwrap();

        pilot.status = PilotStatus::Running;
        journal.update_pilot("run-1", pilot.clone()).await.unwrap();
        pilot.status = PilotStatus::Approved;
        journal.update_pilot("run-1", pilot.clone()).await.unwrap();

        pilot.status = PilotStatus::Running;
        journal.update_pilot("run-1", pilot.clone()).await.unwrap();

        let record = journal.get("run-1").await.unwrap().unwrap();
        assert_eq!(record.pilots[0].status, PilotStatus::Approved);
        assert_eq!(
            journal.terminal_pilots("run-1").await.unwrap(),
            vec![(pilot.pilot_id.clone(), PilotStatus::Approved)]
        );
    }

    #[tokio::test]
    async fn complete_writes_metadata_with_simulated_flag() {
        let (journal, dir) = journal().await;
        journal
            .begin("run-1", "Demo", 5.0, AudioTier::None)
            .await
            .unwrap();
        journal
            .set_actual_provider("run-1", "video", "mock")
            .await
            .unwrap();
        journal.complete("run-1", RunStatus::Completed).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("runs/run-1/metadata.json")).unwrap();
        let metadata: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(metadata["status"], "completed");
        assert_eq!(metadata["simulated"], true);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (journal, _dir) = journal().await;
        journal.begin("run-a", "A", 1.0, AudioTier::None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        journal.begin("run-b", "B", 1.0, AudioTier::None).await.unwrap();

        let runs = journal.list(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "run-b");
    }

    #[tokio::test]
    async fn delete_removes_the_tree() {
        let (journal, dir) = journal().await;
        journal.begin("run-1", "A", 1.0, AudioTier::None).await.unwrap();
        assert!(journal.delete("run-1").await.unwrap());
        assert!(!dir.path().join("runs/run-1").exists());
        assert!(!journal.delete("run-1").await.unwrap());
    }
}

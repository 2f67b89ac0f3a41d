// Assembly planning: edit decision lists, candidate edits, audio tracks,
// and the external assembler contract.

pub mod assembler;
pub mod export;
pub mod model;
pub mod planner;

pub use assembler::{AssemblerStatus, FfmpegAssembler, RenderResult};
pub use export::export_cmx3600;
pub use model::{
    AudioTrack, EditCandidate, EditDecision, EditDecisionList, TrackType, TransitionType,
};
pub use planner::{AssemblyPlanner, PlannerConfig, SceneCut};

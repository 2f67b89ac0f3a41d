pub mod asset;
pub mod brief;
pub mod error;
pub mod pilot;
pub mod qa;
pub mod scene;
pub mod stage;
pub mod tier;

pub use asset::{MediaAsset, MediaKind};
pub use brief::{AudioTier, Brief, SeedAsset, SeedAssetRole};
pub use error::{ProductionError, ProductionResult};
pub use pilot::{Pilot, PilotStatus};
pub use qa::{QaScore, QaVisualAnalysis};
pub use scene::Scene;
pub use stage::RunStage;
pub use tier::ProductionTier;

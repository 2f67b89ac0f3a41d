// Provider Abstraction & Retry Layer
// Capability-typed contracts for video/audio/image/music/storage back-ends,
// a registry with deterministic mock fallback, bounded retries, and a
// central polling supervisor for job-based providers.

pub mod audio;
pub mod contract;
pub mod download;
pub mod image;
pub mod mock;
pub mod music;
pub mod registry;
pub mod retry;
pub mod secrets;
pub mod storage;
pub mod supervisor;
pub mod video;

pub use contract::{
    AudioProvider, AudioRequest, AudioResult, Capability, GenerateOutcome, ImageProvider,
    ImageResult, ImplementationStatus, JobHandle, JobState, MediaRef, MusicProvider, MusicResult,
    ProviderProfile, StorageProvider, StorageResult, VideoProvider, VideoRequest, Voice,
};
pub use registry::{ProviderRegistry, RegistryConfig, ResolvedAudio, ResolvedImage, ResolvedMusic, ResolvedVideo};
pub use retry::{with_retries, RetryPolicy};
pub use secrets::{mask_secret, resolve_secret};
pub use supervisor::JobSupervisor;

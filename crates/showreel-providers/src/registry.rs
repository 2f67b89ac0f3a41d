// Provider registry: resolves capability requests to live providers,
// caching one instance per (provider, credential) pair and substituting the
// deterministic mock when credentials are missing, validation fails, or
// mock mode is explicit. The substituted name is reported so the journal
// can flag simulated runs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use showreel_types::{ProductionError, ProductionResult};

use crate::audio::{ElevenLabsProvider, OpenAiTtsProvider, StubAudioProvider};
use crate::contract::{AudioProvider, ImageProvider, MusicProvider, StorageProvider, VideoProvider};
use crate::image::DalleProvider;
use crate::mock::{
    MockAudioProvider, MockImageProvider, MockMusicProvider, MockVideoProvider,
    MOCK_PROVIDER_NAME,
};
use crate::music::StubMusicProvider;
use crate::secrets::resolve_secret;
use crate::storage::LocalStorageProvider;
use crate::video::{LumaProvider, RunwayProvider, StubVideoProvider};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub video_provider: String,
    pub audio_provider: String,
    pub image_provider: String,
    pub music_provider: String,
    /// Force mocks for every capability regardless of credentials.
    pub mock_mode: bool,
    /// Outer deadline for provider job polling.
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub storage_base_path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            video_provider: "luma".to_string(),
            audio_provider: "openai_tts".to_string(),
            image_provider: "dalle".to_string(),
            music_provider: MOCK_PROVIDER_NAME.to_string(),
            mock_mode: false,
            timeout_secs: 300,
            max_retries: 3,
            storage_base_path: "artifacts/storage".to_string(),
        }
    }
}

macro_rules! resolved {
    ($name:ident, $trait:ident) => {
        #[derive(Clone)]
        pub struct $name {
            pub provider: Arc<dyn $trait>,
            pub name: String,
            pub is_mock: bool,
        }
    };
}

resolved!(ResolvedVideo, VideoProvider);
resolved!(ResolvedAudio, AudioProvider);
resolved!(ResolvedImage, ImageProvider);
resolved!(ResolvedMusic, MusicProvider);

pub struct ProviderRegistry {
    config: RegistryConfig,
    video_cache: RwLock<HashMap<String, Arc<dyn VideoProvider>>>,
    audio_cache: RwLock<HashMap<String, Arc<dyn AudioProvider>>>,
    image_cache: RwLock<HashMap<String, Arc<dyn ImageProvider>>>,
    music_cache: RwLock<HashMap<String, Arc<dyn MusicProvider>>>,
    validated: RwLock<HashMap<String, bool>>,
}

impl ProviderRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            video_cache: RwLock::new(HashMap::new()),
            audio_cache: RwLock::new(HashMap::new()),
            image_cache: RwLock::new(HashMap::new()),
            music_cache: RwLock::new(HashMap::new()),
            validated: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn StorageProvider> {
        Arc::new(LocalStorageProvider::new(&self.config.storage_base_path))
    }

    /// Resolve the configured video provider, falling back to mock.
    pub async fn video(&self) -> ProductionResult<ResolvedVideo> {
        let requested = self.config.video_provider.clone();
        if self.config.mock_mode || requested == MOCK_PROVIDER_NAME {
            return Ok(ResolvedVideo {
                provider: Arc::new(MockVideoProvider::new()),
                name: MOCK_PROVIDER_NAME.to_string(),
                is_mock: true,
            });
        }

        let cache_key = cache_key(&requested);
        if let Some(cached) = self.video_cache.read().await.get(&cache_key) {
            return Ok(ResolvedVideo {
                provider: cached.clone(),
                name: requested,
                is_mock: false,
            });
        }

        let built: ProductionResult<Arc<dyn VideoProvider>> = match requested.as_str() {
            "luma" => LumaProvider::from_env().map(|p| Arc::new(p) as Arc<dyn VideoProvider>),
            "runway" => RunwayProvider::from_env().map(|p| Arc::new(p) as Arc<dyn VideoProvider>),
            "pika" => Ok(Arc::new(StubVideoProvider::pika())),
            "stability" => Ok(Arc::new(StubVideoProvider::stability())),
            "kling" => Ok(Arc::new(StubVideoProvider::kling())),
            other => Err(ProductionError::InputInvalid(format!(
                "unknown video provider `{other}`"
            ))),
        };

        match built {
            Ok(provider) => {
                if self.credentials_ok(&cache_key, || provider.validate_credentials()).await {
                    self.video_cache
                        .write()
                        .await
                        .insert(cache_key, provider.clone());
                    Ok(ResolvedVideo {
                        provider,
                        name: requested,
                        is_mock: false,
                    })
                } else {
                    tracing::warn!(
                        provider = %requested,
                        "credential validation failed, substituting mock video provider"
                    );
                    Ok(ResolvedVideo {
                        provider: Arc::new(MockVideoProvider::new()),
                        name: MOCK_PROVIDER_NAME.to_string(),
                        is_mock: true,
                    })
                }
            }
            Err(ProductionError::CredentialMissing { provider }) => {
                tracing::warn!(%provider, "credentials missing, substituting mock video provider");
                Ok(ResolvedVideo {
                    provider: Arc::new(MockVideoProvider::new()),
                    name: MOCK_PROVIDER_NAME.to_string(),
                    is_mock: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn audio(&self) -> ProductionResult<ResolvedAudio> {
        let requested = self.config.audio_provider.clone();
        if self.config.mock_mode || requested == MOCK_PROVIDER_NAME {
            return Ok(ResolvedAudio {
                provider: Arc::new(MockAudioProvider),
                name: MOCK_PROVIDER_NAME.to_string(),
                is_mock: true,
            });
        }

        let cache_key = cache_key(&requested);
        if let Some(cached) = self.audio_cache.read().await.get(&cache_key) {
            return Ok(ResolvedAudio {
                provider: cached.clone(),
                name: requested,
                is_mock: false,
            });
        }

        let built: ProductionResult<Arc<dyn AudioProvider>> = match requested.as_str() {
            "openai_tts" => {
                OpenAiTtsProvider::from_env().map(|p| Arc::new(p) as Arc<dyn AudioProvider>)
            }
            "elevenlabs" => {
                ElevenLabsProvider::from_env().map(|p| Arc::new(p) as Arc<dyn AudioProvider>)
            }
            "inworld" => Ok(Arc::new(StubAudioProvider::inworld())),
            other => Err(ProductionError::InputInvalid(format!(
                "unknown audio provider `{other}`"
            ))),
        };

        match built {
            Ok(provider) => {
                if self.credentials_ok(&cache_key, || provider.validate_credentials()).await {
                    self.audio_cache
                        .write()
                        .await
                        .insert(cache_key, provider.clone());
                    Ok(ResolvedAudio {
                        provider,
                        name: requested,
                        is_mock: false,
                    })
                } else {
                    tracing::warn!(
                        provider = %requested,
                        "credential validation failed, substituting mock audio provider"
                    );
                    Ok(ResolvedAudio {
                        provider: Arc::new(MockAudioProvider),
                        name: MOCK_PROVIDER_NAME.to_string(),
                        is_mock: true,
                    })
                }
            }
            Err(ProductionError::CredentialMissing { provider }) => {
                tracing::warn!(%provider, "credentials missing, substituting mock audio provider");
                Ok(ResolvedAudio {
                    provider: Arc::new(MockAudioProvider),
                    name: MOCK_PROVIDER_NAME.to_string(),
                    is_mock: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn image(&self) -> ProductionResult<ResolvedImage> {
        let requested = self.config.image_provider.clone();
        if self.config.mock_mode || requested == MOCK_PROVIDER_NAME {
            return Ok(ResolvedImage {
                provider: Arc::new(MockImageProvider::default()),
                name: MOCK_PROVIDER_NAME.to_string(),
                is_mock: true,
            });
        }

        let cache_key = cache_key(&requested);
        if let Some(cached) = self.image_cache.read().await.get(&cache_key) {
            return Ok(ResolvedImage {
                provider: cached.clone(),
                name: requested,
                is_mock: false,
            });
        }

        let built: ProductionResult<Arc<dyn ImageProvider>> = match requested.as_str() {
            "dalle" => DalleProvider::from_env().map(|p| Arc::new(p) as Arc<dyn ImageProvider>),
            other => Err(ProductionError::InputInvalid(format!(
                "unknown image provider `{other}`"
            ))),
        };

        match built {
            Ok(provider) => {
                if self.credentials_ok(&cache_key, || provider.validate_credentials()).await {
                    self.image_cache
                        .write()
                        .await
                        .insert(cache_key, provider.clone());
                    Ok(ResolvedImage {
                        provider,
                        name: requested,
                        is_mock: false,
                    })
                } else {
                    Ok(ResolvedImage {
                        provider: Arc::new(MockImageProvider::default()),
                        name: MOCK_PROVIDER_NAME.to_string(),
                        is_mock: true,
                    })
                }
            }
            Err(ProductionError::CredentialMissing { provider }) => {
                tracing::warn!(%provider, "credentials missing, substituting mock image provider");
                Ok(ResolvedImage {
                    provider: Arc::new(MockImageProvider::default()),
                    name: MOCK_PROVIDER_NAME.to_string(),
                    is_mock: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn music(&self) -> ProductionResult<ResolvedMusic> {
        let requested = self.config.music_provider.clone();
        if self.config.mock_mode || requested == MOCK_PROVIDER_NAME {
            return Ok(ResolvedMusic {
                provider: Arc::new(MockMusicProvider),
                name: MOCK_PROVIDER_NAME.to_string(),
                is_mock: true,
            });
        }

        let built: ProductionResult<Arc<dyn MusicProvider>> = match requested.as_str() {
            "mubert" => Ok(Arc::new(StubMusicProvider::mubert())),
            "suno" => Ok(Arc::new(StubMusicProvider::suno())),
            other => Err(ProductionError::InputInvalid(format!(
                "unknown music provider `{other}`"
            ))),
        };

        match built {
            Ok(provider) => {
                if provider.validate_credentials().await {
                    let cache_key = cache_key(&requested);
                    self.music_cache
                        .write()
                        .await
                        .insert(cache_key, provider.clone());
                    Ok(ResolvedMusic {
                        provider,
                        name: requested,
                        is_mock: false,
                    })
                } else {
                    Ok(ResolvedMusic {
                        provider: Arc::new(MockMusicProvider),
                        name: MOCK_PROVIDER_NAME.to_string(),
                        is_mock: true,
                    })
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Validation result is cached per (provider, credentials) so repeated
    /// resolutions do not re-probe the vendor.
    async fn credentials_ok<F, Fut>(&self, cache_key: &str, validate: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        if let Some(known) = self.validated.read().await.get(cache_key) {
            return *known;
        }
        let ok = validate().await;
        self.validated
            .write()
            .await
            .insert(cache_key.to_string(), ok);
        ok
    }
}

fn key_env_for(provider: &str) -> Option<&'static str> {
    match provider {
        "luma" => Some("LUMA_API_KEY"),
        "runway" => Some("RUNWAY_API_KEY"),
        "pika" => Some("PIKA_API_KEY"),
        "stability" => Some("STABILITY_API_KEY"),
        "kling" => Some("KLING_API_KEY"),
        "openai_tts" | "dalle" => Some("OPENAI_API_KEY"),
        "elevenlabs" => Some("ELEVENLABS_API_KEY"),
        "inworld" => Some("INWORLD_API_KEY"),
        "mubert" => Some("MUBERT_API_KEY"),
        "suno" => Some("SUNO_API_KEY"),
        _ => None,
    }
}

/// One cached instance per (provider, credentials) pair: the key folds in a
/// fingerprint of the resolved secret, never the secret itself.
fn cache_key(provider: &str) -> String {
    use std::hash::{Hash, Hasher};
    let secret = key_env_for(provider).and_then(resolve_secret);
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    secret.hash(&mut hasher);
    format!("{provider}:{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mode_forces_mock_everywhere() {
        let registry = ProviderRegistry::new(RegistryConfig {
            mock_mode: true,
            ..RegistryConfig::default()
        });

        let video = registry.video().await.unwrap();
        assert!(video.is_mock);
        assert_eq!(video.name, "mock");
        assert!(registry.audio().await.unwrap().is_mock);
        assert!(registry.image().await.unwrap().is_mock);
        assert!(registry.music().await.unwrap().is_mock);
    }

    #[tokio::test]
    async fn missing_credentials_fall_back_to_mock() {
        std::env::remove_var("LUMA_API_KEY");
        let registry = ProviderRegistry::new(RegistryConfig {
            video_provider: "luma".to_string(),
            ..RegistryConfig::default()
        });

        let video = registry.video().await.unwrap();
        assert!(video.is_mock);
        assert_eq!(video.name, "mock");
    }

    #[tokio::test]
    async fn unknown_provider_is_a_caller_error() {
        let registry = ProviderRegistry::new(RegistryConfig {
            video_provider: "sora".to_string(),
            ..RegistryConfig::default()
        });

        let err = registry.video().await.err().unwrap();
        assert!(matches!(err, ProductionError::InputInvalid(_)));
    }
}

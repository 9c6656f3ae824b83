//! Subcommands and the helpers they share.

pub mod batch;
pub mod cache;
pub mod config;
pub mod output;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use fisco_core::models::config::FiscoConfig;
use fisco_core::{Classifier, MemoryCache, Pipeline, ValidationEngine};

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fisco")
        .join("config.json")
}

/// The `--config` path if given, otherwise the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration.
///
/// An explicit path must exist. The default location falls back to built-in
/// defaults when no file has been created yet.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<FiscoConfig> {
    let path = config_path(explicit);
    if explicit.is_some() || path.exists() {
        debug!("Loading configuration from {}", path.display());
        let config = FiscoConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?;
        Ok(config)
    } else {
        Ok(FiscoConfig::default())
    }
}

/// Pipeline built from configuration, plus the cache it persists to.
pub struct Session {
    pub pipeline: Pipeline,
    cache: Arc<MemoryCache>,
    cache_path: Option<PathBuf>,
}

impl Session {
    pub fn open(config: &FiscoConfig) -> anyhow::Result<Self> {
        config.check()?;

        let cache_path = config.classifier.cache_path.clone();
        let cache = match &cache_path {
            Some(path) => match MemoryCache::open(path) {
                Ok(cache) => cache,
                Err(e) => {
                    warn!("Ignoring unreadable cache snapshot: {}", e);
                    MemoryCache::new()
                }
            },
            None => MemoryCache::new(),
        };
        let cache = Arc::new(cache);

        let engine = ValidationEngine::from_config(&config.validation);
        let classifier = Classifier::from_config(config)?.with_cache(cache.clone());

        Ok(Self {
            pipeline: Pipeline::new(engine, classifier),
            cache,
            cache_path,
        })
    }

    /// Write the cache snapshot back when one is configured.
    pub fn persist(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.cache_path {
            save_cache(&self.cache, path)?;
        }
        Ok(())
    }
}

pub fn save_cache(cache: &MemoryCache, path: &Path) -> anyhow::Result<()> {
    cache
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save cache: {}", e))
}

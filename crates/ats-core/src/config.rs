use crate::error::{AtsError, Result};
use crate::types::{Backend, MetadataPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtsConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; each collection persists under `<data_dir>/<name>`.
    pub data_dir: PathBuf,
    pub backend: Backend,
    pub resume_collection: String,
    pub job_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimension: usize,
    pub model: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub top_k: usize,
    /// View of résumé metadata attached to jobs->candidates matches.
    pub resume_view: MetadataPolicy,
    /// View of job metadata attached to candidates->jobs matches.
    pub job_view: MetadataPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ats_data"),
            backend: Backend::Collection,
            resume_collection: "resume_collection".into(),
            job_collection: "job_collection".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            model: "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".into(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            resume_view: MetadataPolicy::Summary,
            job_view: MetadataPolicy::Full,
        }
    }
}

impl Default for AtsConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AtsConfig {
    /// Parse and validate a JSON document. Missing sections take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Same defaults, rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = data_dir.into();
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(AtsError::Config("embedding.dimension must be positive".into()));
        }
        if self.embedding.timeout_ms == 0 {
            return Err(AtsError::Config("embedding.timeout_ms must be positive".into()));
        }
        if self.matching.top_k == 0 {
            return Err(AtsError::Config("matching.top_k must be positive".into()));
        }
        let resumes = self.storage.resume_collection.trim();
        let jobs = self.storage.job_collection.trim();
        if resumes.is_empty() || jobs.is_empty() {
            return Err(AtsError::Config("collection names must not be empty".into()));
        }
        if resumes == jobs {
            return Err(AtsError::Config(format!(
                "resume and job collections share the name {resumes:?}"
            )));
        }
        Ok(())
    }

    pub fn resume_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.resume_collection)
    }

    pub fn job_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.job_collection)
    }
}

//! The matching orchestrator: stores for both sides, one embedder, and the
//! bidirectional match cycle.

use std::path::PathBuf;
use std::sync::Arc;

use ats_core::config::MatchingConfig;
use ats_core::{AtsConfig, AtsError, Backend, JobRecord, MatchDirection, MatchMetadata, MetadataPolicy, ResumeRecord};
use ats_vectordb::{Collection, DistanceMetric, FileStore, FlatCollection, Record, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::embedding::{EmbeddingProvider, TimedEmbedder};
use crate::error::Result;
use crate::ranking::{self, MatchResult};

/// Metric of every [`MatchResult::score`] the engine produces.
pub const MATCH_METRIC: DistanceMetric = DistanceMetric::Cosine;

/// Ranked peers of one source entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchGroup {
    pub source_id: String,
    /// Summary view of the source entity.
    pub source: Value,
    pub matches: Vec<MatchResult>,
}

/// Result of a full match cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The source collection holds nothing to match from.
    NoEntities,
    /// One group per source entity, in the source collection's order.
    Matched { groups: Vec<MatchGroup> },
}

impl MatchOutcome {
    pub fn groups(&self) -> &[MatchGroup] {
        match self {
            Self::NoEntities => &[],
            Self::Matched { groups } => groups,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub resumes: usize,
    pub jobs: usize,
}

pub struct MatchEngine {
    resumes: Arc<dyn VectorStore<ResumeRecord>>,
    jobs: Arc<dyn VectorStore<JobRecord>>,
    embedder: Option<TimedEmbedder>,
    settings: MatchingConfig,
}

impl MatchEngine {
    pub fn new(
        resumes: Arc<dyn VectorStore<ResumeRecord>>,
        jobs: Arc<dyn VectorStore<JobRecord>>,
        settings: MatchingConfig,
    ) -> Self {
        Self { resumes, jobs, embedder: None, settings }
    }

    pub fn with_embedder(mut self, embedder: TimedEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Open both collections as configured, loading whatever was persisted.
    pub fn open(config: &AtsConfig) -> Result<Self> {
        config.validate()?;
        let dim = config.embedding.dimension;
        let storage = &config.storage;
        let resumes = open_store::<ResumeRecord>(storage.backend, &storage.resume_collection, config.resume_path(), dim)?;
        let jobs = open_store::<JobRecord>(storage.backend, &storage.job_collection, config.job_path(), dim)?;
        info!(
            backend = ?storage.backend,
            data_dir = %storage.data_dir.display(),
            resumes = resumes.len(),
            jobs = jobs.len(),
            "match engine ready"
        );
        Ok(Self::new(resumes, jobs, config.matching.clone()))
    }

    /// [`MatchEngine::open`] plus a text embedder bounded by the configured timeout.
    pub fn open_with_embedder(config: &AtsConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if provider.dimension() != config.embedding.dimension {
            return Err(AtsError::Config(format!(
                "embedding provider produces {} dimensions, configuration expects {}",
                provider.dimension(),
                config.embedding.dimension
            ))
            .into());
        }
        let embedder = TimedEmbedder::new(provider, config.embedding.timeout());
        Ok(Self::open(config)?.with_embedder(embedder))
    }

    pub fn resumes(&self) -> &dyn VectorStore<ResumeRecord> {
        self.resumes.as_ref()
    }

    pub fn jobs(&self) -> &dyn VectorStore<JobRecord> {
        self.jobs.as_ref()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats { resumes: self.resumes.len(), jobs: self.jobs.len() }
    }

    // ========== Entity CRUD ==========

    pub fn insert_resume(&self, embedding: &[f32], record: ResumeRecord) -> Result<String> {
        Ok(self.resumes.insert(embedding, record)?)
    }

    pub fn insert_job(&self, embedding: &[f32], record: JobRecord) -> Result<String> {
        Ok(self.jobs.insert(embedding, record)?)
    }

    /// `false` if no résumé had this id.
    pub fn remove_resume(&self, id: &str) -> Result<bool> {
        Ok(self.resumes.delete(id)?)
    }

    /// `false` if no job had this id.
    pub fn remove_job(&self, id: &str) -> Result<bool> {
        Ok(self.jobs.delete(id)?)
    }

    pub fn get_resume(&self, id: &str) -> Option<(Vec<f32>, ResumeRecord)> {
        self.resumes.get(id)
    }

    pub fn get_job(&self, id: &str) -> Option<(Vec<f32>, JobRecord)> {
        self.jobs.get(id)
    }

    fn embedder(&self) -> Result<&TimedEmbedder> {
        self.embedder
            .as_ref()
            .ok_or_else(|| AtsError::Config("no embedding provider configured".into()).into())
    }

    /// Embed a job description and store the posting. Nothing is stored if embedding fails.
    pub async fn post_job(&self, title: &str, description: &str) -> Result<String> {
        let embedding = self.embedder()?.embed(description).await?;
        self.insert_job(&embedding, JobRecord::new(title, description))
    }

    /// Embed extracted résumé text and store it with its record.
    pub async fn add_resume_text(&self, text: &str, record: ResumeRecord) -> Result<String> {
        let embedding = self.embedder()?.embed(text).await?;
        self.insert_resume(&embedding, record)
    }

    // ========== Matching ==========

    /// Best résumés for one job vector.
    pub fn match_candidates_for(&self, job_embedding: &[f32]) -> Result<Vec<MatchResult>> {
        match_one(self.resumes.as_ref(), job_embedding, self.settings.top_k, self.settings.resume_view)
    }

    /// Best jobs for one résumé vector.
    pub fn match_jobs_for(&self, resume_embedding: &[f32]) -> Result<Vec<MatchResult>> {
        match_one(self.jobs.as_ref(), resume_embedding, self.settings.top_k, self.settings.job_view)
    }

    /// Match every entity of the source side against the other side.
    /// Any failure aborts the whole cycle.
    pub fn run(&self, direction: MatchDirection) -> Result<MatchOutcome> {
        let k = self.settings.top_k;
        info!(%direction, k, "starting match cycle");
        let outcome = match direction {
            MatchDirection::JobsToCandidates => {
                match_all(self.jobs.as_ref(), self.resumes.as_ref(), k, self.settings.resume_view)?
            }
            MatchDirection::CandidatesToJobs => {
                match_all(self.resumes.as_ref(), self.jobs.as_ref(), k, self.settings.job_view)?
            }
        };
        match &outcome {
            MatchOutcome::NoEntities => info!(%direction, "no entities to match"),
            MatchOutcome::Matched { groups } => info!(%direction, groups = groups.len(), "match cycle complete"),
        }
        Ok(outcome)
    }

    /// `direction` followed by its reverse. Nothing is returned unless both cycles succeed.
    pub fn run_both(&self, direction: MatchDirection) -> Result<(MatchOutcome, MatchOutcome)> {
        let forward = self.run(direction)?;
        let backward = self.run(direction.reverse())?;
        Ok((forward, backward))
    }

    /// Every job against the résumé collection.
    pub fn match_candidates(&self) -> Result<MatchOutcome> {
        self.run(MatchDirection::JobsToCandidates)
    }

    /// Every résumé against the job collection.
    pub fn match_jobs(&self) -> Result<MatchOutcome> {
        self.run(MatchDirection::CandidatesToJobs)
    }
}

fn match_one<P: Record + MatchMetadata>(
    target: &dyn VectorStore<P>,
    query: &[f32],
    k: usize,
    policy: MetadataPolicy,
) -> Result<Vec<MatchResult>> {
    let neighbors = target.query(query, k)?;
    ranking::score_neighbors(query, neighbors, MATCH_METRIC, policy)
}

fn match_all<S, P>(
    source: &dyn VectorStore<S>,
    target: &dyn VectorStore<P>,
    k: usize,
    policy: MetadataPolicy,
) -> Result<MatchOutcome>
where
    S: Record + MatchMetadata,
    P: Record + MatchMetadata,
{
    let all = source.get_all();
    if all.is_empty() {
        return Ok(MatchOutcome::NoEntities);
    }
    let mut groups = Vec::with_capacity(all.len());
    for ((source_id, embedding), metadata) in all.ids.into_iter().zip(all.embeddings).zip(all.metadatas) {
        let matches = match_one(target, &embedding, k, policy)?;
        debug!(source = %source.name(), %source_id, matches = matches.len(), "matched entity");
        groups.push(MatchGroup { source_id, source: metadata.summary(), matches });
    }
    Ok(MatchOutcome::Matched { groups })
}

fn open_store<R: Record>(
    backend: Backend,
    name: &str,
    path: PathBuf,
    dimension: usize,
) -> Result<Arc<dyn VectorStore<R>>> {
    let store: Arc<dyn VectorStore<R>> = match backend {
        Backend::Collection => Arc::new(Collection::<R>::open(name, path, Some(dimension))?),
        Backend::Flat => Arc::new(FlatCollection::<R>::open(name, Box::new(FileStore::new(path)), dimension)),
    };
    Ok(store)
}

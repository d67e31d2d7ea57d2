use crate::error::{AtsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Storage backend behind both collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Id-addressed collection ranked by cosine similarity.
    #[default]
    Collection,
    /// Append-only flat index with an offset -> id table.
    Flat,
}

/// How much of a peer's metadata is attached to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataPolicy {
    Summary,
    Full,
}

/// Which collection drives a match cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDirection {
    /// Every job posting is matched against the résumé collection.
    JobsToCandidates,
    /// Every résumé is matched against the job collection.
    CandidatesToJobs,
}

impl MatchDirection {
    pub fn reverse(self) -> Self {
        match self {
            Self::JobsToCandidates => Self::CandidatesToJobs,
            Self::CandidatesToJobs => Self::JobsToCandidates,
        }
    }
}

impl fmt::Display for MatchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobsToCandidates => write!(f, "jobs->candidates"),
            Self::CandidatesToJobs => write!(f, "candidates->jobs"),
        }
    }
}

/// Metadata views a record exposes to match results.
pub trait MatchMetadata {
    /// The short view: enough for a human to recognise the entity.
    fn summary(&self) -> Value;

    /// Every field of the record.
    fn full(&self) -> Value;

    fn view(&self, policy: MetadataPolicy) -> Value {
        match policy {
            MetadataPolicy::Summary => self.summary(),
            MetadataPolicy::Full => self.full(),
        }
    }
}

/// Candidate résumé metadata stored alongside its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    /// Reviewer feedback on résumé quality.
    #[serde(default)]
    pub feedback: Vec<String>,
    #[serde(default)]
    pub quality_score: Option<f32>,
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            skills: Vec::new(),
            experience: None,
            education: None,
            feedback: Vec::new(),
            quality_score: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        self.experience = Some(experience.into());
        self
    }

    pub fn with_education(mut self, education: impl Into<String>) -> Self {
        self.education = Some(education.into());
        self
    }

    /// JSON has no NaN or infinity, so only finite scores are accepted.
    pub fn with_feedback(mut self, feedback: Vec<String>, quality_score: f32) -> Result<Self> {
        if !quality_score.is_finite() {
            return Err(AtsError::InvalidInput(format!(
                "quality score must be finite, got {quality_score}"
            )));
        }
        self.feedback = feedback;
        self.quality_score = Some(quality_score);
        Ok(self)
    }
}

impl MatchMetadata for ResumeRecord {
    fn summary(&self) -> Value {
        json!({
            "name": self.name,
            "location": self.location,
        })
    }

    fn full(&self) -> Value {
        json!({
            "name": self.name,
            "location": self.location,
            "skills": self.skills,
            "experience": self.experience,
            "education": self.education,
            "feedback": self.feedback,
            "quality_score": self.quality_score,
        })
    }
}

/// Job posting metadata stored alongside its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub description: String,
    #[serde(default = "Utc::now")]
    pub posted_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            posted_at: Utc::now(),
        }
    }
}

impl MatchMetadata for JobRecord {
    fn summary(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.description,
        })
    }

    fn full(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.description,
            "posted_at": self.posted_at.to_rfc3339(),
        })
    }
}

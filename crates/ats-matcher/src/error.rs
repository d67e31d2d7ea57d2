use std::time::Duration;

use ats_core::AtsError;
use ats_vectordb::VectorDbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Embedding provider failed: {0}")]
    Upstream(String),
    #[error("Embedding provider timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Storage(#[from] VectorDbError),
    #[error(transparent)]
    Config(#[from] AtsError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MatchError>;

//! Shared configuration, error type and typed records for the ATS matching engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::AtsConfig;
pub use error::{AtsError, Result};
pub use types::{Backend, JobRecord, MatchDirection, MatchMetadata, MetadataPolicy, ResumeRecord};

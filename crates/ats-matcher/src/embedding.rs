//! Embedding provider abstraction.
//!
//! The engine never runs a model itself. Providers are called through
//! [`TimedEmbedder`], which rejects blank text up front, bounds every call with
//! a deadline, and checks what comes back before anything is stored. Provider
//! calls may block (model inference), so they run off the async worker threads.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{MatchError, Result};

/// Maps text to a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Text must contain something other than whitespace.
pub fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(MatchError::InvalidInput("Input text is empty or invalid.".into()));
    }
    Ok(())
}

/// Deadline-bounded access to an [`EmbeddingProvider`].
#[derive(Clone)]
pub struct TimedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl TimedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Embed `text` within the deadline. The provider runs on the blocking
    /// pool; a result that arrives after the deadline is dropped.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        validate_text(text)?;
        let provider = Arc::clone(&self.provider);
        let owned = text.to_owned();
        let handle = tokio::runtime::Handle::current();
        let call = tokio::task::spawn_blocking(move || handle.block_on(provider.embed(&owned)));

        let vector = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                warn!(timeout = ?self.timeout, "embedding provider timed out");
                return Err(MatchError::Timeout(self.timeout));
            }
            Ok(Err(join)) => return Err(MatchError::Upstream(format!("embedding task failed: {join}"))),
            Ok(Ok(Err(e))) => return Err(MatchError::Upstream(format!("{e:#}"))),
            Ok(Ok(Ok(vector))) => vector,
        };

        let expected = self.provider.dimension();
        if vector.len() != expected {
            return Err(MatchError::Upstream(format!(
                "provider returned {} dimensions, expected {expected}",
                vector.len()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(MatchError::Upstream("provider returned non-finite values".into()));
        }
        debug!(chars = text.len(), dimension = expected, "embedded text");
        Ok(vector)
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// No model, no network: texts that share words land near each other. Suited
/// to tests and offline runs, not to semantic matching quality.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed_sync(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.dimension == 0 {
            anyhow::bail!("hashing embedder has zero dimension");
        }
        let mut vector = vec![0f32; self.dimension];
        let mut tokens = 0usize;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            anyhow::bail!("text contains no words");
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_sync(text)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(PRIME))
}

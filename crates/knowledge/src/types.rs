//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the knowledge index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory tree scanned for source documents. Relative paths are
    /// resolved against the workspace root at load time.
    #[serde(default = "default_knowledge_root")]
    pub knowledge_root: PathBuf,

    /// Embedding provider ("trigram", "ollama")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Embedding model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimension
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,

    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Number of chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Chunks embedded per batch during index construction
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Concurrent embedding batches in flight during a build
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: u32,

    /// Minimum number of changed files (new + deleted) before a refresh
    /// triggers a full rebuild. 1 rebuilds on any change.
    #[serde(default = "default_rebuild_threshold")]
    pub rebuild_threshold: u32,
}

fn default_knowledge_root() -> PathBuf {
    PathBuf::from("knowledge")
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> u32 {
    384
}

fn default_chunk_size() -> u32 {
    500
}

fn default_chunk_overlap() -> u32 {
    50
}

fn default_top_k() -> u32 {
    3
}

fn default_batch_size() -> u32 {
    100
}

fn default_embed_concurrency() -> u32 {
    2
}

fn default_rebuild_threshold() -> u32 {
    1
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            knowledge_root: default_knowledge_root(),
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            batch_size: default_batch_size(),
            embed_concurrency: default_embed_concurrency(),
            rebuild_threshold: default_rebuild_threshold(),
        }
    }
}

/// A chunk as persisted in the index side table: the text plus provenance
/// back to its source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Absolute path of the source document
    pub source: String,

    /// Chunk position within the source (0-indexed)
    pub position: u32,

    /// Chunk text content
    pub text: String,
}

/// Lifecycle state of the knowledge service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No initialization attempted yet
    Uninitialized,

    /// Embedding provider acquired, index not yet loaded or built
    ModelReady,

    /// Index loaded or built and published; queries are augmented
    IndexReady,

    /// A lifecycle stage failed; queries degrade to pass-through
    Unavailable(UnavailableReason),
}

impl ServiceState {
    /// Human-readable state label for status reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::ModelReady => "model_ready",
            ServiceState::IndexReady => "index_ready",
            ServiceState::Unavailable(reason) => reason.as_str(),
        }
    }
}

/// Why the service became unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Embedding provider could not be acquired or stopped responding
    ProviderUnavailable,

    /// The knowledge root held no loadable documents
    SourceEmpty,

    /// Durable index artifacts were present but unusable
    ArtifactCorrupt,

    /// Index construction or persistence failed
    BuildFailed,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::ProviderUnavailable => "unavailable:provider",
            UnavailableReason::SourceEmpty => "unavailable:source_empty",
            UnavailableReason::ArtifactCorrupt => "unavailable:artifact_corrupt",
            UnavailableReason::BuildFailed => "unavailable:build_failed",
        }
    }
}

/// Snapshot of service state for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Whether initialization has been attempted
    pub initialized: bool,

    /// Whether queries are currently augmented
    pub available: bool,

    /// Current lifecycle state label
    pub state: String,

    /// Durable index directory
    pub index_path: PathBuf,
}

/// Result of a health check over the durable index artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            issues: Vec::new(),
        }
    }
}

/// Statistics from an index build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    /// Number of documents embedded
    pub documents_count: u32,

    /// Number of chunks embedded
    pub chunks_count: u32,

    /// Total bytes of extracted text
    pub bytes_processed: u64,

    /// Wall-clock build duration
    pub duration_secs: f64,
}

/// Result of a refresh operation.
///
/// Refresh never panics and never raises across the component boundary;
/// failures are reported as a variant carrying the reason.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// File set matches the manifest; nothing to do
    NoChanges,

    /// Changes detected but below the configured rebuild threshold
    BelowThreshold { changed: usize },

    /// Full rebuild performed over the current document set
    Rebuilt {
        new_files: Vec<PathBuf>,
        deleted_files: Vec<PathBuf>,
        stats: BuildStats,
    },

    /// Another rebuild holds the build gate; try again later
    InProgress,

    /// Refresh failed; the reason code matches the error taxonomy
    Failed { code: String, message: String },
}

/// Result of a forced rebuild.
#[derive(Debug, Clone)]
pub enum RebuildOutcome {
    /// Index rebuilt and published
    Rebuilt { stats: BuildStats },

    /// Another rebuild holds the build gate; try again later
    InProgress,

    /// Rebuild failed; the reason code matches the error taxonomy
    Failed { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = KnowledgeConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.rebuild_threshold, 1);
        assert_eq!(config.provider, "trigram");
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ServiceState::Uninitialized.as_str(), "uninitialized");
        assert_eq!(
            ServiceState::Unavailable(UnavailableReason::SourceEmpty).as_str(),
            "unavailable:source_empty"
        );
    }
}

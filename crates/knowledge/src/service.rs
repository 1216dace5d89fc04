//! Index lifecycle management.
//!
//! `KnowledgeService` decides when the durable index is usable, detects
//! which source documents changed, rebuilds the index without corrupting
//! it, and answers availability questions for callers that must never block
//! on (or fail because of) a slow or broken rebuild.
//!
//! State machine: `Uninitialized → ModelReady → IndexReady` on the success
//! path, `Unavailable(reason)` on failure at any stage. Every transition
//! into `Unavailable` is non-fatal: the service keeps answering
//! `is_available() == false` and queries degrade to pass-through.

use crate::config::{manifest_path, side_table_path, vector_path};
use crate::embed::{self, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::types::{
    BuildStats, ChunkRecord, HealthReport, KnowledgeConfig, RebuildOutcome, RefreshOutcome,
    ServiceState, ServiceStatus, UnavailableReason,
};
use crate::{chunker, config, loader, manifest};
use grounded_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;

/// Application-lifetime knowledge index service.
///
/// Constructed once at process start and passed by reference to whichever
/// component needs it. Searches read the last published index snapshot; a
/// rebuild assembles its replacement off to the side and publishes it with
/// a pointer swap, so in-flight readers never observe a partially merged
/// structure.
pub struct KnowledgeService {
    config: KnowledgeConfig,
    index_dir: PathBuf,
    provider: RwLock<Option<Arc<dyn EmbeddingProvider>>>,
    index: RwLock<Option<Arc<VectorIndex>>>,
    state: RwLock<ServiceState>,
    /// Exclusive gate for build/rebuild; taken with `try_lock` on the
    /// operator paths so callers are told "in progress" instead of queueing.
    build_gate: Mutex<()>,
}

impl KnowledgeService {
    /// Create a service over an explicit config and index directory.
    pub fn new(config: KnowledgeConfig, index_dir: PathBuf) -> Self {
        Self {
            config,
            index_dir,
            provider: RwLock::new(None),
            index: RwLock::new(None),
            state: RwLock::new(ServiceState::Uninitialized),
            build_gate: Mutex::new(()),
        }
    }

    /// Create a service from the workspace configuration.
    pub fn from_workspace(workspace: &Path) -> AppResult<Self> {
        let knowledge_config = config::load_config(workspace)?;
        let index_dir = config::get_index_dir(workspace);
        Ok(Self::new(knowledge_config, index_dir))
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Bring the service up: acquire the embedding provider, then load the
    /// existing index if it is healthy, otherwise build a fresh one.
    ///
    /// Returns the resulting state; never panics and never returns an error
    /// across this boundary.
    pub async fn initialize(&self) -> ServiceState {
        tracing::info!("Initializing knowledge service");

        let provider = match self.acquire_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::error!("Embedding provider unavailable: {}", e);
                return self.mark_unavailable(&e);
            }
        };
        self.set_state(ServiceState::ModelReady);

        // Load path: reuse the durable index when the artifacts look sound
        let health = self.check_health();
        if health.healthy {
            match VectorIndex::load(&self.index_dir) {
                Ok(index) if index.dimensions() == provider.dimensions() => {
                    tracing::info!("Loaded existing index ({} chunks)", index.len());
                    self.publish(index);
                    return self.set_state(ServiceState::IndexReady);
                }
                Ok(index) => {
                    tracing::warn!(
                        "Existing index dimension {} does not match provider dimension {}, rebuilding",
                        index.dimensions(),
                        provider.dimensions()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to load existing index, rebuilding: {}", e);
                }
            }
        } else {
            tracing::info!(
                "Index artifacts not usable ({}), taking build path",
                health.issues.join("; ")
            );
        }

        // Build path
        let _gate = self.build_gate.lock().await;
        match self.build_and_publish(&provider).await {
            Ok(stats) => {
                tracing::info!(
                    "Built index: {} documents, {} chunks in {:.2}s",
                    stats.documents_count,
                    stats.chunks_count,
                    stats.duration_secs
                );
                self.set_state(ServiceState::IndexReady)
            }
            Err(e) => {
                tracing::error!("Index build failed: {}", e);
                self.mark_unavailable(&e)
            }
        }
    }

    /// Detect source changes and rebuild when they reach the configured
    /// threshold.
    ///
    /// The underlying index has no delete or point-update primitive, so any
    /// qualifying change triggers a full rebuild over the complete current
    /// document set; the manifest is then overwritten with that set.
    pub async fn refresh(&self) -> RefreshOutcome {
        let _gate = match self.build_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                tracing::info!("Refresh requested while a rebuild is running");
                return RefreshOutcome::InProgress;
            }
        };

        let current = loader::scan(&self.config.knowledge_root);

        // A manifest without a healthy index is stale and must be ignored
        let known = if self.check_health().healthy {
            match manifest::load(&manifest_path(&self.index_dir)) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!("Manifest unreadable, treating as empty: {}", e);
                    BTreeSet::new()
                }
            }
        } else {
            tracing::debug!("Index artifacts unhealthy, ignoring manifest");
            BTreeSet::new()
        };

        let new_files: Vec<PathBuf> = current.difference(&known).cloned().collect();
        let deleted_files: Vec<PathBuf> = known.difference(&current).cloned().collect();

        if new_files.is_empty() && deleted_files.is_empty() {
            tracing::info!("Refresh: no changes in {} known files", known.len());
            return RefreshOutcome::NoChanges;
        }

        let changed = new_files.len() + deleted_files.len();
        if changed < self.config.rebuild_threshold as usize {
            tracing::info!(
                "Refresh: {} changed files below rebuild threshold {}",
                changed,
                self.config.rebuild_threshold
            );
            return RefreshOutcome::BelowThreshold { changed };
        }

        tracing::info!(
            "Refresh: {} new, {} deleted files, performing full rebuild",
            new_files.len(),
            deleted_files.len()
        );
        for file in &new_files {
            tracing::debug!("  + {:?}", file);
        }
        for file in &deleted_files {
            tracing::debug!("  - {:?}", file);
        }

        let provider = match self.acquire_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                self.mark_unavailable(&e);
                return RefreshOutcome::Failed {
                    code: e.reason_code().to_string(),
                    message: e.to_string(),
                };
            }
        };

        match self.build_and_publish(&provider).await {
            Ok(stats) => {
                self.set_state(ServiceState::IndexReady);
                RefreshOutcome::Rebuilt {
                    new_files,
                    deleted_files,
                    stats,
                }
            }
            Err(e) => {
                tracing::error!("Refresh rebuild failed: {}", e);
                self.mark_unavailable(&e);
                RefreshOutcome::Failed {
                    code: e.reason_code().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Force the build path regardless of current state, deleting the
    /// durable artifacts first. Operator-triggered recovery.
    pub async fn rebuild(&self) -> RebuildOutcome {
        let _gate = match self.build_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                tracing::info!("Rebuild requested while another rebuild is running");
                return RebuildOutcome::InProgress;
            }
        };

        tracing::info!("Forced rebuild of the knowledge index");

        if let Err(e) = self.delete_artifacts() {
            tracing::warn!("Failed to delete old index artifacts: {}", e);
        }

        let provider = match self.acquire_provider().await {
            Ok(provider) => provider,
            Err(e) => {
                self.mark_unavailable(&e);
                return RebuildOutcome::Failed {
                    code: e.reason_code().to_string(),
                    message: e.to_string(),
                };
            }
        };

        match self.build_and_publish(&provider).await {
            Ok(stats) => {
                self.set_state(ServiceState::IndexReady);
                RebuildOutcome::Rebuilt { stats }
            }
            Err(e) => {
                tracing::error!("Rebuild failed: {}", e);
                self.mark_unavailable(&e);
                RebuildOutcome::Failed {
                    code: e.reason_code().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Verify the durable artifacts exist and are non-empty.
    ///
    /// Structural check only; content-level integrity is verified by the
    /// load path. Used to short-circuit an unnecessary rebuild on restart.
    pub fn check_health(&self) -> HealthReport {
        let mut issues = Vec::new();

        for path in [vector_path(&self.index_dir), side_table_path(&self.index_dir)] {
            match fs::metadata(&path) {
                Err(_) => issues.push(format!("Missing index artifact: {:?}", path)),
                Ok(meta) if meta.len() == 0 => {
                    issues.push(format!("Empty index artifact: {:?}", path))
                }
                Ok(_) => {}
            }
        }

        HealthReport {
            healthy: issues.is_empty(),
            issues,
        }
    }

    /// Whether queries are currently augmented.
    pub fn is_available(&self) -> bool {
        self.state() == ServiceState::IndexReady && self.index.read().unwrap().is_some()
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read().unwrap()
    }

    /// Snapshot for status endpoints.
    pub fn status(&self) -> ServiceStatus {
        let state = self.state();
        ServiceStatus {
            initialized: state != ServiceState::Uninitialized,
            available: self.is_available(),
            state: state.as_str().to_string(),
            index_path: self.index_dir.clone(),
        }
    }

    /// Embed the query and search the published index snapshot.
    ///
    /// Returns an empty result when no index is published.
    pub async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<(ChunkRecord, f32)>> {
        let index = match self.index.read().unwrap().clone() {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };

        let provider = self.provider.read().unwrap().clone().ok_or_else(|| {
            AppError::ProviderUnavailable("No embedding provider acquired".to_string())
        })?;

        let embedding = provider.embed(query).await?;
        index.search(&embedding, top_k)
    }

    /// Augment a user query with retrieved context. Never fails; degrades
    /// to a pass-through prompt. See [`crate::augment`].
    pub async fn enhance(&self, query: &str) -> String {
        crate::augment::enhance_query(self, query).await
    }

    // ---- internals -------------------------------------------------------

    /// Get the cached provider or construct one, verifying it with a probe
    /// embedding.
    async fn acquire_provider(&self) -> AppResult<Arc<dyn EmbeddingProvider>> {
        if let Some(provider) = self.provider.read().unwrap().clone() {
            return Ok(provider);
        }

        let provider = embed::create_provider(&self.config).await?;

        let probe = provider.embed("embedding model probe").await?;
        if probe.len() != provider.dimensions() {
            return Err(AppError::ProviderUnavailable(format!(
                "Provider '{}' probe returned dimension {}, expected {}",
                provider.provider_name(),
                probe.len(),
                provider.dimensions()
            )));
        }

        tracing::info!(
            "Embedding provider '{}' ready (model: {}, dimension: {})",
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions()
        );

        *self.provider.write().unwrap() = Some(Arc::clone(&provider));
        Ok(provider)
    }

    /// The build path: scan, load, chunk, embed, persist, publish.
    ///
    /// Must be called while holding `build_gate`. Writes the manifest only
    /// after the index artifacts have been renamed into place, keeping the
    /// manifest-trustworthy-iff-index-valid invariant.
    async fn build_and_publish(&self, provider: &Arc<dyn EmbeddingProvider>) -> AppResult<BuildStats> {
        let start = Instant::now();

        let current_files = loader::scan(&self.config.knowledge_root);
        if current_files.is_empty() {
            return Err(AppError::SourceEmpty(format!(
                "No indexable files under {:?}",
                self.config.knowledge_root
            )));
        }

        let documents = loader::load_documents(
            &current_files,
            self.config.embed_concurrency as usize,
        )
        .await;
        if documents.is_empty() {
            return Err(AppError::SourceEmpty(format!(
                "None of the {} files under {:?} yielded text",
                current_files.len(),
                self.config.knowledge_root
            )));
        }

        let mut candidates = Vec::new();
        let mut bytes_processed = 0u64;

        for doc in &documents {
            bytes_processed += doc.text.len() as u64;
            let chunks = chunker::split_text(
                &doc.text,
                self.config.chunk_size as usize,
                self.config.chunk_overlap as usize,
            );
            let source = doc.path.to_string_lossy().to_string();
            for (position, text) in chunks.into_iter().enumerate() {
                candidates.push(ChunkRecord {
                    source: source.clone(),
                    position: position as u32,
                    text,
                });
            }
        }

        tracing::info!(
            "Chunked {} documents into {} chunks",
            documents.len(),
            candidates.len()
        );

        let index = VectorIndex::build(
            Arc::clone(provider),
            candidates,
            self.config.batch_size as usize,
            self.config.embed_concurrency as usize,
        )
        .await?;

        let chunks_count = index.len() as u32;

        index.save(&self.index_dir)?;
        manifest::save(&manifest_path(&self.index_dir), &current_files)?;

        self.publish(index);

        Ok(BuildStats {
            documents_count: documents.len() as u32,
            chunks_count,
            bytes_processed,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Swap the published index snapshot; in-flight readers keep theirs.
    fn publish(&self, index: VectorIndex) {
        *self.index.write().unwrap() = Some(Arc::new(index));
    }

    fn set_state(&self, state: ServiceState) -> ServiceState {
        *self.state.write().unwrap() = state;
        state
    }

    /// Convert an error into the unavailable state, unpublishing the index.
    fn mark_unavailable(&self, error: &AppError) -> ServiceState {
        let reason = match error {
            AppError::ProviderUnavailable(_) => UnavailableReason::ProviderUnavailable,
            AppError::SourceEmpty(_) => UnavailableReason::SourceEmpty,
            AppError::ArtifactCorrupt(_) => UnavailableReason::ArtifactCorrupt,
            _ => UnavailableReason::BuildFailed,
        };

        *self.index.write().unwrap() = None;
        self.set_state(ServiceState::Unavailable(reason))
    }

    fn delete_artifacts(&self) -> AppResult<()> {
        for path in [
            vector_path(&self.index_dir),
            side_table_path(&self.index_dir),
            manifest_path(&self.index_dir),
        ] {
            if path.exists() {
                fs::remove_file(&path)?;
                tracing::debug!("Deleted {:?}", path);
            }
        }
        Ok(())
    }
}

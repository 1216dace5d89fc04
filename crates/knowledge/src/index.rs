//! In-memory vector index with two-artifact durable persistence.
//!
//! The index is a flat structure: one contiguous f32 buffer of row-major
//! vectors plus a parallel list of chunk records. Search is exact cosine
//! similarity over all rows. Durable form is a binary vector artifact
//! (`index.vec`) and a JSON side table (`index.meta.json`); both must exist,
//! be non-empty and agree with each other for a load to succeed.

use crate::config::{side_table_path, vector_path};
use crate::embed::EmbeddingProvider;
use crate::types::ChunkRecord;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Magic prefix of the binary vector artifact.
const VEC_MAGIC: &[u8; 4] = b"GKX1";

/// Header: magic + dimension (u32 LE) + row count (u32 LE).
const VEC_HEADER_LEN: usize = 12;

/// Side-table artifact: everything about the index except the vectors.
#[derive(Debug, Serialize, Deserialize)]
struct SideTable {
    dimensions: usize,
    provider: String,
    model: String,
    built_at: DateTime<Utc>,
    chunks: Vec<ChunkRecord>,
}

/// Flat cosine-similarity index over embedded chunks.
#[derive(Debug)]
pub struct VectorIndex {
    dimensions: usize,
    provider: String,
    model: String,
    /// Row-major vector data, `records.len() * dimensions` values
    data: Vec<f32>,
    records: Vec<ChunkRecord>,
}

impl VectorIndex {
    /// Create an empty index for a given provider fingerprint.
    pub fn new(dimensions: usize, provider: &str, model: &str) -> Self {
        Self {
            dimensions,
            provider: provider.to_string(),
            model: model.to_string(),
            data: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a batch of records with their vectors.
    pub fn add_batch(
        &mut self,
        records: Vec<ChunkRecord>,
        vectors: Vec<Vec<f32>>,
    ) -> AppResult<()> {
        if records.len() != vectors.len() {
            return Err(AppError::ArtifactCorrupt(format!(
                "Batch mismatch: {} records, {} vectors",
                records.len(),
                vectors.len()
            )));
        }

        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(AppError::ArtifactCorrupt(format!(
                    "Embedding dimension {} does not match index dimension {}",
                    vector.len(),
                    self.dimensions
                )));
            }
        }

        for vector in &vectors {
            self.data.extend_from_slice(vector);
        }
        self.records.extend(records);

        Ok(())
    }

    /// Append another index's entries in place.
    ///
    /// Only used while batching a build; incremental indexing across rebuild
    /// boundaries is not supported.
    pub fn merge(&mut self, other: VectorIndex) -> AppResult<()> {
        if other.dimensions != self.dimensions {
            return Err(AppError::ArtifactCorrupt(format!(
                "Cannot merge index of dimension {} into index of dimension {}",
                other.dimensions, self.dimensions
            )));
        }

        self.data.extend_from_slice(&other.data);
        self.records.extend(other.records);
        Ok(())
    }

    /// Embed all candidates in fixed-size batches and assemble the index.
    ///
    /// The first batch creates the structure, later batches are merged in;
    /// at most `concurrency` embedding batches are in flight at once and
    /// each batch buffer is released as soon as it has been merged.
    pub async fn build(
        provider: Arc<dyn EmbeddingProvider>,
        candidates: Vec<ChunkRecord>,
        batch_size: usize,
        concurrency: usize,
    ) -> AppResult<VectorIndex> {
        let batch_size = batch_size.max(1);
        let concurrency = concurrency.max(1);

        let batches: Vec<Vec<ChunkRecord>> = candidates
            .chunks(batch_size)
            .map(|b| b.to_vec())
            .collect();
        let batch_total = batches.len();

        let mut embedded = futures::stream::iter(batches.into_iter().map(|batch| {
            let provider = Arc::clone(&provider);
            async move {
                let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                let vectors = provider.embed_batch(&texts).await?;
                Ok::<_, AppError>((batch, vectors))
            }
        }))
        .buffered(concurrency);

        let mut index: Option<VectorIndex> = None;
        let mut batch_no = 0usize;

        while let Some(result) = embedded.next().await {
            let (batch, vectors) = result?;
            batch_no += 1;

            tracing::debug!(
                "Embedded batch {}/{} ({} chunks)",
                batch_no,
                batch_total,
                batch.len()
            );

            let mut batch_index = VectorIndex::new(
                provider.dimensions(),
                provider.provider_name(),
                provider.model_name(),
            );
            batch_index.add_batch(batch, vectors)?;

            match index.as_mut() {
                None => index = Some(batch_index),
                Some(ix) => ix.merge(batch_index)?,
            }
        }

        Ok(index.unwrap_or_else(|| {
            VectorIndex::new(
                provider.dimensions(),
                provider.provider_name(),
                provider.model_name(),
            )
        }))
    }

    /// Return the top-k most similar chunks, most similar first.
    ///
    /// An empty index returns an empty result, never an error. A query of
    /// the wrong dimension is a consistency error.
    pub fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(ChunkRecord, f32)>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimensions {
            return Err(AppError::ArtifactCorrupt(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut results: Vec<(ChunkRecord, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let offset = row * self.dimensions;
                let vector = &self.data[offset..offset + self.dimensions];
                (record.clone(), cosine_similarity(query, vector))
            })
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        Ok(results)
    }

    /// Persist both artifacts atomically.
    ///
    /// Each artifact is fully written to a temporary sibling and renamed
    /// into place, so an abandoned save (crash, restart) leaves either the
    /// previous artifacts or a temp file that the next save overwrites,
    /// never a half-written index.
    pub fn save(&self, index_dir: &Path) -> AppResult<()> {
        fs::create_dir_all(index_dir)?;

        let vec_path = vector_path(index_dir);
        let meta_path = side_table_path(index_dir);
        let vec_tmp = vec_path.with_extension("vec.tmp");
        let meta_tmp = meta_path.with_extension("json.tmp");

        // Binary vector artifact
        let mut bytes = Vec::with_capacity(VEC_HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(VEC_MAGIC);
        bytes.extend_from_slice(&(self.dimensions as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        fs::write(&vec_tmp, &bytes)?;

        // JSON side table
        let side_table = SideTable {
            dimensions: self.dimensions,
            provider: self.provider.clone(),
            model: self.model.clone(),
            built_at: Utc::now(),
            chunks: self.records.clone(),
        };
        let json = serde_json::to_vec_pretty(&side_table)?;
        fs::write(&meta_tmp, &json)?;

        fs::rename(&vec_tmp, &vec_path)?;
        fs::rename(&meta_tmp, &meta_path)?;

        tracing::info!(
            "Saved index ({} chunks, dimension {}) to {:?}",
            self.records.len(),
            self.dimensions,
            index_dir
        );

        Ok(())
    }

    /// Load both artifacts, verifying mutual consistency.
    ///
    /// Any missing, empty, or disagreeing artifact fails the whole load; a
    /// partial index is never returned.
    pub fn load(index_dir: &Path) -> AppResult<VectorIndex> {
        let vec_path = vector_path(index_dir);
        let meta_path = side_table_path(index_dir);

        let bytes = fs::read(&vec_path).map_err(|e| {
            AppError::ArtifactCorrupt(format!("Cannot read {:?}: {}", vec_path, e))
        })?;
        let json = fs::read(&meta_path).map_err(|e| {
            AppError::ArtifactCorrupt(format!("Cannot read {:?}: {}", meta_path, e))
        })?;

        if bytes.len() < VEC_HEADER_LEN {
            return Err(AppError::ArtifactCorrupt(format!(
                "Vector artifact {:?} truncated ({} bytes)",
                vec_path,
                bytes.len()
            )));
        }
        if &bytes[0..4] != VEC_MAGIC {
            return Err(AppError::ArtifactCorrupt(format!(
                "Vector artifact {:?} has wrong magic",
                vec_path
            )));
        }

        let dimensions = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

        let expected = VEC_HEADER_LEN + count * dimensions * 4;
        if bytes.len() != expected {
            return Err(AppError::ArtifactCorrupt(format!(
                "Vector artifact {:?} has {} bytes, expected {}",
                vec_path,
                bytes.len(),
                expected
            )));
        }

        let side_table: SideTable = serde_json::from_slice(&json).map_err(|e| {
            AppError::ArtifactCorrupt(format!("Side table {:?} unreadable: {}", meta_path, e))
        })?;

        if side_table.dimensions != dimensions {
            return Err(AppError::ArtifactCorrupt(format!(
                "Side table dimension {} disagrees with vector artifact dimension {}",
                side_table.dimensions, dimensions
            )));
        }
        if side_table.chunks.len() != count {
            return Err(AppError::ArtifactCorrupt(format!(
                "Side table has {} chunks, vector artifact has {}",
                side_table.chunks.len(),
                count
            )));
        }

        let mut data = Vec::with_capacity(count * dimensions);
        for chunk in bytes[VEC_HEADER_LEN..].chunks_exact(4) {
            data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        tracing::info!(
            "Loaded index ({} chunks, dimension {}) from {:?}",
            count,
            dimensions,
            index_dir
        );

        Ok(VectorIndex {
            dimensions,
            provider: side_table.provider,
            model: side_table.model,
            data,
            records: side_table.chunks,
        })
    }
}

/// Cosine similarity between two equal-length vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::providers::trigram::TrigramProvider;
    use tempfile::TempDir;

    fn record(source: &str, position: u32, text: &str) -> ChunkRecord {
        ChunkRecord {
            source: source.to_string(),
            position,
            text: text.to_string(),
        }
    }

    fn small_index() -> VectorIndex {
        let mut index = VectorIndex::new(3, "trigram", "trigram-v1");
        index
            .add_batch(
                vec![
                    record("/kb/a.txt", 0, "alpha"),
                    record("/kb/a.txt", 1, "beta"),
                    record("/kb/b.txt", 0, "gamma"),
                ],
                vec![
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.7, 0.7, 0.0],
                ],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = small_index();
        let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.text, "alpha");
        assert!((results[0].1 - 1.0).abs() < 1e-5);
        assert_eq!(results[1].0.text, "gamma");
        assert_eq!(results[2].0.text, "beta");
    }

    #[test]
    fn test_search_empty_index_is_empty_not_error() {
        let index = VectorIndex::new(3, "trigram", "trigram-v1");
        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch_is_error() {
        let index = small_index();
        let result = index.search(&[1.0, 0.0], 3);
        assert!(matches!(result, Err(AppError::ArtifactCorrupt(_))));
    }

    #[test]
    fn test_add_batch_rejects_wrong_dimension() {
        let mut index = VectorIndex::new(3, "trigram", "trigram-v1");
        let result = index.add_batch(vec![record("/kb/a.txt", 0, "x")], vec![vec![1.0, 2.0]]);
        assert!(matches!(result, Err(AppError::ArtifactCorrupt(_))));
    }

    #[test]
    fn test_merge_rejects_dimension_mismatch() {
        let mut index = small_index();
        let other = VectorIndex::new(4, "trigram", "trigram-v1");
        assert!(matches!(
            index.merge(other),
            Err(AppError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_save_load_round_trip_preserves_search() {
        let temp = TempDir::new().unwrap();
        let index = small_index();

        let before = index.search(&[0.6, 0.8, 0.0], 3).unwrap();
        index.save(temp.path()).unwrap();

        let loaded = VectorIndex::load(temp.path()).unwrap();
        let after = loaded.search(&[0.6, 0.8, 0.0], 3).unwrap();

        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dimensions(), index.dimensions());

        let before_texts: Vec<&str> = before.iter().map(|(c, _)| c.text.as_str()).collect();
        let after_texts: Vec<&str> = after.iter().map(|(c, _)| c.text.as_str()).collect();
        assert_eq!(before_texts, after_texts);

        for (b, a) in before.iter().zip(after.iter()) {
            assert!((b.1 - a.1).abs() < 1e-6);
        }
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        small_index().save(temp.path()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_artifacts_fails() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            VectorIndex::load(temp.path()),
            Err(AppError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_load_zero_byte_vector_artifact_fails() {
        let temp = TempDir::new().unwrap();
        small_index().save(temp.path()).unwrap();
        fs::write(vector_path(temp.path()), b"").unwrap();

        assert!(matches!(
            VectorIndex::load(temp.path()),
            Err(AppError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_load_count_mismatch_fails() {
        let temp = TempDir::new().unwrap();
        let index = small_index();
        index.save(temp.path()).unwrap();

        // Rewrite the side table with one chunk missing
        let json = fs::read_to_string(side_table_path(temp.path())).unwrap();
        let mut table: serde_json::Value = serde_json::from_str(&json).unwrap();
        table["chunks"].as_array_mut().unwrap().pop();
        fs::write(
            side_table_path(temp.path()),
            serde_json::to_vec(&table).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            VectorIndex::load(temp.path()),
            Err(AppError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_load_wrong_magic_fails() {
        let temp = TempDir::new().unwrap();
        small_index().save(temp.path()).unwrap();

        let mut bytes = fs::read(vector_path(temp.path())).unwrap();
        bytes[0] = b'?';
        fs::write(vector_path(temp.path()), &bytes).unwrap();

        assert!(matches!(
            VectorIndex::load(temp.path()),
            Err(AppError::ArtifactCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_build_batches_and_merges() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(64));

        let topics = [
            "alpine climbing", "bread baking", "carburetor repair", "dahlia gardening",
            "espresso brewing", "fly fishing", "glass blowing",
        ];
        let candidates: Vec<ChunkRecord> = topics
            .iter()
            .enumerate()
            .map(|(i, topic)| record("/kb/doc.txt", i as u32, &format!("a section about {}", topic)))
            .collect();

        // batch_size 3 forces three batches through the merge path
        let index = VectorIndex::build(Arc::clone(&provider), candidates, 3, 2)
            .await
            .unwrap();

        assert_eq!(index.len(), 7);
        assert_eq!(index.dimensions(), 64);

        let query = provider.embed("a section about dahlia gardening").await.unwrap();
        let results = index.search(&query, 2).unwrap();
        assert_eq!(results[0].0.position, 3);
    }

    #[tokio::test]
    async fn test_build_empty_candidates_gives_empty_index() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(64));
        let index = VectorIndex::build(provider, Vec::new(), 100, 2).await.unwrap();
        assert!(index.is_empty());
    }
}

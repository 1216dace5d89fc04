//! Embedding generation as a swappable capability.
//!
//! The lifecycle manager consumes embeddings through the
//! [`EmbeddingProvider`] trait; concrete backends live in `providers`.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

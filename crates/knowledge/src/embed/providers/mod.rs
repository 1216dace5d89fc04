//! Concrete embedding backends.

pub mod ollama;
pub mod trigram;

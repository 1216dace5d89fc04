//! Rebuild command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{KnowledgeService, RebuildOutcome};

/// Force a full index rebuild
#[derive(Args, Debug)]
pub struct RebuildCommand {}

impl RebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::from_workspace(&config.workspace)?;

        match service.rebuild().await {
            RebuildOutcome::Rebuilt { stats } => {
                println!(
                    "Rebuilt index: {} documents, {} chunks, {} bytes in {:.2}s",
                    stats.documents_count,
                    stats.chunks_count,
                    stats.bytes_processed,
                    stats.duration_secs
                );
            }
            RebuildOutcome::InProgress => {
                println!("A rebuild is already in progress, try again later");
            }
            RebuildOutcome::Failed { code, message } => {
                println!("Rebuild failed ({}): {}", code, message);
            }
        }

        Ok(())
    }
}

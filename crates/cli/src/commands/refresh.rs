//! Refresh command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{KnowledgeService, RefreshOutcome};

/// Detect source changes and rebuild if needed
#[derive(Args, Debug)]
pub struct RefreshCommand {}

impl RefreshCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::from_workspace(&config.workspace)?;

        match service.refresh().await {
            RefreshOutcome::NoChanges => {
                println!("No changes detected");
            }
            RefreshOutcome::BelowThreshold { changed } => {
                println!(
                    "{} changed file(s), below the rebuild threshold of {}",
                    changed,
                    service.config().rebuild_threshold
                );
            }
            RefreshOutcome::Rebuilt {
                new_files,
                deleted_files,
                stats,
            } => {
                for file in &new_files {
                    println!("  + {}", file.display());
                }
                for file in &deleted_files {
                    println!("  - {}", file.display());
                }
                println!(
                    "Rebuilt index: {} documents, {} chunks in {:.2}s",
                    stats.documents_count, stats.chunks_count, stats.duration_secs
                );
            }
            RefreshOutcome::InProgress => {
                println!("A rebuild is already in progress, try again later");
            }
            RefreshOutcome::Failed { code, message } => {
                println!("Refresh failed ({}): {}", code, message);
            }
        }

        Ok(())
    }
}

//! Health command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::KnowledgeService;

/// Check durable index artifact health
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::from_workspace(&config.workspace)?;
        let report = service.check_health();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if report.healthy {
            println!("healthy");
        } else {
            println!("unhealthy:");
            for issue in &report.issues {
                println!("  - {}", issue);
            }
        }

        Ok(())
    }
}

//! Status command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::KnowledgeService;

/// Show service status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Initialize the service first (acquire provider, load or build index)
    #[arg(long)]
    pub init: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::from_workspace(&config.workspace)?;

        if self.init {
            service.initialize().await;
        }

        let status = service.status();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!("state:       {}", status.state);
            println!("initialized: {}", status.initialized);
            println!("available:   {}", status.available);
            println!("index path:  {}", status.index_path.display());
        }

        Ok(())
    }
}

//! Enhance command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::KnowledgeService;

/// Print the augmented prompt for a query
#[derive(Args, Debug)]
pub struct EnhanceCommand {
    /// Query text
    pub query: String,
}

impl EnhanceCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::from_workspace(&config.workspace)?;
        service.initialize().await;

        // enhance never fails; an unavailable index yields a pass-through
        // prompt rather than an error
        let prompt = service.enhance(&self.query).await;
        println!("{}", prompt);

        Ok(())
    }
}

//! Search command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::KnowledgeService;

/// Search the index for similar chunks
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<u32>,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = KnowledgeService::from_workspace(&config.workspace)?;
        service.initialize().await;

        if !service.is_available() {
            println!("Knowledge index unavailable ({})", service.state().as_str());
            return Ok(());
        }

        let top_k = self.top_k.unwrap_or(service.config().top_k) as usize;
        let results = service.search(&self.query, top_k).await?;

        if results.is_empty() {
            println!("No results");
            return Ok(());
        }

        for (i, (chunk, score)) in results.iter().enumerate() {
            println!(
                "{}. [{:.3}] {}#{}",
                i + 1,
                score,
                chunk.source,
                chunk.position
            );
            println!("   {}", chunk.text.replace('\n', " "));
        }

        Ok(())
    }
}

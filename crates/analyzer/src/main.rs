//! Feedback analyzer
//!
//! Batch NLP analysis of user-feedback comments:
//! 1. Reads feedback rows from the source table
//! 2. Sends them to the analysis service in concurrent document batches
//! 3. Reassembles and merges the per-segment results
//! 4. Writes the document/sentence/entity/relation/full tables

mod batcher;
mod dispatcher;
mod errors;
mod output;
mod processor;
mod projector;
mod record;

use crate::processor::AnalysisProcessor;
use feedback_common::client::GeneeaClient;
use feedback_common::config::AppConfig;
use feedback_common::VERSION;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting feedback analyzer v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    config.validate()?;
    let config = Arc::new(config);

    info!(
        endpoint = config.endpoint(),
        doc_batch_size = config.analysis.doc_batch_size,
        worker_count = config.analysis.worker_count,
        "Configuration loaded"
    );

    let client = GeneeaClient::new(
        config.endpoint().to_string(),
        config.user_key()?.to_string(),
        config.api.timeout_secs,
        config.api.max_retries,
    );

    let processor = AnalysisProcessor::new(Arc::clone(&config), Arc::new(client));
    let summary = processor.run().await.map_err(|e| {
        error!(error = %e, "Analysis run failed");
        e
    })?;

    info!(
        documents = summary.documents,
        characters = summary.characters,
        "Feedback analyzer finished"
    );
    Ok(())
}

//! Pipeline orchestration
//!
//! Wires the row batcher, the concurrent batch dispatcher and the record
//! reassembly together, draining batch results one at a time into the
//! output tables. Everything downstream of dispatch runs on this single
//! consuming side, so the writers are never touched concurrently.

use crate::batcher::{Row, RowBatcher};
use crate::dispatcher::dispatch;
use crate::errors::PipelineError;
use crate::output::{write_manifests, write_usage, TableWriters};
use crate::projector::TableProjector;
use crate::record::{assemble_records, FeedbackTypes};
use feedback_common::analysis::RequestTemplate;
use feedback_common::client::Analyzer;
use feedback_common::config::AppConfig;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Usage snapshot and progress-log interval, in documents
const USAGE_INTERVAL: u64 = 1000;

/// Totals of a clean run
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub documents: u64,
    pub characters: u64,
}

/// The feedback analysis pipeline
pub struct AnalysisProcessor {
    config: Arc<AppConfig>,
    analyzer: Arc<dyn Analyzer>,
}

impl AnalysisProcessor {
    pub fn new(config: Arc<AppConfig>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self { config, analyzer }
    }

    /// Verify the source table contains every configured column
    ///
    /// Checks a single sample row; an empty source table is allowed and
    /// only logged.
    #[instrument(skip(self))]
    pub fn validate_input(&self) -> Result<(), PipelineError> {
        let mut reader = csv::Reader::from_path(self.config.io.source_table_path())?;
        let mut rows = reader.deserialize::<Row>();
        let row = match rows.next() {
            Some(row) => row?,
            None => {
                warn!("could not read any data from the source table");
                return Ok(());
            }
        };

        let columns = &self.config.columns;
        for column in columns
            .id
            .iter()
            .chain(&columns.text)
            .chain(&columns.positives)
            .chain(&columns.negatives)
        {
            if !row.contains_key(column) {
                return Err(PipelineError::MissingColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    fn request_template(&self) -> Result<RequestTemplate, PipelineError> {
        let api = &self.config.api;
        Ok(RequestTemplate {
            customer_id: self.config.customer_id()?.to_string(),
            correction: api.correction.clone(),
            diacritization: api.diacritization.clone(),
            language: api.language.clone(),
            domain: api.domain.clone(),
            reference_date: api.reference_date.clone(),
        })
    }

    /// Run the full analysis pipeline
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        info!("starting NLP analysis of user-feedback comments");
        self.validate_input()?;

        let worker_count = self.config.analysis.worker_count;
        let template = Arc::new(self.request_template()?);
        let types = FeedbackTypes {
            entities: self.config.feedback_entity_types(),
            relations: self.config.feedback_relation_types(),
        };
        let projector = TableProjector::new(self.config.columns.id.clone());
        let out_dir = self.config.io.output_dir();
        let usage_path = self.config.io.usage_path();
        let mut writers = TableWriters::create(&out_dir, &projector)?;

        let reader = csv::Reader::from_path(self.config.io.source_table_path())?;
        let batcher = RowBatcher::new(
            self.config.columns.clone(),
            self.config.analysis.doc_batch_size,
        );
        let batches = batcher
            .batches(reader.into_deserialize::<Row>())
            .map(|batch| batch.map_err(PipelineError::from));

        let results = dispatch(batches, Arc::clone(&self.analyzer), template, worker_count);
        futures::pin_mut!(results);

        let mut doc_count: u64 = 0;
        let mut used_chars: u64 = 0;
        while let Some(batch_analysis) = results.next().await {
            for record in assemble_records(batch_analysis?, &types)? {
                writers.write_record(&projector, &record)?;

                doc_count += 1;
                used_chars += record.analysis.used_chars;
                if doc_count % USAGE_INTERVAL == 0 {
                    write_usage(&usage_path, doc_count, used_chars, worker_count)?;
                    info!(doc_count, used_chars, "successfully analyzed documents");
                }
            }
        }

        writers.flush()?;
        write_usage(&usage_path, doc_count, used_chars, worker_count)?;
        write_manifests(&out_dir, projector.id_cols())?;

        info!(
            doc_count,
            used_chars, "the analysis has finished successfully"
        );
        Ok(RunSummary {
            documents: doc_count,
            characters: used_chars,
        })
    }
}

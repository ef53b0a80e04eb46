//! Batch dispatch
//!
//! Sends document batches to the analysis service over a bounded pool of
//! concurrent in-flight requests. Batches enter the pool in submission
//! order; results surface in completion order, so output tables are only
//! batch-interleaved, never reordered within a batch. Dropping the stream
//! after the first failure cancels outstanding requests.

use crate::errors::PipelineError;
use feedback_common::analysis::{Analysis, Document, RequestTemplate};
use feedback_common::client::Analyzer;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;

/// Turn the batch sequence into a stream of per-batch analysis results
pub fn dispatch<I>(
    batches: I,
    analyzer: Arc<dyn Analyzer>,
    template: Arc<RequestTemplate>,
    worker_count: usize,
) -> impl Stream<Item = Result<Vec<Analysis>, PipelineError>>
where
    I: IntoIterator<Item = Result<Vec<Document>, PipelineError>>,
{
    stream::iter(batches)
        .map(move |batch| {
            let analyzer = Arc::clone(&analyzer);
            let template = Arc::clone(&template);
            async move {
                let batch = batch?;
                let request = template.with_documents(batch);
                let analyses = analyzer.analyze(&request).await?;
                Ok(analyses)
            }
        })
        .buffer_unordered(worker_count.max(1))
}

//! Row batching
//!
//! Expands source rows into per-segment analysis documents and slices the
//! document stream into fixed-size request batches. Batches are cut
//! strictly by document count, so one row's documents may straddle a batch
//! boundary; reassembly is keyed by the correlation token, not by
//! proximity within a batch.

use feedback_common::analysis::{DocType, Document};
use feedback_common::config::ColumnConfig;
use std::collections::{HashMap, VecDeque};

/// One source row, keyed by header name
pub type Row = HashMap<String, String>;

/// Expands rows into documents according to the configured column groups
#[derive(Debug, Clone)]
pub struct RowBatcher {
    columns: ColumnConfig,
    batch_size: usize,
}

impl RowBatcher {
    pub fn new(columns: ColumnConfig, batch_size: usize) -> Self {
        Self {
            columns,
            batch_size: batch_size.max(1),
        }
    }

    /// Newline-pair join of the non-empty values of `cols`, in configured order
    fn join_columns(row: &Row, cols: &[String]) -> String {
        cols.iter()
            .filter_map(|col| row.get(col))
            .filter(|value| !value.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Expand one row into its analysis documents
    ///
    /// The main text document is always emitted; positive/negative
    /// documents only when their column group is configured and joins to a
    /// non-empty text.
    pub fn row_to_docs(&self, row: &Row) -> Vec<Document> {
        let ids: Vec<String> = self
            .columns
            .id
            .iter()
            .map(|col| row.get(col).cloned().unwrap_or_default())
            .collect();

        let mut docs = vec![Document::new(
            DocType::Txt,
            &ids,
            Self::join_columns(row, &self.columns.text),
        )];
        if !self.columns.positives.is_empty() {
            let body = Self::join_columns(row, &self.columns.positives);
            if !body.is_empty() {
                docs.push(Document::new(DocType::Pos, &ids, body));
            }
        }
        if !self.columns.negatives.is_empty() {
            let body = Self::join_columns(row, &self.columns.negatives);
            if !body.is_empty() {
                docs.push(Document::new(DocType::Neg, &ids, body));
            }
        }
        docs
    }

    /// Lazily slice a fallible row stream into document batches
    pub fn batches<I, E>(self, rows: I) -> BatchStream<I::IntoIter, E>
    where
        I: IntoIterator<Item = Result<Row, E>>,
    {
        BatchStream {
            batcher: self,
            rows: rows.into_iter(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

/// Iterator over document batches of at most `batch_size` documents
pub struct BatchStream<I, E>
where
    I: Iterator<Item = Result<Row, E>>,
{
    batcher: RowBatcher,
    rows: I,
    pending: VecDeque<Document>,
    done: bool,
}

impl<I, E> Iterator for BatchStream<I, E>
where
    I: Iterator<Item = Result<Row, E>>,
{
    type Item = Result<Vec<Document>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.pending.len() < self.batcher.batch_size {
            match self.rows.next() {
                Some(Ok(row)) => self.pending.extend(self.batcher.row_to_docs(&row)),
                Some(Err(e)) => {
                    // a row error is fatal; drop anything buffered
                    self.done = true;
                    self.pending.clear();
                    return Some(Err(e));
                }
                None => self.done = true,
            }
        }
        if self.pending.is_empty() {
            return None;
        }
        let take = self.batcher.batch_size.min(self.pending.len());
        Some(Ok(self.pending.drain(..take).collect()))
    }
}

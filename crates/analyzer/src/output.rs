//! Output sinks
//!
//! CSV table writers, per-table manifest metadata, and the usage snapshot.
//! The five tables share one single-consumer funnel: rows are appended
//! only from the orchestrating side, one record at a time.

use crate::errors::PipelineError;
use crate::projector::TableProjector;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub const DOC_TABLE: &str = "analysis-result-comments.csv";
pub const SNT_TABLE: &str = "analysis-result-sentences.csv";
pub const ENT_TABLE: &str = "analysis-result-entities.csv";
pub const REL_TABLE: &str = "analysis-result-relations.csv";
pub const FULL_TABLE: &str = "analysis-result-full.csv";

const DESC_KEY: &str = "KBC.description";

const DOC_META: &str = include_str!("../meta/documents-tab.json");
const SNT_META: &str = include_str!("../meta/sentences-tab.json");
const ENT_META: &str = include_str!("../meta/entities-tab.json");
const REL_META: &str = include_str!("../meta/relations-tab.json");
const FULL_META: &str = include_str!("../meta/full-tab.json");

/// The five output table writers
pub struct TableWriters<W: Write> {
    documents: csv::Writer<W>,
    sentences: csv::Writer<W>,
    entities: csv::Writer<W>,
    relations: csv::Writer<W>,
    full: csv::Writer<W>,
}

impl TableWriters<File> {
    /// Create the output tables under `dir` and write their headers
    pub fn create(dir: &Path, projector: &TableProjector) -> Result<Self, PipelineError> {
        fs::create_dir_all(dir)?;
        Self::from_writers(
            File::create(dir.join(DOC_TABLE))?,
            File::create(dir.join(SNT_TABLE))?,
            File::create(dir.join(ENT_TABLE))?,
            File::create(dir.join(REL_TABLE))?,
            File::create(dir.join(FULL_TABLE))?,
            projector,
        )
    }
}

impl<W: Write> TableWriters<W> {
    /// Wrap writers for the five tables and write their headers
    pub fn from_writers(
        documents: W,
        sentences: W,
        entities: W,
        relations: W,
        full: W,
        projector: &TableProjector,
    ) -> Result<Self, PipelineError> {
        let mut writers = Self {
            documents: csv::Writer::from_writer(documents),
            sentences: csv::Writer::from_writer(sentences),
            entities: csv::Writer::from_writer(entities),
            relations: csv::Writer::from_writer(relations),
            full: csv::Writer::from_writer(full),
        };
        writers.documents.write_record(projector.document_fields())?;
        writers.sentences.write_record(projector.sentence_fields())?;
        writers.entities.write_record(projector.entity_fields())?;
        writers.relations.write_record(projector.relation_fields())?;
        writers.full.write_record(projector.full_fields())?;
        Ok(writers)
    }

    /// Project one merged record into all five tables
    pub fn write_record(
        &mut self,
        projector: &TableProjector,
        record: &Record,
    ) -> Result<(), PipelineError> {
        self.documents.write_record(projector.document_row(record))?;
        for row in projector.sentence_rows(record) {
            self.sentences.write_record(row)?;
        }
        for row in projector.entity_rows(record) {
            self.entities.write_record(row)?;
        }
        for row in projector.relation_rows(record) {
            self.relations.write_record(row)?;
        }
        self.full.write_record(projector.full_row(record)?)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.documents.flush()?;
        self.sentences.flush()?;
        self.entities.flush()?;
        self.relations.flush()?;
        self.full.flush()?;
        Ok(())
    }

    /// Consume the writers and hand back the underlying sinks
    pub fn into_inner(self) -> Result<(W, W, W, W, W), PipelineError> {
        let unwrap = |w: csv::Writer<W>| w.into_inner().map_err(|e| e.into_error());
        Ok((
            unwrap(self.documents)?,
            unwrap(self.sentences)?,
            unwrap(self.entities)?,
            unwrap(self.relations)?,
            unwrap(self.full)?,
        ))
    }
}

/// Static description template of one output table
#[derive(Debug, Deserialize)]
struct TableMeta {
    #[serde(default)]
    description: String,
    #[serde(default)]
    columns_description: serde_json::Map<String, serde_json::Value>,
}

/// Write the `.manifest` companion of every output table
pub fn write_manifests(dir: &Path, id_cols: &[String]) -> Result<(), PipelineError> {
    let ids: Vec<String> = id_cols.to_vec();
    let with_ids = |extra: &[&str]| -> Vec<String> {
        let mut key = ids.clone();
        key.extend(extra.iter().map(|s| s.to_string()));
        key
    };

    write_manifest(dir, DOC_TABLE, DOC_META, &ids, id_cols)?;
    write_manifest(dir, SNT_TABLE, SNT_META, &with_ids(&["index"]), id_cols)?;
    write_manifest(dir, ENT_TABLE, ENT_META, &with_ids(&["type", "text"]), id_cols)?;
    write_manifest(
        dir,
        REL_TABLE,
        REL_META,
        &with_ids(&["type", "name", "negated", "subject", "object"]),
        id_cols,
    )?;
    write_manifest(dir, FULL_TABLE, FULL_META, &ids, id_cols)?;
    Ok(())
}

fn write_manifest(
    dir: &Path,
    table: &str,
    meta_json: &str,
    primary_key: &[String],
    id_cols: &[String],
) -> Result<(), PipelineError> {
    let meta: TableMeta = serde_json::from_str(meta_json)?;

    let mut column_metadata = serde_json::Map::new();
    for id_col in id_cols {
        column_metadata.insert(
            id_col.clone(),
            serde_json::json!([{
                "key": DESC_KEY,
                "value": format!("ID column \"{id_col}\" (primary key)"),
            }]),
        );
    }
    for (column, description) in meta.columns_description {
        column_metadata.insert(
            column,
            serde_json::json!([{ "key": DESC_KEY, "value": description }]),
        );
    }

    let manifest = serde_json::json!({
        "primary_key": primary_key,
        "incremental": true,
        "metadata": [{ "key": DESC_KEY, "value": meta.description }],
        "column_metadata": column_metadata,
    });

    let path = dir.join(format!("{table}.manifest"));
    serde_json::to_writer_pretty(File::create(path)?, &manifest)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct UsageMetric {
    metric: &'static str,
    value: u64,
}

/// Snapshot the usage counters, overwriting any previous snapshot
pub fn write_usage(
    path: &Path,
    doc_count: u64,
    used_chars: u64,
    worker_count: usize,
) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let metrics = [
        UsageMetric {
            metric: "documents",
            value: doc_count,
        },
        UsageMetric {
            metric: "characters",
            value: used_chars,
        },
        UsageMetric {
            metric: "processing_threads",
            value: worker_count as u64,
        },
    ];
    serde_json::to_writer_pretty(File::create(path)?, &metrics)?;
    Ok(())
}

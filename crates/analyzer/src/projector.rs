//! Table projection
//!
//! Maps a merged record onto the five flat output tables. Column sets are
//! fixed for the whole run: the configured id columns come first, followed
//! by the table's own fields, and absent optional values project as empty
//! cells rather than being omitted.

use crate::errors::PipelineError;
use crate::record::Record;
use feedback_common::analysis::{section_for_segment, Sentiment};

const SENTIMENT_FIELDS: [&str; 3] = ["sentimentValue", "sentimentPolarity", "sentimentLabel"];

/// Stateless projection of merged records into table rows
#[derive(Debug, Clone)]
pub struct TableProjector {
    id_cols: Vec<String>,
}

impl TableProjector {
    pub fn new(id_cols: Vec<String>) -> Self {
        Self { id_cols }
    }

    pub fn id_cols(&self) -> &[String] {
        &self.id_cols
    }

    pub fn document_fields(&self) -> Vec<String> {
        let mut fields = self.id_cols.clone();
        fields.push("language".into());
        fields.extend(SENTIMENT_FIELDS.map(String::from));
        fields.push("usedChars".into());
        fields
    }

    pub fn sentence_fields(&self) -> Vec<String> {
        let mut fields = self.id_cols.clone();
        fields.extend(["index", "segment", "text"].map(String::from));
        fields.extend(SENTIMENT_FIELDS.map(String::from));
        fields
    }

    pub fn entity_fields(&self) -> Vec<String> {
        let mut fields = self.id_cols.clone();
        fields.extend(["type", "text", "score", "entityUid"].map(String::from));
        fields.extend(SENTIMENT_FIELDS.map(String::from));
        fields
    }

    pub fn relation_fields(&self) -> Vec<String> {
        let mut fields = self.id_cols.clone();
        fields.extend(["type", "name", "negated"].map(String::from));
        fields.extend(
            ["subject", "object", "subjectType", "objectType", "subjectUid", "objectUid"]
                .map(String::from),
        );
        fields.extend(SENTIMENT_FIELDS.map(String::from));
        fields
    }

    pub fn full_fields(&self) -> Vec<String> {
        let mut fields = self.id_cols.clone();
        fields.push("binaryData".into());
        fields
    }

    /// The single document-level row of a record
    pub fn document_row(&self, record: &Record) -> Vec<String> {
        let mut row = record.ids.clone();
        row.push(opt_cell(&record.analysis.language));
        row.extend(sentiment_cells(&record.analysis.sentiment));
        row.push(record.analysis.used_chars.to_string());
        row
    }

    /// One row per sentence, indexed in merged order
    pub fn sentence_rows(&self, record: &Record) -> Vec<Vec<String>> {
        record
            .analysis
            .sentences
            .iter()
            .enumerate()
            .map(|(index, sentence)| {
                let mut row = record.ids.clone();
                row.push(index.to_string());
                row.push(section_for_segment(&sentence.segment).to_string());
                row.push(sentence.text.clone());
                row.extend(sentiment_cells(&sentence.sentiment));
                row
            })
            .collect()
    }

    /// One row per entity, split copies included
    pub fn entity_rows(&self, record: &Record) -> Vec<Vec<String>> {
        record
            .analysis
            .entities
            .iter()
            .map(|entity| {
                let mut row = record.ids.clone();
                row.push(entity.entity_type.clone());
                row.push(entity.text.clone());
                row.push(entity.score.to_string());
                row.push(opt_cell(&entity.uid));
                row.extend(sentiment_cells(&entity.sentiment));
                row
            })
            .collect()
    }

    /// One row per relation, split copies included
    pub fn relation_rows(&self, record: &Record) -> Vec<Vec<String>> {
        record
            .analysis
            .relations
            .iter()
            .map(|relation| {
                let mut row = record.ids.clone();
                row.push(relation.relation_type.clone());
                row.push(relation.name.clone());
                row.push(relation.negated.to_string());
                row.push(opt_cell(&relation.subject_name));
                row.push(opt_cell(&relation.object_name));
                row.push(opt_cell(&relation.subject_type));
                row.push(opt_cell(&relation.object_type));
                row.push(opt_cell(&relation.subject_uid));
                row.push(opt_cell(&relation.object_uid));
                row.extend(sentiment_cells(&relation.sentiment));
                row
            })
            .collect()
    }

    /// The raw serialized analysis of a record
    pub fn full_row(&self, record: &Record) -> Result<Vec<String>, PipelineError> {
        let mut row = record.ids.clone();
        row.push(serde_json::to_string(&record.analysis)?);
        Ok(row)
    }
}

fn opt_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn sentiment_cells(sentiment: &Option<Sentiment>) -> [String; 3] {
    match sentiment {
        Some(s) => [s.value.to_string(), s.polarity.to_string(), s.label.clone()],
        None => Default::default(),
    }
}

//! Wire data model for the NLP analysis service
//!
//! Request and response types exchanged with the batch analysis endpoint,
//! plus the correlation-token scheme mapping each returned analysis back to
//! its originating row and segment. The service echoes every document id
//! unmodified, so the token only has to be a lossless encoding of the
//! (doc-type, id values) pair.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Document segment kind, encoded into the correlation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    /// Main feedback text
    Txt,
    /// "What did you like" text
    Pos,
    /// "What did you dislike" text
    Neg,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Txt => "txt",
            DocType::Pos => "pos",
            DocType::Neg => "neg",
        }
    }

    /// The request/response field carrying this document's text
    pub fn segment(&self) -> &'static str {
        match self {
            DocType::Txt => "text",
            DocType::Pos => "title",
            DocType::Neg => "lead",
        }
    }

    pub fn parse(s: &str) -> Option<DocType> {
        match s {
            "txt" => Some(DocType::Txt),
            "pos" => Some(DocType::Pos),
            "neg" => Some(DocType::Neg),
            _ => None,
        }
    }
}

/// Output-table section label for an API segment name
///
/// Unknown labels pass through unchanged rather than aborting the run.
pub fn section_for_segment(segment: &str) -> &str {
    match segment {
        "text" => "text",
        "title" => "positives",
        "lead" => "negatives",
        other => other,
    }
}

/// Encode a (doc-type, id values) pair into a correlation token
///
/// The token is a JSON array `[doc_type, id_1, .., id_n]`, lossless for
/// arbitrary id strings.
pub fn encode_doc_id(doc_type: DocType, ids: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(ids.len() + 1);
    parts.push(doc_type.as_str());
    parts.extend(ids.iter().map(|s| s.as_str()));
    serde_json::to_string(&parts).expect("string arrays always serialize")
}

/// Decode a correlation token back into its (doc-type, id values) pair
pub fn decode_doc_id(token: &str) -> Result<(DocType, Vec<String>)> {
    let corrupt = || AppError::CorruptDocumentId {
        token: token.to_string(),
    };
    let mut parts: Vec<String> = serde_json::from_str(token).map_err(|_| corrupt())?;
    if parts.is_empty() {
        return Err(corrupt());
    }
    let doc_type = DocType::parse(&parts.remove(0)).ok_or_else(corrupt)?;
    Ok((doc_type, parts))
}

/// Encode the bare id values of a merged record
pub fn encode_record_id(ids: &[String]) -> String {
    serde_json::to_string(ids).expect("string arrays always serialize")
}

/// Sentiment of a document, sentence, entity or relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub value: f64,
    pub polarity: f64,
    pub label: String,
}

/// One sentence of an analyzed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub segment: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

/// An extracted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Opaque mention payloads, carried through and concatenated on merge
    #[serde(default)]
    pub mentions: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

/// An extracted relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    #[serde(rename = "type")]
    pub relation_type: String,
    pub name: String,
    pub negated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_uid: Option<String>,
    pub support: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

/// The service's response for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Echoed correlation token; reset to the bare record id after merging
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub used_chars: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

/// One text unit submitted for analysis
///
/// Exactly one of the segment fields is set, selected by the doc-type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,
}

impl Document {
    pub fn new(doc_type: DocType, ids: &[String], body: String) -> Self {
        let mut doc = Document {
            id: encode_doc_id(doc_type, ids),
            text: None,
            title: None,
            lead: None,
        };
        match doc_type {
            DocType::Txt => doc.text = Some(body),
            DocType::Pos => doc.title = Some(body),
            DocType::Neg => doc.lead = Some(body),
        }
        doc
    }

    /// The segment text of this document
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .or(self.title.as_deref())
            .or(self.lead.as_deref())
            .unwrap_or_default()
    }

    /// The segment field name this document's text is carried in
    pub fn segment(&self) -> &'static str {
        if self.text.is_some() {
            "text"
        } else if self.title.is_some() {
            "title"
        } else {
            "lead"
        }
    }
}

/// One batch analysis request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub customer_id: String,
    pub correction: String,
    pub diacritization: String,
    pub return_mentions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<String>,
    pub documents: Vec<Document>,
}

/// Read-only request template shared by all workers
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub customer_id: String,
    pub correction: String,
    pub diacritization: String,
    pub language: Option<String>,
    pub domain: Option<String>,
    pub reference_date: Option<String>,
}

impl RequestTemplate {
    pub fn with_documents(&self, documents: Vec<Document>) -> AnalysisRequest {
        AnalysisRequest {
            customer_id: self.customer_id.clone(),
            correction: self.correction.clone(),
            diacritization: self.diacritization.clone(),
            return_mentions: true,
            language: self.language.clone(),
            domain: self.domain.clone(),
            reference_date: self.reference_date.clone(),
            documents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_round_trip() {
        let ids = vec!["42".to_string(), "store-7".to_string()];
        let token = encode_doc_id(DocType::Pos, &ids);
        let (doc_type, decoded) = decode_doc_id(&token).unwrap();
        assert_eq!(doc_type, DocType::Pos);
        assert_eq!(decoded, ids);
    }

    #[test]
    fn test_doc_id_round_trip_hostile_values() {
        // id values containing JSON syntax, quotes and unicode must survive
        let ids = vec![
            "a,\"b\"".to_string(),
            "[\"txt\",\"x\"]".to_string(),
            "příliš žluťoučký".to_string(),
            "".to_string(),
        ];
        let token = encode_doc_id(DocType::Neg, &ids);
        let (doc_type, decoded) = decode_doc_id(&token).unwrap();
        assert_eq!(doc_type, DocType::Neg);
        assert_eq!(decoded, ids);
    }

    #[test]
    fn test_doc_id_no_collision_across_types() {
        let ids = vec!["1".to_string()];
        assert_ne!(
            encode_doc_id(DocType::Txt, &ids),
            encode_doc_id(DocType::Pos, &ids)
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_doc_id("not json").is_err());
        assert!(decode_doc_id("[]").is_err());
        assert!(decode_doc_id("[\"bogus\",\"1\"]").is_err());
    }

    #[test]
    fn test_document_segment_selection() {
        let ids = vec!["1".to_string()];
        let doc = Document::new(DocType::Neg, &ids, "too slow".into());
        assert!(doc.text.is_none());
        assert!(doc.title.is_none());
        assert_eq!(doc.lead.as_deref(), Some("too slow"));
        assert_eq!(doc.segment(), "lead");
        assert_eq!(doc.body(), "too slow");
    }

    #[test]
    fn test_section_labels() {
        assert_eq!(section_for_segment("text"), "text");
        assert_eq!(section_for_segment("title"), "positives");
        assert_eq!(section_for_segment("lead"), "negatives");
        assert_eq!(section_for_segment("summary"), "summary");
    }

    #[test]
    fn test_request_serialization() {
        let template = RequestTemplate {
            customer_id: "1234".into(),
            correction: "AGGRESSIVE".into(),
            diacritization: "yes".into(),
            language: None,
            domain: Some("hotels".into()),
            reference_date: None,
        };
        let request =
            template.with_documents(vec![Document::new(DocType::Txt, &["7".into()], "ok".into())]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["customerId"], "1234");
        assert_eq!(value["returnMentions"], true);
        assert_eq!(value["domain"], "hotels");
        assert!(value.get("language").is_none());
        assert!(value.get("referenceDate").is_none());
        assert_eq!(value["documents"][0]["text"], "ok");
        assert!(value["documents"][0].get("title").is_none());
    }

    #[test]
    fn test_analysis_deserialization() {
        let raw = r#"{
            "id": "[\"txt\",\"7\"]",
            "language": "en",
            "usedChars": 13,
            "text": "Great service",
            "sentences": [
                {"segment": "text", "text": "Great service",
                 "sentiment": {"value": 0.8, "polarity": 1.0, "label": "positive"}}
            ],
            "entities": [
                {"type": "service", "text": "service", "score": 0.9,
                 "uid": "E1", "mentions": [{"text": "service"}]}
            ],
            "relations": [
                {"type": "ATTR", "name": "great", "negated": false,
                 "subjectName": "service", "support": 1.0}
            ],
            "sentiment": {"value": 0.8, "polarity": 1.0, "label": "positive"}
        }"#;
        let analysis: Analysis = serde_json::from_str(raw).unwrap();
        assert_eq!(analysis.used_chars, 13);
        assert_eq!(analysis.entities[0].entity_type, "service");
        assert_eq!(analysis.relations[0].subject_name.as_deref(), Some("service"));
        assert!(analysis.relations[0].object_name.is_none());
        assert_eq!(analysis.sentences[0].sentiment.as_ref().unwrap().polarity, 1.0);
    }

    #[test]
    fn test_analysis_defaults_for_missing_lists() {
        let raw = r#"{"id": "[\"txt\",\"7\"]", "usedChars": 2}"#;
        let analysis: Analysis = serde_json::from_str(raw).unwrap();
        assert!(analysis.sentences.is_empty());
        assert!(analysis.entities.is_empty());
        assert!(analysis.relations.is_empty());
        assert!(analysis.sentiment.is_none());
    }
}

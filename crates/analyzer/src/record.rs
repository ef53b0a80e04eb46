//! Record reassembly and merging
//!
//! Groups one batch's analyses back into per-row records, applies the
//! polarity split to feedback entities and relations, and folds the
//! positive/negative segment analyses into the base text analysis. All
//! state is scoped to a single batch; record ids never span batches.

use crate::errors::PipelineError;
use feedback_common::analysis::{
    decode_doc_id, encode_record_id, Analysis, DocType, Entity, Relation,
};
use std::collections::{HashMap, HashSet};

/// A reassembled row: the merged analysis plus its decoded id values
#[derive(Debug, Clone)]
pub struct Record {
    pub ids: Vec<String>,
    pub analysis: Analysis,
}

/// Entity/relation types qualifying for the polarity split
#[derive(Debug, Clone, Default)]
pub struct FeedbackTypes {
    pub entities: HashSet<String>,
    pub relations: HashSet<String>,
}

#[derive(Debug, Default)]
struct SegmentAnalyses {
    txt: Option<Analysis>,
    pos: Option<Analysis>,
    neg: Option<Analysis>,
}

/// Reassemble one batch's analyses into merged records
///
/// Records are yielded in order of first appearance within the batch. A
/// record without a text-segment analysis breaks the batcher's contract
/// and fails the run.
pub fn assemble_records(
    batch: Vec<Analysis>,
    types: &FeedbackTypes,
) -> Result<Vec<Record>, PipelineError> {
    let mut groups: Vec<(Vec<String>, SegmentAnalyses)> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for analysis in batch {
        let (doc_type, ids) = decode_doc_id(&analysis.id)?;
        let at = *index.entry(ids.clone()).or_insert_with(|| {
            groups.push((ids, SegmentAnalyses::default()));
            groups.len() - 1
        });
        let segments = &mut groups[at].1;
        match doc_type {
            DocType::Txt => segments.txt = Some(analysis),
            DocType::Pos => segments.pos = Some(analysis),
            DocType::Neg => segments.neg = Some(analysis),
        }
    }

    groups
        .into_iter()
        .map(|(ids, segments)| merge_record(ids, segments, types))
        .collect()
}

fn merge_record(
    ids: Vec<String>,
    segments: SegmentAnalyses,
    types: &FeedbackTypes,
) -> Result<Record, PipelineError> {
    let mut target = segments.txt.ok_or_else(|| PipelineError::MissingTextSegment {
        record: encode_record_id(&ids),
    })?;
    target.id = encode_record_id(&ids);

    split_by_polarity(&mut target, DocType::Txt, types);
    if let Some(mut pos) = segments.pos {
        split_by_polarity(&mut pos, DocType::Pos, types);
        fold_segment(&mut target, pos, DocType::Pos);
    }
    if let Some(mut neg) = segments.neg {
        split_by_polarity(&mut neg, DocType::Neg, types);
        fold_segment(&mut target, neg, DocType::Neg);
    }

    Ok(Record {
        ids,
        analysis: target,
    })
}

/// An item that can be duplicated into polarity-suffixed variants
trait PolaritySplit: Clone {
    fn type_name(&self) -> &str;
    fn set_type(&mut self, name: String);
    fn polarity(&self) -> f64;
    fn clear_sentiment(&mut self);
}

impl PolaritySplit for Entity {
    fn type_name(&self) -> &str {
        &self.entity_type
    }
    fn set_type(&mut self, name: String) {
        self.entity_type = name;
    }
    fn polarity(&self) -> f64 {
        self.sentiment.as_ref().map(|s| s.polarity).unwrap_or(0.0)
    }
    fn clear_sentiment(&mut self) {
        self.sentiment = None;
    }
}

impl PolaritySplit for Relation {
    fn type_name(&self) -> &str {
        &self.relation_type
    }
    fn set_type(&mut self, name: String) {
        self.relation_type = name;
    }
    fn polarity(&self) -> f64 {
        self.sentiment.as_ref().map(|s| s.polarity).unwrap_or(0.0)
    }
    fn clear_sentiment(&mut self) {
        self.sentiment = None;
    }
}

/// Append polarity-suffixed copies of the qualifying feedback items
///
/// Positive/negative segments tag every qualifying item with their own
/// polarity; the text segment tags by the sign of the item's sentiment.
/// The sign checks are independent on purpose, even though a scalar
/// polarity can only satisfy one of them. Originals stay in the list
/// unmodified; copies carry no sentiment.
fn split_items<T: PolaritySplit>(items: &mut Vec<T>, doc_type: DocType, types: &HashSet<String>) {
    let qualifying: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| types.contains(item.type_name()))
        .map(|(at, _)| at)
        .collect();

    for at in qualifying {
        let polarity = items[at].polarity();
        if doc_type == DocType::Pos || (doc_type == DocType::Txt && polarity >= 0.0) {
            let mut copy = items[at].clone();
            let suffixed = format!("{}-pos", copy.type_name());
            copy.set_type(suffixed);
            copy.clear_sentiment();
            items.push(copy);
        }
        if doc_type == DocType::Neg || (doc_type == DocType::Txt && polarity < 0.0) {
            let mut copy = items[at].clone();
            let suffixed = format!("{}-neg", copy.type_name());
            copy.set_type(suffixed);
            copy.clear_sentiment();
            items.push(copy);
        }
    }
}

/// Polarity-split the analysis of one document segment
pub fn split_by_polarity(analysis: &mut Analysis, doc_type: DocType, types: &FeedbackTypes) {
    split_items(&mut analysis.entities, doc_type, &types.entities);
    split_items(&mut analysis.relations, doc_type, &types.relations);
}

type EntityKey = (String, String);
type RelationKey = (String, String, bool, Option<String>, Option<String>);

fn entity_key(entity: &Entity) -> EntityKey {
    (entity.entity_type.clone(), entity.text.clone())
}

fn relation_key(relation: &Relation) -> RelationKey {
    (
        relation.relation_type.clone(),
        relation.name.clone(),
        relation.negated,
        relation.subject_name.clone(),
        relation.object_name.clone(),
    )
}

/// Fold a positive/negative segment analysis into the text analysis
///
/// The segment text is copied across, characters add up, sentences
/// concatenate (target first), and entities/relations merge against the
/// keys present in the target before the fold started.
pub fn fold_segment(target: &mut Analysis, source: Analysis, doc_type: DocType) {
    match doc_type {
        DocType::Txt => target.text = source.text.clone(),
        DocType::Pos => target.title = source.title.clone(),
        DocType::Neg => target.lead = source.lead.clone(),
    }
    target.used_chars += source.used_chars;
    target.sentences.extend(source.sentences);

    let by_key: HashMap<EntityKey, usize> = target
        .entities
        .iter()
        .enumerate()
        .map(|(at, e)| (entity_key(e), at))
        .collect();
    for entity in source.entities {
        match by_key.get(&entity_key(&entity)) {
            Some(&at) => {
                let existing = &mut target.entities[at];
                existing.score = existing.score.max(entity.score);
                existing.mentions.extend(entity.mentions);
            }
            None => target.entities.push(entity),
        }
    }

    let by_key: HashMap<RelationKey, usize> = target
        .relations
        .iter()
        .enumerate()
        .map(|(at, r)| (relation_key(r), at))
        .collect();
    for relation in source.relations {
        match by_key.get(&relation_key(&relation)) {
            Some(&at) => target.relations[at].support += relation.support,
            None => target.relations.push(relation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedback_common::analysis::{encode_doc_id, Sentiment};
    use serde_json::json;

    fn analysis(doc_type: DocType, ids: &[&str]) -> Analysis {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        let mut a = Analysis {
            id: encode_doc_id(doc_type, &ids),
            language: Some("en".into()),
            used_chars: 10,
            text: None,
            title: None,
            lead: None,
            sentences: Vec::new(),
            entities: Vec::new(),
            relations: Vec::new(),
            sentiment: None,
        };
        match doc_type {
            DocType::Txt => a.text = Some("t".into()),
            DocType::Pos => a.title = Some("p".into()),
            DocType::Neg => a.lead = Some("n".into()),
        }
        a
    }

    fn entity(entity_type: &str, text: &str, score: f64, polarity: Option<f64>) -> Entity {
        Entity {
            entity_type: entity_type.into(),
            text: text.into(),
            score,
            uid: None,
            mentions: vec![json!({"text": text})],
            sentiment: polarity.map(|polarity| Sentiment {
                value: polarity,
                polarity,
                label: if polarity < 0.0 { "negative" } else { "positive" }.into(),
            }),
        }
    }

    fn relation(relation_type: &str, name: &str, object: Option<&str>, support: f64) -> Relation {
        Relation {
            relation_type: relation_type.into(),
            name: name.into(),
            negated: false,
            subject_name: Some("subject".into()),
            subject_type: None,
            subject_uid: None,
            object_name: object.map(|s| s.to_string()),
            object_type: None,
            object_uid: None,
            support,
            sentiment: None,
        }
    }

    fn feedback_types(entities: &[&str], relations: &[&str]) -> FeedbackTypes {
        FeedbackTypes {
            entities: entities.iter().map(|s| s.to_string()).collect(),
            relations: relations.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_txt_negative_polarity_appends_one_neg_copy() {
        let mut a = analysis(DocType::Txt, &["7"]);
        a.entities.push(entity("service", "wait", 0.5, Some(-0.3)));
        split_by_polarity(&mut a, DocType::Txt, &feedback_types(&["service"], &[]));

        assert_eq!(a.entities.len(), 2);
        // original untouched
        assert_eq!(a.entities[0].entity_type, "service");
        assert!(a.entities[0].sentiment.is_some());
        // exactly one -neg copy, sentiment stripped
        assert_eq!(a.entities[1].entity_type, "service-neg");
        assert!(a.entities[1].sentiment.is_none());
        assert!(!a.entities.iter().any(|e| e.entity_type == "service-pos"));
    }

    #[test]
    fn test_txt_missing_sentiment_defaults_positive() {
        let mut a = analysis(DocType::Txt, &["7"]);
        a.entities.push(entity("service", "desk", 0.5, None));
        split_by_polarity(&mut a, DocType::Txt, &feedback_types(&["service"], &[]));
        assert_eq!(a.entities.len(), 2);
        assert_eq!(a.entities[1].entity_type, "service-pos");
    }

    #[test]
    fn test_pos_segment_tags_regardless_of_polarity() {
        let mut a = analysis(DocType::Pos, &["7"]);
        a.entities.push(entity("service", "wait", 0.5, Some(-0.9)));
        split_by_polarity(&mut a, DocType::Pos, &feedback_types(&["service"], &[]));
        assert_eq!(a.entities.len(), 2);
        assert_eq!(a.entities[1].entity_type, "service-pos");
    }

    #[test]
    fn test_non_feedback_types_left_alone() {
        let mut a = analysis(DocType::Neg, &["7"]);
        a.entities.push(entity("person", "John", 0.5, None));
        split_by_polarity(&mut a, DocType::Neg, &feedback_types(&["service"], &[]));
        assert_eq!(a.entities.len(), 1);
    }

    #[test]
    fn test_relations_split_like_entities() {
        let mut a = analysis(DocType::Neg, &["7"]);
        a.relations.push(relation("ATTR", "slow", Some("wait"), 1.0));
        split_by_polarity(&mut a, DocType::Neg, &feedback_types(&[], &["ATTR"]));
        assert_eq!(a.relations.len(), 2);
        assert_eq!(a.relations[1].relation_type, "ATTR-neg");
    }

    #[test]
    fn test_entity_merge_max_score_concat_mentions() {
        let mut target = analysis(DocType::Txt, &["7"]);
        target.entities.push(entity("T", "x", 0.5, None));
        let mut source = analysis(DocType::Pos, &["7"]);
        source.entities.push(entity("T", "x", 0.9, None));

        fold_segment(&mut target, source.clone(), DocType::Pos);
        assert_eq!(target.entities.len(), 1);
        assert_eq!(target.entities[0].score, 0.9);
        assert_eq!(target.entities[0].mentions.len(), 2);

        // merging an identical source again: score unchanged, mentions
        // concatenated again (no deduplication of mentions)
        fold_segment(&mut target, source, DocType::Pos);
        assert_eq!(target.entities[0].score, 0.9);
        assert_eq!(target.entities[0].mentions.len(), 3);
    }

    #[test]
    fn test_entity_merge_appends_new_keys() {
        let mut target = analysis(DocType::Txt, &["7"]);
        target.entities.push(entity("T", "x", 0.5, None));
        let mut source = analysis(DocType::Neg, &["7"]);
        source.entities.push(entity("T", "y", 0.4, None));
        fold_segment(&mut target, source, DocType::Neg);
        assert_eq!(target.entities.len(), 2);
    }

    #[test]
    fn test_relation_merge_sums_support() {
        let mut target = analysis(DocType::Txt, &["7"]);
        target.relations.push(relation("R", "likes", Some("food"), 3.0));
        let mut source = analysis(DocType::Pos, &["7"]);
        source.relations.push(relation("R", "likes", Some("food"), 5.0));
        source.relations.push(relation("R", "likes", Some("rooms"), 2.0));

        fold_segment(&mut target, source, DocType::Pos);
        assert_eq!(target.relations.len(), 2);
        assert_eq!(target.relations[0].support, 8.0);
        assert_eq!(target.relations[1].support, 2.0);
    }

    #[test]
    fn test_fold_accumulates_chars_and_sentences() {
        let mut target = analysis(DocType::Txt, &["7"]);
        target.sentences.push(feedback_common::analysis::Sentence {
            segment: "text".into(),
            text: "a".into(),
            sentiment: None,
        });
        let mut source = analysis(DocType::Neg, &["7"]);
        source.sentences.push(feedback_common::analysis::Sentence {
            segment: "lead".into(),
            text: "b".into(),
            sentiment: None,
        });
        fold_segment(&mut target, source, DocType::Neg);
        assert_eq!(target.used_chars, 20);
        assert_eq!(target.sentences.len(), 2);
        assert_eq!(target.sentences[0].text, "a");
        assert_eq!(target.sentences[1].text, "b");
        assert_eq!(target.lead.as_deref(), Some("n"));
    }

    #[test]
    fn test_assemble_groups_by_record() {
        let batch = vec![
            analysis(DocType::Txt, &["1"]),
            analysis(DocType::Txt, &["2"]),
            analysis(DocType::Neg, &["1"]),
            analysis(DocType::Pos, &["2"]),
        ];
        let records = assemble_records(batch, &FeedbackTypes::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ids, vec!["1"]);
        assert_eq!(records[0].analysis.used_chars, 20);
        assert_eq!(records[1].ids, vec!["2"]);
        assert_eq!(records[1].analysis.id, "[\"2\"]");
    }

    #[test]
    fn test_assemble_missing_txt_is_fatal() {
        let batch = vec![analysis(DocType::Pos, &["1"])];
        let result = assemble_records(batch, &FeedbackTypes::default());
        assert!(matches!(
            result,
            Err(PipelineError::MissingTextSegment { .. })
        ));
    }

    #[test]
    fn test_assemble_splits_before_merge() {
        // the -neg suffix must be applied on the neg segment before its
        // entities meet the merge keys
        let mut txt = analysis(DocType::Txt, &["1"]);
        txt.entities.push(entity("service", "wait", 0.5, None));
        let mut neg = analysis(DocType::Neg, &["1"]);
        neg.entities.push(entity("service", "wait", 0.8, None));

        let records =
            assemble_records(vec![txt, neg], &feedback_types(&["service"], &[])).unwrap();
        let types: Vec<&str> = records[0]
            .analysis
            .entities
            .iter()
            .map(|e| e.entity_type.as_str())
            .collect();
        // txt: service (+ service-pos via default polarity), neg: service
        // merged into txt's, plus its own service-neg appended
        assert_eq!(types, vec!["service", "service-pos", "service-neg"]);
        let merged = &records[0].analysis.entities[0];
        assert_eq!(merged.score, 0.8);
        assert_eq!(merged.mentions.len(), 2);
    }
}

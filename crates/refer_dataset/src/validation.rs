//! Corpus summary and quality checks.

use crate::refer::Refer;
use crate::types::{CorpusSummary, CorpusThresholds, ValidationOutcome, ValidationReport};
use std::collections::BTreeMap;

fn apply_thresholds(
    label: &str,
    count: usize,
    ratio: f32,
    max_count: Option<usize>,
    max_ratio: Option<f32>,
    outcome: &mut ValidationOutcome,
    reasons: &mut Vec<String>,
) {
    if let Some(max) = max_count {
        if count > max {
            *outcome = ValidationOutcome::Fail;
            reasons.push(format!("{label}: {count} exceeds max {max}"));
        }
    }
    if let Some(max_r) = max_ratio {
        if ratio > max_r {
            *outcome = ValidationOutcome::Fail;
            reasons.push(format!(
                "{label}: ratio {:.3} exceeds max {:.3}",
                ratio, max_r
            ));
        }
    }
    if count > 0 {
        if *outcome == ValidationOutcome::Pass {
            *outcome = ValidationOutcome::Warn;
        }
        reasons.push(format!("{label}: {count} observed"));
    }
}

pub fn summarize_corpus(refer: &Refer) -> CorpusSummary {
    let corpus = refer.corpus();
    let mut refs_by_split: BTreeMap<String, usize> = BTreeMap::new();
    let mut refs_without_sentences = 0;
    let mut refs_with_empty_boxes = 0;
    for r in &corpus.refs {
        *refs_by_split.entry(r.split.clone()).or_default() += 1;
        if r.sentences.is_empty() {
            refs_without_sentences += 1;
        }
        if refer.get_ref_box(r.ref_id).is_ok_and(|b| b.is_empty()) {
            refs_with_empty_boxes += 1;
        }
    }
    CorpusSummary {
        dataset: refer.dataset().to_string(),
        refs: corpus.refs.len(),
        annotations: corpus.annotations.len(),
        images: corpus.images.len(),
        categories: corpus.categories.len(),
        sentences: refer.index().sentence_count(),
        refs_by_split,
        refs_without_sentences,
        refs_with_empty_boxes,
    }
}

pub fn validate_summary(
    summary: CorpusSummary,
    thresholds: &CorpusThresholds,
) -> ValidationReport {
    let denom = summary.refs.max(1) as f32;
    let mut outcome = ValidationOutcome::Pass;
    let mut reasons = Vec::new();

    apply_thresholds(
        "refs without sentences",
        summary.refs_without_sentences,
        summary.refs_without_sentences as f32 / denom,
        thresholds.max_empty_sentences,
        thresholds.max_empty_sentences_ratio,
        &mut outcome,
        &mut reasons,
    );
    apply_thresholds(
        "refs with empty boxes",
        summary.refs_with_empty_boxes,
        summary.refs_with_empty_boxes as f32 / denom,
        thresholds.max_empty_boxes,
        thresholds.max_empty_boxes_ratio,
        &mut outcome,
        &mut reasons,
    );

    ValidationReport {
        outcome,
        reasons,
        summary,
    }
}

pub fn summarize_with_thresholds(
    refer: &Refer,
    thresholds: &CorpusThresholds,
) -> ValidationReport {
    validate_summary(summarize_corpus(refer), thresholds)
}

//! Core types, error definitions, and data structures for refer_dataset.

use refer_contracts::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, ReferError>;

/// Collections held by the store; used to tag lookup and integrity errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ref,
    Annotation,
    Image,
    Category,
    Sentence,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ref => "ref",
            EntityKind::Annotation => "annotation",
            EntityKind::Image => "image",
            EntityKind::Category => "category",
            EntityKind::Sentence => "sentence",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReferError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("pickle parse error at {path}: {source}")]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },
    #[error("record validation failed at {path}: {source}")]
    Validation {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
    #[error("no refer dataset is called [{0}]")]
    UnsupportedDataset(String),
    #[error("refclef is not supported: no RefClef image data")]
    NoRefClefImages,
    #[error("no such split [{0}]")]
    InvalidSplit(String),
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: EntityKind, id: u64 },
    #[error("ref {ref_id} points at annotation {ann_id}, which does not exist")]
    DanglingAnnotation { ref_id: u64, ann_id: u64 },
    #[error("annotation {ann_id} points at image {image_id}, which does not exist")]
    OrphanAnnotation { ann_id: u64, image_id: u64 },
    #[error("refs {first} and {second} both point at annotation {ann_id}")]
    SharedAnnotation { ann_id: u64, first: u64, second: u64 },
    #[error("ref {ref_id} is on image {image_id} but its annotation is on image {ann_image_id}")]
    RefImageMismatch {
        ref_id: u64,
        image_id: u64,
        ann_image_id: u64,
    },
    #[error("invalid {kind} record: {source}")]
    InvalidRecord {
        kind: EntityKind,
        #[source]
        source: ValidationError,
    },
    #[error("{kind} id {id} not found")]
    NotFound { kind: EntityKind, id: u64 },
}

/// Referring-expression corpora with image data available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetName {
    #[serde(rename = "refcoco")]
    RefCoco,
    #[serde(rename = "refcoco+")]
    RefCocoPlus,
    #[serde(rename = "refcocog")]
    RefCocog,
}

impl DatasetName {
    /// Parse a dataset name. Inverse-task names (`invrefcoco`) share storage with
    /// the forward dataset, so everything up to the last `inv` is dropped.
    pub fn parse(raw: &str) -> DatasetResult<Self> {
        let name = raw.rsplit("inv").next().unwrap_or(raw);
        match name {
            "refcoco" => Ok(DatasetName::RefCoco),
            "refcoco+" => Ok(DatasetName::RefCocoPlus),
            "refcocog" => Ok(DatasetName::RefCocog),
            "refclef" => Err(ReferError::NoRefClefImages),
            _ => Err(ReferError::UnsupportedDataset(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::RefCoco => "refcoco",
            DatasetName::RefCocoPlus => "refcoco+",
            DatasetName::RefCocog => "refcocog",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = ReferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetName::parse(s)
    }
}

/// Split filter accepted by `Refer::get_ref_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitFilter {
    /// `testA` / `testB` / `testC`: any split containing the letter, so `testAB` matches `testA`.
    TestLetter(char),
    /// `testAB` / `testBC` / `testAC`: exact match.
    TestPair(String),
    /// `test`: any split containing `test`.
    AnyTest,
    /// `train` / `val`: exact match.
    Exact(String),
}

impl SplitFilter {
    pub fn parse(raw: &str) -> DatasetResult<Self> {
        match raw {
            "testA" => Ok(SplitFilter::TestLetter('A')),
            "testB" => Ok(SplitFilter::TestLetter('B')),
            "testC" => Ok(SplitFilter::TestLetter('C')),
            "testAB" | "testBC" | "testAC" => Ok(SplitFilter::TestPair(raw.to_string())),
            "test" => Ok(SplitFilter::AnyTest),
            "train" | "val" => Ok(SplitFilter::Exact(raw.to_string())),
            _ => Err(ReferError::InvalidSplit(raw.to_string())),
        }
    }

    pub fn matches(&self, split: &str) -> bool {
        match self {
            SplitFilter::TestLetter(letter) => split.contains(*letter),
            SplitFilter::TestPair(want) | SplitFilter::Exact(want) => split == want,
            SplitFilter::AnyTest => split.contains("test"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub dataset: String,
    pub refs: usize,
    pub annotations: usize,
    pub images: usize,
    pub categories: usize,
    pub sentences: usize,
    pub refs_by_split: BTreeMap<String, usize>,
    pub refs_without_sentences: usize,
    pub refs_with_empty_boxes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Pass,
    Warn,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "pass",
            ValidationOutcome::Warn => "warn",
            ValidationOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusThresholds {
    pub max_empty_sentences: Option<usize>,
    pub max_empty_boxes: Option<usize>,
    pub max_empty_sentences_ratio: Option<f32>,
    pub max_empty_boxes_ratio: Option<f32>,
}

impl CorpusThresholds {
    pub fn from_env() -> Self {
        fn parse_usize(key: &str) -> Option<usize> {
            std::env::var(key).ok()?.parse().ok()
        }
        fn parse_ratio(key: &str) -> Option<f32> {
            std::env::var(key).ok()?.parse().ok()
        }
        CorpusThresholds {
            max_empty_sentences: parse_usize("REFER_MAX_EMPTY_SENTENCES"),
            max_empty_boxes: parse_usize("REFER_MAX_EMPTY_BOXES"),
            max_empty_sentences_ratio: parse_ratio("REFER_MAX_EMPTY_SENTENCES_RATIO"),
            max_empty_boxes_ratio: parse_ratio("REFER_MAX_EMPTY_BOXES_RATIO"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub reasons: Vec<String>,
    pub summary: CorpusSummary,
}

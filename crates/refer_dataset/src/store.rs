//! Loading the on-disk corpus: pickled refs plus the COCO instances file.

use crate::types::{DatasetName, DatasetResult, ReferError};
use refer_contracts::{Annotation, Category, Image, InstancesFile, Reference};
use serde_pickle::DeOptions;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File locations for one dataset variant under the corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    pub ann_dir: PathBuf,
    pub refs_path: PathBuf,
    pub instances_path: PathBuf,
}

impl CorpusPaths {
    pub fn new(corpus_root: &Path, dataset: DatasetName, split_by: &str) -> Self {
        let ann_dir = corpus_root.join(dataset.as_str());
        Self {
            refs_path: ann_dir.join(format!("refs({split_by}).p")),
            instances_path: ann_dir.join("instances.json"),
            ann_dir,
        }
    }
}

/// Raw collections of one dataset variant, in file order. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    pub dataset: DatasetName,
    pub split_by: String,
    pub image_root: PathBuf,
    pub refs: Vec<Reference>,
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

impl Corpus {
    /// Load `refs(<split_by>).p` and `instances.json` from `<corpus_root>/<dataset>/`.
    pub fn load(
        corpus_root: &Path,
        image_root: &Path,
        dataset: &str,
        split_by: &str,
    ) -> DatasetResult<Self> {
        let name = DatasetName::parse(dataset)?;
        info!("loading dataset {name} into memory...");
        let paths = CorpusPaths::new(corpus_root, name, split_by);
        let refs = load_refs(&paths.refs_path)?;
        let instances = load_instances(&paths.instances_path)?;
        debug!(
            refs = refs.len(),
            images = instances.images.len(),
            annotations = instances.annotations.len(),
            categories = instances.categories.len(),
            "corpus files read"
        );
        Ok(Self::from_parts(name, split_by, image_root, refs, instances))
    }

    /// Assemble a corpus from collections already in memory.
    pub fn from_parts(
        dataset: DatasetName,
        split_by: &str,
        image_root: &Path,
        refs: Vec<Reference>,
        instances: InstancesFile,
    ) -> Self {
        Self {
            dataset,
            split_by: split_by.to_string(),
            image_root: image_root.to_path_buf(),
            refs,
            images: instances.images,
            annotations: instances.annotations,
            categories: instances.categories,
        }
    }
}

/// Read the pickled reference list. Python 2 byte strings are decoded as UTF-8.
pub fn load_refs(path: &Path) -> DatasetResult<Vec<Reference>> {
    let file = File::open(path).map_err(|e| ReferError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let refs: Vec<Reference> =
        serde_pickle::from_reader(BufReader::new(file), DeOptions::new().decode_strings())
            .map_err(|e| ReferError::Pickle {
                path: path.to_path_buf(),
                source: e,
            })?;
    for r in &refs {
        r.validate().map_err(|e| ReferError::Validation {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(refs)
}

pub fn load_instances(path: &Path) -> DatasetResult<InstancesFile> {
    let raw = fs::read(path).map_err(|e| ReferError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let instances: InstancesFile = serde_json::from_slice(&raw).map_err(|e| ReferError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let invalid = |source| ReferError::Validation {
        path: path.to_path_buf(),
        source,
    };
    for img in &instances.images {
        img.validate().map_err(invalid)?;
    }
    for ann in &instances.annotations {
        ann.validate().map_err(invalid)?;
    }
    for cat in &instances.categories {
        cat.validate().map_err(invalid)?;
    }
    Ok(instances)
}

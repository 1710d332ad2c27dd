use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RefId = u64;
pub type AnnId = u64;
pub type ImageId = u64;
pub type CategoryId = u64;
pub type SentId = u64;

/// Pixel-space box `[x, y, width, height]`, as stored in COCO annotations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bbox(pub [f64; 4]);

impl Bbox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Bbox([x, y, width, height])
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn width(&self) -> f64 {
        self.0[2]
    }

    pub fn height(&self) -> f64 {
        self.0[3]
    }

    /// Right edge (`x + width`).
    pub fn x2(&self) -> f64 {
        self.0[0] + self.0[2]
    }

    /// Bottom edge (`y + height`).
    pub fn y2(&self) -> f64 {
        self.0[1] + self.0[3]
    }

    pub fn is_empty(&self) -> bool {
        self.0[2] <= 0.0 || self.0[3] <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub sent_id: SentId,
    pub raw: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Normalised sentence text (lowercased, punctuation stripped) when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub ref_id: RefId,
    pub ann_id: AnnId,
    pub category_id: CategoryId,
    pub image_id: ImageId,
    pub split: String,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sent_ids: Vec<SentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RleCounts {
    Runs(Vec<u64>),
    Compressed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RleMask {
    pub counts: RleCounts,
    pub size: [u32; 2],
}

/// Polygons are used by refcoco*; RLE masks by crowd annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    Polygons(Vec<Vec<f64>>),
    Rle(RleMask),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: Bbox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iscrowd: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Fields such as `coco_url` or `flickr_url` that nothing here interprets.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

/// Layout of `instances.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancesFile {
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("annotation {ann_id} bbox invalid (non-finite or negative extent): {bbox:?}")]
    InvalidBbox { ann_id: AnnId, bbox: [f64; 4] },
    #[error("ref {0} has an empty split")]
    EmptySplit(RefId),
    #[error("image {0} has an empty file_name")]
    MissingFileName(ImageId),
    #[error("category {0} has an empty name")]
    EmptyCategoryName(CategoryId),
}

impl Annotation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let b = self.bbox.0;
        if b.iter().any(|v| !v.is_finite()) || b[2] < 0.0 || b[3] < 0.0 {
            return Err(ValidationError::InvalidBbox {
                ann_id: self.id,
                bbox: b,
            });
        }
        Ok(())
    }
}

impl Reference {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.split.trim().is_empty() {
            return Err(ValidationError::EmptySplit(self.ref_id));
        }
        Ok(())
    }
}

impl Image {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.file_name.trim().is_empty() {
            return Err(ValidationError::MissingFileName(self.id));
        }
        Ok(())
    }
}

impl Category {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyCategoryName(self.id));
        }
        Ok(())
    }
}

//! COCO box-shard samples: identify every object, or name the object in one box.
//!
//! A shard member is an image plus a JSON annotation sharing the same key
//! (`000123.jpg` + `000123.json`). Boxes are fractional `[x, y, w, h]`.

use crate::encode::{box_tokens, object_box_list};
use crate::grid::quantize_fractional_box;
use crate::processors::{TextProcessor, VisionProcessor};
use crate::sample::{SampleTags, TrainingSample};
use crate::templates::{
    choose, fill, BBOX_TO_OBJECT_POOL, IDENTIFY_ALL_INSTRUCTION, IMAGE_PLACEHOLDER,
};
use crate::types::{FormatError, FormatResult};
use image::RgbImage;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardAnnotation {
    pub objects: Vec<String>,
    /// Fractional `[x, y, w, h]`, one per object.
    pub bbox: Vec<[f64; 4]>,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardTask {
    /// List every object with its box.
    IdentifyAll,
    /// Name the object inside one sampled box.
    BboxToObject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPair {
    pub key: String,
    pub image_path: PathBuf,
    pub json_path: PathBuf,
}

/// Group `<key>.{jpg,jpeg,png}` and `<key>.json` files of a directory into pairs.
/// Keys with only one member are skipped.
pub fn index_shard_pairs(dir: &Path) -> FormatResult<Vec<ShardPair>> {
    let entries = fs::read_dir(dir).map_err(|e| FormatError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut images: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut labels: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((key, ext)) = name.split_once('.') else {
            continue;
        };
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" => {
                images.insert(key.to_string(), path.clone());
            }
            "json" => {
                labels.insert(key.to_string(), path.clone());
            }
            _ => {}
        }
    }
    Ok(images
        .into_iter()
        .filter_map(|(key, image_path)| {
            labels.remove(&key).map(|json_path| ShardPair {
                key,
                image_path,
                json_path,
            })
        })
        .collect())
}

pub fn load_shard_pair(pair: &ShardPair) -> FormatResult<(RgbImage, ShardAnnotation)> {
    let raw = fs::read(&pair.json_path).map_err(|e| FormatError::Io {
        path: pair.json_path.clone(),
        source: e,
    })?;
    let ann: ShardAnnotation = serde_json::from_slice(&raw).map_err(|e| FormatError::Json {
        path: pair.json_path.clone(),
        source: e,
    })?;
    let image = image::open(&pair.image_path)
        .map_err(|e| FormatError::Image {
            path: pair.image_path.clone(),
            source: e,
        })?
        .to_rgb8();
    Ok((image, ann))
}

/// Grid tokens `<x1><y1><x2><y2>` for every box of the annotation.
pub fn grid_tokens(ann: &ShardAnnotation) -> FormatResult<Vec<String>> {
    if ann.objects.len() != ann.bbox.len() {
        return Err(FormatError::ObjectBoxMismatch {
            objects: ann.objects.len(),
            boxes: ann.bbox.len(),
        });
    }
    ann.bbox
        .iter()
        .map(|b| quantize_fractional_box(*b).map(|g| box_tokens(&g)))
        .collect()
}

pub struct ShardSampleBuilder<V, T> {
    vis: V,
    text: T,
}

impl<V, T> ShardSampleBuilder<V, T>
where
    V: VisionProcessor,
    T: TextProcessor,
{
    pub fn new(vis: V, text: T) -> Self {
        Self { vis, text }
    }

    pub fn build<R: Rng + ?Sized>(
        &self,
        task: ShardTask,
        image: RgbImage,
        ann: &ShardAnnotation,
        rng: &mut R,
    ) -> FormatResult<TrainingSample<V::Output>> {
        match task {
            ShardTask::IdentifyAll => self.identify_all(image, ann, rng),
            ShardTask::BboxToObject => self.bbox_to_object(image, ann, rng),
        }
    }

    /// Instruction asks for every object; answer lists `{object,<x1><y1><x2><y2>}`
    /// entries in shuffled order.
    pub fn identify_all<R: Rng + ?Sized>(
        &self,
        image: RgbImage,
        ann: &ShardAnnotation,
        rng: &mut R,
    ) -> FormatResult<TrainingSample<V::Output>> {
        let tokens = grid_tokens(ann)?;
        let image = self.vis.process_image(image)?;
        let instruction = format!(
            "{IMAGE_PLACEHOLDER} {}",
            self.text.process_text(IDENTIFY_ALL_INSTRUCTION)
        );
        let mut pairs: Vec<(String, String)> = ann.objects.iter().cloned().zip(tokens).collect();
        pairs.shuffle(rng);
        Ok(TrainingSample {
            image,
            instruction_input: instruction,
            answer: object_box_list(&pairs),
            tags: SampleTags::bbox(),
        })
    }

    /// Instruction carries one sampled box as `{<x1><y1><x2><y2>}`; answer is its object.
    pub fn bbox_to_object<R: Rng + ?Sized>(
        &self,
        image: RgbImage,
        ann: &ShardAnnotation,
        rng: &mut R,
    ) -> FormatResult<TrainingSample<V::Output>> {
        let tokens = grid_tokens(ann)?;
        if tokens.is_empty() {
            return Err(FormatError::NoObjects);
        }
        let image = self.vis.process_image(image)?;
        let pick = rng.random_range(0..tokens.len());
        let bbox = format!("{{{}}}", tokens[pick]);
        Ok(TrainingSample {
            image,
            instruction_input: fill(choose(BBOX_TO_OBJECT_POOL, rng), &bbox),
            answer: self.text.process_text(&ann.objects[pick]),
            tags: SampleTags::bbox(),
        })
    }
}

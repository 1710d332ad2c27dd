//! Referring-expression samples: sentence -> box (`refer`) and box -> sentence (`identify`).

use crate::encode::refer_box;
use crate::grid::quantize_pixel_box;
use crate::processors::{TextProcessor, VisionProcessor};
use crate::sample::{SampleTags, TrainingSample};
use crate::templates::{choose, fill, with_image_prefix, IDENTIFY_POOL, REFER_POOL};
use crate::types::{FormatError, FormatResult};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};
use refer_contracts::{ImageId, RefId, Reference};
use refer_dataset::Refer;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Instruction carries the sentence, answer is the box.
    Refer,
    /// Instruction carries the box, answer is the sentence.
    Identify,
}

/// How a ref's image file is located under the image root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageNaming {
    /// `COCO_train2014_{image_id:012}.jpg`; every refcoco* image comes from train2014.
    #[default]
    CocoTrain2014,
    /// The `file_name` of the image record in `instances.json`.
    Record,
}

/// A ref resolved to its processed image, sentence, and grid box.
#[derive(Debug, Clone)]
pub struct PreparedRef<I> {
    pub ref_id: RefId,
    pub image_id: ImageId,
    pub image: I,
    /// Sampled sentence after the text processor.
    pub sentence: String,
    /// `{<x1><y1><x2><y2>}` on the 100x100 grid.
    pub bbox: String,
}

pub struct ReferSampleSet<V, T> {
    refer: Arc<Refer>,
    ref_ids: Vec<RefId>,
    direction: Direction,
    naming: ImageNaming,
    vis: V,
    text: T,
    seed: Option<u64>,
}

impl<V, T> ReferSampleSet<V, T>
where
    V: VisionProcessor,
    T: TextProcessor,
{
    /// Samples over the `train` split.
    pub fn new(refer: Arc<Refer>, direction: Direction, vis: V, text: T) -> FormatResult<Self> {
        Self::with_split(refer, "train", direction, vis, text)
    }

    pub fn with_split(
        refer: Arc<Refer>,
        split: &str,
        direction: Direction,
        vis: V,
        text: T,
    ) -> FormatResult<Self> {
        let ref_ids = refer.get_ref_ids(&[], &[], &[], Some(split))?;
        tracing::info!(
            dataset = %refer.dataset(),
            split,
            refs = ref_ids.len(),
            "refer sample set ready"
        );
        Ok(Self {
            refer,
            ref_ids,
            direction,
            naming: ImageNaming::default(),
            vis,
            text,
            seed: None,
        })
    }

    pub fn with_naming(mut self, naming: ImageNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Seed per-index RNGs so `get(i)` is reproducible.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn len(&self) -> usize {
        self.ref_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ref_ids.is_empty()
    }

    pub fn ref_ids(&self) -> &[RefId] {
        &self.ref_ids
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn image_path(&self, r: &Reference) -> FormatResult<PathBuf> {
        let file_name = match self.naming {
            ImageNaming::CocoTrain2014 => format!("COCO_train2014_{:0>12}.jpg", r.image_id),
            ImageNaming::Record => self.refer.load_img(r.image_id)?.file_name.clone(),
        };
        Ok(self.refer.image_root().join(file_name))
    }

    fn ref_at(&self, index: usize) -> FormatResult<&Reference> {
        let id = *self
            .ref_ids
            .get(index)
            .ok_or(FormatError::IndexOutOfRange {
                index,
                len: self.ref_ids.len(),
            })?;
        Ok(self.refer.load_ref(id)?)
    }

    /// Load the image, sample a sentence, and quantize the ref's box against the
    /// original image size.
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> FormatResult<PreparedRef<V::Output>> {
        let r = self.ref_at(index)?;
        let path = self.image_path(r)?;
        let img = image::open(&path)
            .map_err(|e| FormatError::Image {
                path: path.clone(),
                source: e,
            })?
            .to_rgb8();
        let orig_size = img.dimensions();
        let image = self.vis.process_image(img)?;

        let raw = &r
            .sentences
            .choose(rng)
            .ok_or(FormatError::NoSentences(r.ref_id))?
            .raw;
        let sentence = self.text.process_text(raw);

        let bbox = self.refer.get_ref_box(r.ref_id)?;
        let grid = quantize_pixel_box(&bbox, orig_size)?;
        Ok(PreparedRef {
            ref_id: r.ref_id,
            image_id: r.image_id,
            image,
            sentence,
            bbox: refer_box(&grid),
        })
    }

    pub fn get_with_rng<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> FormatResult<TrainingSample<V::Output>> {
        let data = self.prepare(index, rng)?;
        let (instruction, answer) = match self.direction {
            Direction::Refer => (
                fill(choose(REFER_POOL, rng), &data.sentence),
                data.bbox,
            ),
            Direction::Identify => (
                fill(choose(IDENTIFY_POOL, rng), &data.bbox),
                self.text.process_text(&data.sentence),
            ),
        };
        Ok(TrainingSample {
            image: data.image,
            instruction_input: with_image_prefix(&instruction),
            answer,
            tags: SampleTags::Image {
                image_id: data.image_id,
            },
        })
    }

    /// Build the sample at `index`, seeded from `seed ^ index` when a seed is set.
    pub fn get(&self, index: usize) -> FormatResult<TrainingSample<V::Output>> {
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn RngCore = if let Some(seed) = self.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ index as u64);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };
        self.get_with_rng(index, rng)
    }
}

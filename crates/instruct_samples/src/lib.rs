//! Instruction/answer sample builders for grounding-style vision-language training.
//!
//! This crate provides:
//! - Box quantization onto the fixed 100x100 grid and its textual encodings
//! - Instruction template pools for refer, identify, and COCO box tasks
//! - Vision/text processor traits with reference implementations
//! - Sample sets over `refer_dataset::Refer` and COCO box shards
//! - A JSONL writer for exported samples

pub mod encode;
pub mod grid;
pub mod processors;
pub mod refer_samples;
pub mod sample;
pub mod shard_samples;
pub mod templates;
pub mod types;
pub mod writer;

pub use grid::{quantize_fractional_box, quantize_pixel_box, GridBox, GRID_SIZE};
pub use processors::{
    CaptionText, ChwTensor, Identity, ImageDims, ImageTensor, KeepImage, ShapeOnly, TextProcessor,
    VisionProcessor,
};
pub use refer_samples::{Direction, ImageNaming, PreparedRef, ReferSampleSet};
pub use sample::{SampleTags, TrainingSample};
pub use shard_samples::{
    grid_tokens, index_shard_pairs, load_shard_pair, ShardAnnotation, ShardPair,
    ShardSampleBuilder, ShardTask,
};
pub use types::{FormatError, FormatResult};
pub use writer::JsonlSampleWriter;

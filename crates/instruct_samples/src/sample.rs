use refer_contracts::ImageId;
use serde::{Deserialize, Serialize};

/// Dataset-specific fields carried next to the instruction/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleTags {
    Bbox {
        data_type: String,
        question_split: bool,
    },
    Image {
        image_id: ImageId,
    },
}

impl SampleTags {
    /// Tags attached to every COCO box-shard sample.
    pub fn bbox() -> Self {
        SampleTags::Bbox {
            data_type: "bbox".to_string(),
            question_split: true,
        }
    }
}

/// One instruction/answer training example. Serialises flat:
/// `{image, instruction_input, answer, <tags>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample<I> {
    pub image: I,
    pub instruction_input: String,
    pub answer: String,
    #[serde(flatten)]
    pub tags: SampleTags,
}

impl<I> TrainingSample<I> {
    /// Swap the image payload, e.g. replacing pixels with a path before export.
    pub fn map_image<J>(self, f: impl FnOnce(I) -> J) -> TrainingSample<J> {
        TrainingSample {
            image: f(self.image),
            instruction_input: self.instruction_input,
            answer: self.answer,
            tags: self.tags,
        }
    }
}

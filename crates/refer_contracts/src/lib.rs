//! Shared record types for referring-expression corpora and the COCO instances file.

pub mod records;

pub use records::{
    AnnId, Annotation, Bbox, Category, CategoryId, Image, ImageId, InstancesFile, RefId,
    Reference, RleCounts, RleMask, Segmentation, SentId, Sentence, ValidationError,
};

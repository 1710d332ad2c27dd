//! Error definitions for sample formatting.

use refer_dataset::ReferError;
use std::path::PathBuf;
use thiserror::Error;

pub type FormatResult<T> = Result<T, FormatError>;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("box quantized outside the 0..=100 grid: {coords:?}")]
    OutOfGrid { coords: [i64; 4] },
    #[error("box contains non-finite values: {0:?}")]
    NonFiniteBox([f64; 4]),
    #[error("image has zero size ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("sample has no objects to choose from")]
    NoObjects,
    #[error("sample lists {objects} objects but {boxes} boxes")]
    ObjectBoxMismatch { objects: usize, boxes: usize },
    #[error("ref {0} has no sentences")]
    NoSentences(u64),
    #[error("sample index {index} out of range ({len} samples)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Dataset(#[from] ReferError),
}

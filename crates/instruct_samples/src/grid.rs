//! Quantization of boxes onto the fixed 100x100 coordinate grid.

use crate::types::{FormatError, FormatResult};
use refer_contracts::Bbox;
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: i64 = 100;

/// Corner coordinates on the grid; every field lies in `0..=GRID_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl GridBox {
    fn checked(coords: [i64; 4]) -> FormatResult<Self> {
        if coords.iter().any(|c| !(0..=GRID_SIZE).contains(c)) {
            return Err(FormatError::OutOfGrid { coords });
        }
        Ok(GridBox {
            x1: coords[0],
            y1: coords[1],
            x2: coords[2],
            y2: coords[3],
        })
    }

    pub fn coords(&self) -> [i64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

fn ensure_finite(raw: [f64; 4]) -> FormatResult<()> {
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(FormatError::NonFiniteBox(raw));
    }
    Ok(())
}

/// Truncation toward zero, matching an integer cast.
fn cell(v: f64) -> i64 {
    v.trunc() as i64
}

/// Rescale a pixel box `[x, y, w, h]` from an image of `(width, height)` onto the grid.
///
/// Each edge is computed as `edge / image_extent * 100` in that order, so results
/// agree with previously exported data bit for bit.
pub fn quantize_pixel_box(bbox: &Bbox, image_size: (u32, u32)) -> FormatResult<GridBox> {
    let (width, height) = image_size;
    if width == 0 || height == 0 {
        return Err(FormatError::EmptyImage { width, height });
    }
    ensure_finite(bbox.0)?;
    let (w, h, grid) = (width as f64, height as f64, GRID_SIZE as f64);
    GridBox::checked([
        cell(bbox.x() / w * grid),
        cell(bbox.y() / h * grid),
        cell(bbox.x2() / w * grid),
        cell(bbox.y2() / h * grid),
    ])
}

/// Quantize a fractional box `[x, y, w, h]` (all in `0..=1`) as stored in COCO box shards.
/// The far corner is `x1 + cell(w)`, not `cell(x + w)`.
pub fn quantize_fractional_box(raw: [f64; 4]) -> FormatResult<GridBox> {
    ensure_finite(raw)?;
    let grid = GRID_SIZE as f64;
    let x1 = cell(raw[0] * grid);
    let y1 = cell(raw[1] * grid);
    GridBox::checked([x1, y1, x1 + cell(raw[2] * grid), y1 + cell(raw[3] * grid)])
}

//! Vision and text processors applied to images and instruction/answer text.
//!
//! Sample builders are generic over these traits; model-specific preprocessing
//! lives behind them.

use crate::types::FormatResult;
use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub trait VisionProcessor {
    type Output;

    fn process_image(&self, image: RgbImage) -> FormatResult<Self::Output>;
}

pub trait TextProcessor {
    fn process_text(&self, text: &str) -> String;
}

impl<F> TextProcessor for F
where
    F: Fn(&str) -> String,
{
    fn process_text(&self, text: &str) -> String {
        self(text)
    }
}

/// Square resize followed by per-channel normalisation into CHW layout.
#[derive(Debug, Clone)]
pub struct ChwTensor {
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    /// Channel-major pixels, normalised with the processor's mean/std.
    pub data: Vec<f32>,
}

impl ChwTensor {
    /// CLIP normalisation constants used by BLIP-2 style vision towers.
    pub fn clip(size: u32) -> Self {
        Self {
            size,
            mean: [0.481_454_66, 0.457_827_5, 0.408_210_73],
            std: [0.268_629_54, 0.261_302_58, 0.275_777_11],
        }
    }
}

impl VisionProcessor for ChwTensor {
    type Output = ImageTensor;

    fn process_image(&self, image: RgbImage) -> FormatResult<ImageTensor> {
        let (width, height) = (self.size, self.size);
        let resized = image::imageops::resize(&image, width, height, FilterType::CatmullRom);
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let base = (y * width + x) as usize;
            for c in 0..3 {
                data[c * plane + base] = (pixel[c] as f32 / 255.0 - self.mean[c]) / self.std[c];
            }
        }
        Ok(ImageTensor {
            width,
            height,
            data,
        })
    }
}

/// Passes the decoded image through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepImage;

impl VisionProcessor for KeepImage {
    type Output = RgbImage;

    fn process_image(&self, image: RgbImage) -> FormatResult<RgbImage> {
        Ok(image)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

/// Keeps only the image dimensions; used when exporting records without pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeOnly;

impl VisionProcessor for ShapeOnly {
    type Output = ImageDims;

    fn process_image(&self, image: RgbImage) -> FormatResult<ImageDims> {
        let (width, height) = image.dimensions();
        Ok(ImageDims { width, height })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl TextProcessor for Identity {
    fn process_text(&self, text: &str) -> String {
        text.to_string()
    }
}

/// BLIP caption cleaning: lowercase, punctuation to spaces, whitespace runs of
/// two or more collapsed to one space, trailing newlines and outer spaces
/// stripped, truncated to `max_words` space-separated words, then prefixed
/// with `prompt`.
#[derive(Debug, Clone)]
pub struct CaptionText {
    pub prompt: String,
    pub max_words: usize,
}

impl Default for CaptionText {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            max_words: 50,
        }
    }
}

fn flush_whitespace(out: &mut String, run: &mut String) {
    if run.chars().count() >= 2 {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
}

impl TextProcessor for CaptionText {
    fn process_text(&self, text: &str) -> String {
        let lowered: String = text
            .to_lowercase()
            .chars()
            .map(|c| match c {
                '.' | '!' | '"' | '(' | ')' | '*' | '#' | ':' | ';' | '~' => ' ',
                c => c,
            })
            .collect();
        // Only runs of two or more whitespace chars collapse; a lone tab or newline stays.
        let mut collapsed = String::with_capacity(lowered.len());
        let mut run = String::new();
        for c in lowered.chars() {
            if c.is_whitespace() {
                run.push(c);
                continue;
            }
            flush_whitespace(&mut collapsed, &mut run);
            collapsed.push(c);
        }
        flush_whitespace(&mut collapsed, &mut run);
        let trimmed = collapsed.trim_end_matches('\n').trim_matches(' ');
        let words: Vec<&str> = trimmed.split(' ').take(self.max_words).collect();
        format!("{}{}", self.prompt, words.join(" "))
    }
}

//! Quantizer: builds a ≤256-entry palette (global or per-frame) and maps
//! RGBA pixels to palette indices (spec §4.2).

mod color;
mod dither;
mod kdtree;
mod median_cut;

use crate::error::{EncodeError, EncodeResult};
use crate::types::Palette;
use imgref::{ImgRef, ImgVec};
use kdtree::KdTree;
use median_cut::WeightedColor;
use rgb::{RGB8, RGBA8};
use std::collections::HashMap;

/// Minimum number of pixels to sample per frame (spec §4.2: "sample
/// N≥256 pixels per frame from a deterministic stride").
const MIN_SAMPLES_PER_FRAME: usize = 256;

/// Alpha values below this are treated as fully transparent.
const TRANSPARENCY_THRESHOLD: u8 = 128;

/// Palette and nearest-neighbor search structure for one encode stage.
/// Not `Clone`: rebuilt whenever the palette changes, per spec §5.
pub(crate) struct QuantizePlan {
    pub palette: Palette,
    tree: KdTree,
}

impl QuantizePlan {
    /// Maps `frame` to palette indices, applying Floyd–Steinberg dithering
    /// when `dither` is set.
    pub fn quantize(&self, frame: ImgRef<'_, RGBA8>, dither: bool) -> Vec<u8> {
        if dither {
            self::dither::dither_to_indices(frame, &self.palette.colors, &self.tree, self.palette.transparent_index)
        } else {
            self::dither::nearest_to_indices(frame, &self.tree, self.palette.transparent_index)
        }
    }
}

/// Deterministically samples at least [`MIN_SAMPLES_PER_FRAME`] pixels from
/// `frame` (or every pixel, if the frame is smaller than that), skipping
/// transparent ones, and returns the weighted unique colors seen.
fn sample_frame(frame: ImgRef<'_, RGBA8>) -> Vec<WeightedColor> {
    let (w, h) = (frame.width(), frame.height());
    let total = w * h;
    let stride = (total / MIN_SAMPLES_PER_FRAME).max(1);

    let mut counts: HashMap<(u8, u8, u8), u32> = HashMap::new();
    let mut i = 0usize;
    while i < total {
        let x = i % w;
        let y = i / w;
        let pixel = frame.buf()[y * frame.stride() + x];
        if pixel.a >= TRANSPARENCY_THRESHOLD {
            *counts.entry((pixel.r, pixel.g, pixel.b)).or_insert(0) += 1;
        }
        i += stride;
    }

    counts
        .into_iter()
        .map(|((r, g, b), weight)| WeightedColor { color: RGB8::new(r, g, b), weight })
        .collect()
}

/// `true` if any pixel in `frame` falls below the transparency threshold.
fn has_transparency(frame: ImgRef<'_, RGBA8>) -> bool {
    frame.pixels().any(|p| p.a < TRANSPARENCY_THRESHOLD)
}

/// Largest palette a GIF/WebP writer can address (spec §4.4/§4.5:
/// `PaletteTooLarge` is a writer-level failure above this).
const MAX_PALETTE_SIZE: usize = 256;

/// Builds the final palette from accumulated weighted samples, reserving
/// index 0 for transparency when requested, and padding degenerate
/// (fewer-than-2-color) results with black rather than failing (spec
/// §4.2's `PaletteBuildFailed` note).
fn finalize_palette(samples: Vec<WeightedColor>, max_colors: usize, transparent: bool) -> EncodeResult<Palette> {
    if max_colors < 2 {
        return Err(EncodeError::InvalidPaletteBudget(max_colors));
    }
    if samples.is_empty() {
        return Err(EncodeError::PaletteBuildFailed);
    }

    let budget = if transparent { max_colors - 1 } else { max_colors };
    let mut colors = median_cut::build_palette(&samples, budget);

    if colors.len() < 2 {
        log::warn!("degenerate palette ({} color(s)) padded with black", colors.len());
    }
    while colors.len() < 2 {
        colors.push(RGB8::new(0, 0, 0));
    }
    if colors.len() > budget {
        colors.truncate(budget.max(1));
    }

    let transparent_index = if transparent {
        colors.insert(0, RGB8::new(0, 0, 0));
        Some(0u8)
    } else {
        None
    };

    if colors.len() > MAX_PALETTE_SIZE {
        return Err(EncodeError::PaletteTooLarge(colors.len()));
    }

    Ok(Palette { colors, transparent_index })
}

/// Builds one palette shared by every frame in `frames`, sampling each.
pub(crate) fn build_global_plan(frames: &[ImgVec<RGBA8>], max_colors: usize) -> EncodeResult<QuantizePlan> {
    let mut samples = Vec::new();
    let mut transparent = false;
    for frame in frames {
        samples.extend(sample_frame(frame.as_ref()));
        transparent |= has_transparency(frame.as_ref());
    }
    let palette = finalize_palette(samples, max_colors, transparent)?;
    let tree = KdTree::build(&palette.colors);
    Ok(QuantizePlan { palette, tree })
}

/// Builds a palette from a single frame (per-frame palette strategy).
pub(crate) fn build_per_frame_plan(frame: ImgRef<'_, RGBA8>, max_colors: usize) -> EncodeResult<QuantizePlan> {
    let samples = sample_frame(frame);
    let transparent = has_transparency(frame);
    let palette = finalize_palette(samples, max_colors, transparent)?;
    let tree = KdTree::build(&palette.colors);
    Ok(QuantizePlan { palette, tree })
}

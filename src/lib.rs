//! Encodes a time-ordered sequence of RGBA video frames into a looping
//! GIF89a file or an animated WebP file.
//!
//! The pipeline runs leaves-first: a [`scale`] pass resamples incoming
//! frames to the requested output size, a quantizer builds a palette and
//! maps pixels to indices, a frame planner decides disposal/dirty-rect/
//! delay, and a writer serializes the result. [`encode`] is the thin façade
//! that drives all four stages, single-threaded and cooperatively
//! cancellable.

#[macro_use]
extern crate quick_error;

mod error;
pub use crate::error::*;
pub mod cancel;
pub mod progress;
mod gif_writer;
mod planner;
mod quantize;
mod scale;
mod types;
mod webp_writer;

pub use crate::scale::ScaleMode;
pub use crate::types::{EncodedArtifact, Palette, RgbaFrame};

use crate::cancel::CancellationToken;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter, Stage};
use crate::types::{Disposal, IndexedFrame, PlannedFrame, Rect};
use imgref::ImgVec;
use log::{debug, warn};
use rgb::RGBA8;
use std::rc::Rc;

/// Container format an [`encode`] call produces (spec §9: tagged variants,
/// dispatched statically — there is no open extension point).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Gif,
    WebP,
}

/// Palette size / dithering preset (spec §6: `quality`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    fn max_colors(self) -> usize {
        match self {
            Quality::Low => 128,
            Quality::Medium => 192,
            Quality::High => 256,
        }
    }

    /// Dithering off for `low` (intentionally: more compressible but
    /// banded, spec §9), on for `medium`/`high`.
    fn default_dither(self) -> bool {
        !matches!(self, Quality::Low)
    }
}

/// How the palette is built across the frame sequence (spec §4.2).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaletteStrategy {
    Global,
    PerFrame,
    Auto,
}

/// Floyd–Steinberg dithering toggle (spec §4.2).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dither {
    On,
    Off,
    Auto,
}

/// Looping behavior, encoded into the Netscape extension (GIF) or the
/// `ANIM` chunk's loop field (WebP).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Loop {
    Once,
    Infinite,
    Finite(u16),
}

/// Every option an implementer must honor (spec §6 configuration table).
/// The field is named `r#loop` to match the spec's own vocabulary exactly;
/// `loop` is a reserved word, so it's written as a raw identifier.
#[derive(Debug, Copy, Clone)]
pub struct EncodeOptions {
    pub format: Format,
    pub width: usize,
    pub height: usize,
    pub mode: ScaleMode,
    pub quality: Quality,
    pub target_fps: u32,
    pub r#loop: Loop,
    pub min_delay_ms: u16,
    pub palette_strategy: PaletteStrategy,
    pub dither: Dither,
}

impl EncodeOptions {
    /// Builds options with the spec's documented defaults (`min_delay_ms =
    /// 20`, `palette_strategy = auto`, `dither = auto`) for the given
    /// format and target size.
    pub fn new(format: Format, width: usize, height: usize) -> Self {
        Self {
            format,
            width,
            height,
            mode: ScaleMode::FitPreserveAspect,
            quality: Quality::Medium,
            target_fps: 30,
            r#loop: Loop::Infinite,
            min_delay_ms: 20,
            palette_strategy: PaletteStrategy::Auto,
            dither: Dither::Auto,
        }
    }
}

/// The item type a `FrameSource` collaborator yields: a successfully
/// decoded frame, or a boxed error if acquisition failed partway through
/// (spec §6: `FrameSource` may fail between frames).
pub type FrameSourceResult = Result<RgbaFrame, Box<dyn std::error::Error + Send + Sync>>;

struct ScaledFrame {
    image: ImgVec<RGBA8>,
    timestamp_ms: u64,
}

/// Encodes `frames` into a complete GIF89a or WebP animation (spec §4.6).
///
/// Runs single-threaded and cooperatively: the only suspension points are
/// reading the next frame from `frames` and emitting progress (spec §5).
/// `progress` and `cancel` are both optional; passing `None` for either is
/// equivalent to [`progress::NoProgress`] and an always-uncancelled token.
pub fn encode<I>(
    frames: I,
    opts: EncodeOptions,
    mut progress: Option<&mut dyn ProgressReporter>,
    cancel: Option<&CancellationToken>,
) -> EncodeResult<EncodedArtifact>
where
    I: IntoIterator<Item = FrameSourceResult>,
{
    if opts.width < 2 || opts.height < 2 {
        return Err(EncodeError::InvalidDimensions(opts.width, opts.height));
    }
    if opts.width > 65_535 || opts.height > 65_535 {
        return Err(EncodeError::DimensionOverflow(opts.width, opts.height));
    }

    let mut no_progress = NoProgress;
    let reporter: &mut dyn ProgressReporter = match progress.as_deref_mut() {
        Some(p) => p,
        None => &mut no_progress,
    };

    let is_cancelled = |cancel: Option<&CancellationToken>| cancel.map(CancellationToken::is_cancelled).unwrap_or(false);

    // Stage 1: read + scale. Every frame lands at the same fixed output
    // size, resolved once from the first frame's dimensions.
    let mut scaled_frames: Vec<ScaledFrame> = Vec::new();
    let mut target: Option<(usize, usize)> = None;
    let mut prev_ts: Option<u64> = None;

    for (index, item) in frames.into_iter().enumerate() {
        if is_cancelled(cancel) {
            debug!("cancellation observed before frame {index}");
            return Err(EncodeError::Cancelled);
        }

        let frame = item.map_err(EncodeError::FrameSourceFailed)?;
        if let Some(prev) = prev_ts {
            if frame.timestamp_ms == prev {
                warn!("frame {index} duplicates the previous timestamp ({prev}ms)");
                return Err(EncodeError::DuplicateTimestamp(frame.timestamp_ms));
            }
        }
        prev_ts = Some(frame.timestamp_ms);

        let (tw, th) = match target {
            Some(t) => t,
            None => {
                let t = scale::resolve_target(opts.mode, (opts.width, opts.height), (frame.image.width(), frame.image.height()))?;
                if t.0 > 65_535 || t.1 > 65_535 {
                    return Err(EncodeError::DimensionOverflow(t.0, t.1));
                }
                target = Some(t);
                t
            }
        };

        let scaled = scale::scale(frame.image.as_ref(), tw, th)?;
        scaled_frames.push(ScaledFrame { image: scaled, timestamp_ms: frame.timestamp_ms });

        if !reporter.report(ProgressEvent { stage: Stage::Scale, frame_index: index, frame_count: None, bytes_written: 0 }) {
            return Err(EncodeError::Cancelled);
        }
    }

    let frame_count = scaled_frames.len();
    let (target_w, target_h) = target.unwrap_or((opts.width, opts.height));
    debug!("scaled {frame_count} frames to {target_w}x{target_h}");

    // Auto requires knowing the total frame count before it can pick a
    // strategy, and the FrameSource is single-pass — so Auto buffers every
    // scaled frame the same way Global does (see DESIGN.md, Open Question
    // 1). PerFrame honors the streaming memory bound exactly because it
    // never needs more than the frame it's currently quantizing.
    let use_global = match opts.palette_strategy {
        PaletteStrategy::Global => true,
        PaletteStrategy::PerFrame => false,
        PaletteStrategy::Auto => frame_count <= 24,
    };

    let dither = match opts.dither {
        Dither::On => true,
        Dither::Off => false,
        Dither::Auto => opts.quality.default_dither(),
    };
    let max_colors = opts.quality.max_colors();

    let global_plan = if use_global {
        let images: Vec<ImgVec<RGBA8>> = scaled_frames.iter().map(|f| f.image.clone()).collect();
        let plan = quantize::build_global_plan(&images, max_colors)?;
        debug!("built a global palette of {} colors for {frame_count} frames", plan.palette.colors.len());
        Some(plan)
    } else {
        None
    };

    // Stage 2 + 3: quantize and plan, frame by frame, in order. The global
    // palette's Rc is allocated once and cloned (not rebuilt) per frame, so
    // `Rc::ptr_eq` below correctly recognizes every frame as sharing it —
    // allocating a fresh Rc per frame would make every frame past the first
    // look like a distinct local palette and defeat delta compression.
    let shared_global_palette = global_plan.as_ref().map(|plan| Rc::new(plan.palette.clone()));
    let mut planned_frames: Vec<PlannedFrame> = Vec::with_capacity(frame_count);
    let mut first_palette: Option<Rc<Palette>> = None;

    for (index, scaled) in scaled_frames.iter().enumerate() {
        if is_cancelled(cancel) {
            debug!("cancellation observed before frame {index}");
            return Err(EncodeError::Cancelled);
        }

        let (palette, raw_indices) = match (&global_plan, &shared_global_palette) {
            (Some(plan), Some(shared)) => (Rc::clone(shared), plan.quantize(scaled.image.as_ref(), dither)),
            _ => {
                let plan = quantize::build_per_frame_plan(scaled.image.as_ref(), max_colors)?;
                let indices = plan.quantize(scaled.image.as_ref(), dither);
                (Rc::new(plan.palette), indices)
            }
        };

        if !reporter.report(ProgressEvent { stage: Stage::Quantize, frame_index: index, frame_count: Some(frame_count), bytes_written: 0 }) {
            return Err(EncodeError::Cancelled);
        }

        let local_palette = match &first_palette {
            None => {
                first_palette = Some(Rc::clone(&palette));
                false
            }
            Some(first) => !Rc::ptr_eq(first, &palette),
        };

        let indexed = IndexedFrame {
            indices: ImgVec::new(raw_indices, target_w, target_h),
            palette,
            local_palette,
            dirty: Rect::full(target_w, target_h),
            disposal: Disposal::Keep,
        };

        let prev = planned_frames.last().map(|p: &PlannedFrame| &p.indexed);
        let next_ts = scaled_frames.get(index + 1).map(|f| f.timestamp_ms);
        let gif_browser_clamp = matches!(opts.format, Format::Gif);
        let planned = planner::plan_frame(prev, indexed, scaled.timestamp_ms, next_ts, opts.min_delay_ms, gif_browser_clamp)?;
        planned_frames.push(planned);

        if !reporter.report(ProgressEvent { stage: Stage::Plan, frame_index: index, frame_count: Some(frame_count), bytes_written: 0 }) {
            return Err(EncodeError::Cancelled);
        }
    }

    // Stage 4: write. Synchronous and run to completion, same as LZW and
    // RIFF assembly within a single frame (spec §5) — cancellation is not
    // polled again once writing starts.
    let bytes = match opts.format {
        Format::Gif => gif_writer::write(&planned_frames, target_w as u16, target_h as u16, opts.r#loop)?,
        Format::WebP => webp_writer::write(&planned_frames, target_w as u16, target_h as u16, opts.r#loop)?,
    };
    debug!("wrote {frame_count} frames as {:?}: {} bytes", opts.format, bytes.len());

    for index in 0..frame_count {
        reporter.report(ProgressEvent { stage: Stage::Write, frame_index: index, frame_count: Some(frame_count), bytes_written: bytes.len() as u64 });
    }

    let duration_ms = planned_frames.iter().map(|f| f.delay_ms as u64).sum();

    Ok(EncodedArtifact {
        byte_size: bytes.len(),
        bytes,
        width: target_w as u32,
        height: target_h as u32,
        frame_count: frame_count as u32,
        duration_ms,
        format: opts.format,
    })
}

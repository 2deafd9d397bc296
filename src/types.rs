//! Shared data types that flow between pipeline stages (spec §3).

use crate::error::{EncodeError, EncodeResult};
use imgref::ImgVec;
use rgb::{RGBA8, RGB8};
use std::rc::Rc;

/// Largest width or height accepted for an input frame.
pub const MAX_FRAME_DIMENSION: usize = 8192;

/// A single decoded RGBA frame from the `FrameSource`, non-premultiplied,
/// row-major.
pub struct RgbaFrame {
    pub image: ImgVec<RGBA8>,
    /// Presentation timestamp, strictly increasing across a source.
    pub timestamp_ms: u64,
}

impl RgbaFrame {
    /// Builds a frame from an already-typed pixel buffer.
    pub fn new(image: ImgVec<RGBA8>, timestamp_ms: u64) -> EncodeResult<Self> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 || width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
            return Err(EncodeError::InvalidDimensions(width, height));
        }
        Ok(Self { image, timestamp_ms })
    }

    /// Builds a frame from a raw, tightly packed RGBA byte buffer, as a
    /// `FrameSource` would typically hand pixels across an FFI boundary.
    pub fn from_bytes(width: usize, height: usize, bytes: &[u8], timestamp_ms: u64) -> EncodeResult<Self> {
        use rgb::FromSlice;
        let expected = width.saturating_mul(height).saturating_mul(4);
        if bytes.len() != expected {
            return Err(EncodeError::InvalidFrameBuffer(expected, bytes.len()));
        }
        let pixels: &[RGBA8] = bytes.as_rgba();
        Self::new(ImgVec::new(pixels.to_vec(), width, height), timestamp_ms)
    }
}

/// An axis-aligned rectangle, always within its owning frame's bounds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub(crate) fn full(width: usize, height: usize) -> Self {
        Self { x: 0, y: 0, w: width as u16, h: height as u16 }
    }
}

/// How the display area of a finished frame is treated before the next
/// frame is drawn (spec Glossary: Disposal method).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposal {
    /// Leave this frame's pixels on screen; the next frame draws on top.
    Keep,
    /// Clear the dirty rect to background before the next frame.
    RestoreBackground,
    /// Restore whatever was on screen before this frame.
    RestorePrevious,
}

/// An ordered, ≤256-entry RGB palette, with an optional reserved fully
/// transparent index (spec §3: `Palette`).
#[derive(Debug, Clone)]
pub struct Palette {
    pub colors: Vec<RGB8>,
    pub transparent_index: Option<u8>,
}

impl Palette {
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// A quantized frame: palette indices at full canvas size, plus the
/// planner's disposal/dirty-rect decision (spec §3: `IndexedFrame`).
pub(crate) struct IndexedFrame {
    pub indices: ImgVec<u8>,
    pub palette: Rc<Palette>,
    /// `true` when this frame's palette differs from the stream's shared
    /// (global) palette and must be written as a local color table.
    pub local_palette: bool,
    pub dirty: Rect,
    pub disposal: Disposal,
}

/// An `IndexedFrame` plus the timing decision the planner made for it
/// (spec §3: `PlannedFrame`).
pub(crate) struct PlannedFrame {
    pub indexed: IndexedFrame,
    pub delay_ms: u16,
    pub is_key: bool,
}

/// The final product of an [`crate::encode`] call (spec §3: `EncodedArtifact`).
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub duration_ms: u64,
    pub format: crate::Format,
    pub byte_size: usize,
}

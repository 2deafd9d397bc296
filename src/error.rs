//! Errors returned by [`crate::encode`].

use quick_error::quick_error;
use std::fmt;

quick_error! {
    /// Everything that can make an [`encode`][crate::encode] call fail.
    ///
    /// See spec §6/§7: programmer errors and resource errors are returned
    /// immediately with no retry, upstream errors are wrapped, and
    /// cancellation is reported through this same channel rather than as
    /// a panic or a partial artifact.
    #[derive(Debug)]
    pub enum EncodeError {
        /// A frame (or the requested output size) had width or height
        /// outside `1..=8192`, or width/height was zero.
        InvalidDimensions(width: usize, height: usize) {
            display("invalid dimensions {}x{}", width, height)
        }
        /// A frame's pixel buffer length didn't match `4 * width * height`.
        InvalidFrameBuffer(expected: usize, actual: usize) {
            display("expected frame buffer of {} bytes, got {}", expected, actual)
        }
        /// Two consecutive frames carried the same `timestamp_ms`.
        DuplicateTimestamp(timestamp_ms: u64) {
            display("duplicate frame timestamp {}ms", timestamp_ms)
        }
        /// Sampling produced fewer than 2 distinct colors even after
        /// padding with black.
        PaletteBuildFailed {
            display("could not build a palette from the sampled frames")
        }
        /// A quantized palette grew past 256 entries (spec §4.4/§4.5's
        /// writer-level `PaletteTooLarge(>256)` failure).
        PaletteTooLarge(size: usize) {
            display("palette has {} entries, maximum is 256", size)
        }
        /// A caller-requested color budget was too small to build any
        /// palette from (fewer than 2 colors, or 0 once a transparent
        /// index is reserved out of it). Distinct from `PaletteTooLarge`:
        /// this is too *few*, not too many.
        InvalidPaletteBudget(requested: usize) {
            display("requested palette budget of {} is too small to build a palette from", requested)
        }
        /// Output width or height exceeded 65535.
        DimensionOverflow(width: usize, height: usize) {
            display("output dimensions {}x{} exceed the 65535 limit", width, height)
        }
        /// More frames were supplied than a `u32` frame count can hold.
        FrameCountOverflow {
            display("frame count exceeds u32::MAX")
        }
        /// The frame source produced an `Err` partway through iteration.
        FrameSourceFailed(err: Box<dyn std::error::Error + Send + Sync>) {
            display("frame source failed: {}", err)
            source(&**err)
        }
        /// The caller's [`CancellationToken`][crate::cancel::CancellationToken]
        /// was observed cancelled at a suspension point. Not really an
        /// error: no artifact is produced, but none was expected either.
        Cancelled {
            display("encode was cancelled")
        }
        /// Writing the compressed bitstream failed (an I/O error from the
        /// caller-provided sink, or a writer-level invariant violation).
        Write(msg: String) {
            display("failed to write output: {}", msg)
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Write(err.to_string())
    }
}

impl From<gif::EncodingError> for EncodeError {
    fn from(err: gif::EncodingError) -> Self {
        EncodeError::Write(err.to_string())
    }
}

impl From<image_webp::EncodingError> for EncodeError {
    fn from(err: image_webp::EncodingError) -> Self {
        EncodeError::Write(err.to_string())
    }
}

/// Convenience alias, mirroring the teacher's own `CatResult<T>`.
pub type EncodeResult<T> = Result<T, EncodeError>;

impl fmt::Display for crate::Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            crate::Format::Gif => f.write_str("gif"),
            crate::Format::WebP => f.write_str("webp"),
        }
    }
}

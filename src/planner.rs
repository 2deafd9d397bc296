//! Frame Planner: disposal, dirty-rectangle, and delay decisions (spec
//! §4.3), grounded on the teacher's `make_diffs`/`remap_frames` staging.

use crate::error::{EncodeError, EncodeResult};
use crate::types::{Disposal, IndexedFrame, PlannedFrame, Rect};
use imgref::ImgVec;

/// Fraction of changed pixels above which the dirty rect is widened to the
/// full frame and disposal falls back to restore-background (spec §4.3).
const FULL_FRAME_CHANGE_THRESHOLD: f64 = 0.70;

/// Browser playback clamp (spec §4.3 point 1 / §9): real-world GIF decoders
/// substitute ~100ms for delays that round to 0 or 1 centisecond, so a raw
/// inter-frame gap under this many milliseconds is raised straight to
/// [`BROWSER_CLAMP_DELAY_MS`] instead of merely floored to `min_delay_ms` —
/// otherwise an explicit `min_delay_ms` equal to this threshold would hide
/// the gap and let a too-fast delay slip through unclamped into the GIF's
/// centisecond field. Only meaningful for GIF output; WebP delays are
/// written as-is in milliseconds (spec §4.3 point 1).
const BROWSER_CLAMP_THRESHOLD_MS: u64 = 20;
const BROWSER_CLAMP_DELAY_MS: u16 = 100;

/// Plans one frame given its predecessor (if any) and the timestamps
/// bracketing it. `min_delay_ms` and the 65535 ceiling come from
/// `EncodeOptions`; `next_ts_ms` is `None` for the final frame, in which
/// case the delay floors to `min_delay_ms`. `gif_browser_clamp` is set for
/// GIF output, applying the browser playback floor described above.
pub(crate) fn plan_frame(
    prev: Option<&IndexedFrame>,
    mut indexed: IndexedFrame,
    cur_ts_ms: u64,
    next_ts_ms: Option<u64>,
    min_delay_ms: u16,
    gif_browser_clamp: bool,
) -> EncodeResult<PlannedFrame> {
    let is_first = prev.is_none();

    let delay_ms = match next_ts_ms {
        Some(next_ts) => {
            if next_ts == cur_ts_ms {
                return Err(EncodeError::DuplicateTimestamp(cur_ts_ms));
            }
            if next_ts < cur_ts_ms {
                // A strictly-increasing FrameSource never produces this;
                // clamp defensively rather than underflow.
                min_delay_ms
            } else {
                let raw = next_ts - cur_ts_ms;
                if gif_browser_clamp && raw < BROWSER_CLAMP_THRESHOLD_MS {
                    (min_delay_ms as u64).max(BROWSER_CLAMP_DELAY_MS as u64).min(65_535) as u16
                } else {
                    raw.clamp(min_delay_ms as u64, 65_535) as u16
                }
            }
        }
        None => min_delay_ms,
    };

    let (dirty, disposal) = match prev {
        None => (Rect::full(indexed.indices.width(), indexed.indices.height()), Disposal::RestoreBackground),
        Some(prev) => {
            if indexed.local_palette {
                (Rect::full(indexed.indices.width(), indexed.indices.height()), Disposal::RestorePrevious)
            } else {
                dirty_rect_or_full(prev, &indexed)
            }
        }
    };

    carry_transparency(prev, &mut indexed, dirty);

    indexed.dirty = dirty;
    indexed.disposal = disposal;

    Ok(PlannedFrame { indexed, delay_ms, is_key: is_first })
}

/// Computes the smallest rect covering every changed pixel relative to
/// `prev`; falls back to a full-frame restore-background rect when more
/// than [`FULL_FRAME_CHANGE_THRESHOLD`] of pixels changed.
fn dirty_rect_or_full(prev: &IndexedFrame, cur: &IndexedFrame) -> (Rect, Disposal) {
    let (w, h) = (cur.indices.width(), cur.indices.height());
    let (mut min_x, mut min_y) = (w, h);
    let (mut max_x, mut max_y) = (0usize, 0usize);
    let mut changed = 0usize;

    for y in 0..h {
        let prev_row = prev.indices.row(y).unwrap_or(&[]);
        let cur_row = cur.indices.row(y).unwrap_or(&[]);
        for x in 0..w {
            if prev_row.get(x) != cur_row.get(x) {
                changed += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }

    let total = (w * h).max(1);
    if changed == 0 {
        // Nothing changed: emit a minimal 1x1 no-op rect, kept.
        return (Rect { x: 0, y: 0, w: 0, h: 0 }, Disposal::Keep);
    }
    if changed as f64 / total as f64 > FULL_FRAME_CHANGE_THRESHOLD {
        return (Rect::full(w, h), Disposal::RestoreBackground);
    }

    let rect = Rect {
        x: min_x as u16,
        y: min_y as u16,
        w: (max_x - min_x + 1) as u16,
        h: (max_y - min_y + 1) as u16,
    };
    (rect, Disposal::Keep)
}

/// Resolves a palette index to the color it renders as, or `None` when the
/// index is that palette's reserved transparent index (which has no RGB
/// value of its own to compare).
fn resolved_color(palette: &crate::types::Palette, index: u8) -> Option<rgb::RGB8> {
    if palette.transparent_index == Some(index) {
        return None;
    }
    palette.colors.get(index as usize).copied()
}

/// Rewrites indices inside the dirty rect that match `prev` to the
/// transparent index, improving LZW compressibility (spec §4.3 point 4).
///
/// Frames with a local palette (spec §4.2: per-frame quantization) have no
/// relationship between `prev` and `cur`'s raw index values — index `k` in
/// one frame's palette and index `k` in another's are, in general, entirely
/// different colors. Comparing by resolved RGB color rather than raw index
/// keeps this correct in both the shared (global-palette) and independent
/// (per-frame-palette) cases.
fn carry_transparency(prev: Option<&IndexedFrame>, cur: &mut IndexedFrame, dirty: Rect) {
    let Some(ti) = cur.palette.transparent_index else { return };
    let Some(prev) = prev else { return };
    if dirty.w == 0 || dirty.h == 0 {
        return;
    }

    let (w, h) = (cur.indices.width(), cur.indices.height());
    let mut buf = cur.indices.buf().to_vec();

    for y in dirty.y as usize..(dirty.y as usize + dirty.h as usize).min(h) {
        let prev_row = prev.indices.row(y).unwrap_or(&[]);
        for x in dirty.x as usize..(dirty.x as usize + dirty.w as usize).min(w) {
            let idx = y * w + x;
            let Some(&prev_index) = prev_row.get(x) else { continue };
            let prev_color = resolved_color(&prev.palette, prev_index);
            let cur_color = resolved_color(&cur.palette, buf[idx]);
            if prev_color == cur_color {
                buf[idx] = ti;
            }
        }
    }
    cur.indices = ImgVec::new(buf, w, h);
}

//! GIF89a serialization (spec §4.4), grounded on the teacher's
//! `encoderust.rs` pattern of building a `gif::Frame` per planned frame and
//! handing it to a `gif::Encoder`. The teacher's gifsicle FFI lossy path is
//! dropped: this writer always uses the `gif` crate's own LZW encoder.

use crate::error::EncodeResult;
use crate::types::{Disposal, PlannedFrame};
use crate::Loop;
use std::rc::Rc;

fn disposal_method(d: Disposal) -> gif::DisposalMethod {
    match d {
        Disposal::Keep => gif::DisposalMethod::Keep,
        Disposal::RestoreBackground => gif::DisposalMethod::Background,
        Disposal::RestorePrevious => gif::DisposalMethod::Previous,
    }
}

/// Converts a `Palette`'s RGB triples into the flat byte form `gif::Encoder`
/// and `gif::Frame` expect, padded to the next power of two as required by
/// the logical screen / local color table layout (spec §4.4).
fn palette_bytes(colors: &[rgb::RGB8]) -> Vec<u8> {
    let padded_len = colors.len().max(2).next_power_of_two();
    let mut bytes = Vec::with_capacity(padded_len * 3);
    for c in colors {
        bytes.extend_from_slice(&[c.r, c.g, c.b]);
    }
    while bytes.len() < padded_len * 3 {
        bytes.extend_from_slice(&[0, 0, 0]);
    }
    bytes
}

/// Converts a millisecond delay to the nearest GIF centisecond. The 20ms
/// browser-clamp floor (spec §4.3) is applied earlier, by the planner,
/// against the raw inter-frame gap — see `planner::plan_frame` — so by the
/// time a delay reaches the writer it only needs rounding, not re-flooring.
fn delay_to_centiseconds(delay_ms: u16) -> u16 {
    ((delay_ms as u32 + 5) / 10).min(65_535) as u16
}

/// Serializes `frames` (already scaled, quantized, and planned) into a
/// complete GIF89a byte stream.
pub(crate) fn write(frames: &[PlannedFrame], width: u16, height: u16, loop_opt: Loop) -> EncodeResult<Vec<u8>> {
    let mut out = Vec::new();
    let first_palette = frames.first().map(|f| Rc::clone(&f.indexed.palette));
    let global_palette = first_palette.as_ref().map(|p| palette_bytes(&p.colors)).unwrap_or_default();

    {
        let mut encoder = gif::Encoder::new(&mut out, width, height, &global_palette)?;
        match loop_opt {
            Loop::Once => {}
            Loop::Infinite => encoder.set_repeat(gif::Repeat::Infinite)?,
            Loop::Finite(n) => encoder.set_repeat(gif::Repeat::Finite(n))?,
        }

        for planned in frames {
            let indexed = &planned.indexed;
            let (buffer, w, h) = {
                let (buf, w, h) = indexed.indices.as_ref().to_contiguous_buf();
                (buf.into_owned(), w, h)
            };

            let local_palette = if indexed.local_palette {
                Some(palette_bytes(&indexed.palette.colors))
            } else {
                None
            };

            let frame = gif::Frame {
                delay: delay_to_centiseconds(planned.delay_ms),
                dispose: disposal_method(indexed.disposal),
                transparent: indexed.palette.transparent_index,
                needs_user_input: false,
                top: indexed.dirty.y,
                left: indexed.dirty.x,
                width: indexed.dirty.w.max(1),
                height: indexed.dirty.h.max(1),
                interlaced: false,
                palette: local_palette,
                buffer: std::borrow::Cow::Owned(sub_image(&buffer, w, h, indexed.dirty)),
            };

            encoder.write_frame(&frame)?;
        }
    }

    Ok(out)
}

/// Extracts the pixel indices covered by `dirty` out of a full-canvas index
/// buffer, since `gif::Frame` only carries the pixels within its own
/// image-descriptor rectangle.
fn sub_image(full: &[u8], width: usize, height: usize, dirty: crate::types::Rect) -> Vec<u8> {
    let (x0, y0) = (dirty.x as usize, dirty.y as usize);
    let (w, h) = (dirty.w.max(1) as usize, dirty.h.max(1) as usize);
    let mut out = Vec::with_capacity(w * h);
    for y in y0..(y0 + h).min(height) {
        let row_start = y * width + x0;
        let row_end = (row_start + w).min(y * width + width);
        out.extend_from_slice(&full[row_start..row_end]);
        // Pad any truncation (dirty rect touching the frame edge) with the
        // last sampled index so the buffer always matches w*h exactly.
        while out.len() < (y - y0 + 1) * w {
            out.push(*out.last().unwrap_or(&0));
        }
    }
    out
}

//! RIFF/WebP animation serialization (spec §4.5). The teacher never emits
//! WebP; this is grounded on `natefzz-takumi`'s
//! `rendering::write::encode_animated_webp`, which already does exactly
//! this: per-frame lossless VP8L via `image_webp::WebPEncoder`, then a
//! hand-assembled `RIFF`/`VP8X`/`ANIM`/`ANMF` container.

use crate::error::{EncodeError, EncodeResult};
use crate::types::{Disposal, PlannedFrame};
use crate::Loop;
use image_webp::WebPEncoder;

const U24_MAX: u32 = 0x00FF_FFFF;

/// Re-expands a frame's dirty-rect-sized palette indices to tightly packed
/// RGBA bytes, so the sub-image can be handed to `WebPEncoder` untouched by
/// the palette reduction that produced it (spec §4.5: "losslessly stores
/// the quantized indexed pixels re-expanded to RGBA").
fn dirty_rect_rgba(planned: &PlannedFrame) -> Vec<u8> {
    let indexed = &planned.indexed;
    let dirty = indexed.dirty;
    let (full_w, full_h) = (indexed.indices.width(), indexed.indices.height());
    let (x0, y0) = (dirty.x as usize, dirty.y as usize);
    let (w, h) = (dirty.w.max(1) as usize, dirty.h.max(1) as usize);

    let mut out = Vec::with_capacity(w * h * 4);
    for y in y0..(y0 + h).min(full_h) {
        let row = indexed.indices.row(y).unwrap_or(&[]);
        for x in x0..(x0 + w).min(full_w) {
            let index = row.get(x).copied().unwrap_or(0);
            let (r, g, b, a) = match indexed.palette.transparent_index {
                Some(ti) if ti == index => (0, 0, 0, 0),
                _ => {
                    let c = indexed.palette.colors.get(index as usize).copied().unwrap_or(rgb::RGB8::new(0, 0, 0));
                    (c.r, c.g, c.b, 255)
                }
            };
            out.extend_from_slice(&[r, g, b, a]);
        }
    }
    out
}

/// Extracts the `VP8L`/`VP8 ` payload out of a standalone single-image WebP
/// buffer produced by [`WebPEncoder`], skipping the 12-byte RIFF/WEBP
/// header and walking chunks by their length prefix.
fn extract_vp8_payload(buf: &[u8]) -> EncodeResult<&[u8]> {
    let mut i = 12usize;
    while i + 8 <= buf.len() {
        let len = u32::from_le_bytes(
            buf[i + 4..i + 8].try_into().map_err(|_| EncodeError::Write("malformed sub-image chunk".into()))?,
        ) as usize;

        let start = i + 8;
        let end = start + len;
        if end > buf.len() {
            break;
        }

        if &buf[i..i + 4] == b"VP8L" || &buf[i..i + 4] == b"VP8 " {
            return Ok(&buf[start..end]);
        }
        i = end + (len & 1);
    }
    Err(EncodeError::Write("failed to extract VP8 payload from sub-image".into()))
}

/// Serializes `frames` into a complete RIFF/WebP animation.
pub(crate) fn write(frames: &[PlannedFrame], width: u16, height: u16, loop_opt: Loop) -> EncodeResult<Vec<u8>> {
    if frames.len() > u32::MAX as usize {
        return Err(EncodeError::FrameCountOverflow);
    }

    let any_transparent = frames.iter().any(|f| f.indexed.palette.transparent_index.is_some());

    let mut chunks = Vec::new();

    let vp8x_flags: u8 = (1 << 1) | if any_transparent { 1 << 4 } else { 0 };
    chunks.extend_from_slice(b"VP8X");
    chunks.extend_from_slice(&10u32.to_le_bytes());
    chunks.push(vp8x_flags);
    chunks.extend_from_slice(&[0u8; 3]);
    chunks.extend_from_slice(&(width as u32 - 1).to_le_bytes()[..3]);
    chunks.extend_from_slice(&(height as u32 - 1).to_le_bytes()[..3]);

    let loop_count: u16 = match loop_opt {
        Loop::Once => 1,
        Loop::Infinite => 0,
        Loop::Finite(n) => n,
    };
    chunks.extend_from_slice(b"ANIM");
    chunks.extend_from_slice(&6u32.to_le_bytes());
    chunks.extend_from_slice(&[0u8; 4]); // background color, BGRA, unused
    chunks.extend_from_slice(&loop_count.to_le_bytes());

    for planned in frames {
        let indexed = &planned.indexed;
        let dirty = indexed.dirty;
        let (w, h) = (dirty.w.max(1), dirty.h.max(1));

        let rgba = dirty_rect_rgba(planned);
        let mut sub_buf = Vec::new();
        WebPEncoder::new(&mut sub_buf)
            .encode(&rgba, w as u32, h as u32, image_webp::ColorType::Rgba8)
            .map_err(EncodeError::from)?;
        let vp8_payload = extract_vp8_payload(&sub_buf)?;

        let blend = !(planned.is_key || (dirty.w as usize * dirty.h as usize) == (width as usize * height as usize));
        let dispose = matches!(indexed.disposal, Disposal::RestoreBackground);
        let frame_flags = ((blend as u8) << 1) | (dispose as u8);

        let payload_padded = vp8_payload.len() + (vp8_payload.len() & 1);
        let anmf_size = 16 + 8 + payload_padded;

        chunks.extend_from_slice(b"ANMF");
        chunks.extend_from_slice(&(anmf_size as u32).to_le_bytes());
        chunks.extend_from_slice(&(dirty.x as u32).to_le_bytes()[..3]);
        chunks.extend_from_slice(&(dirty.y as u32).to_le_bytes()[..3]);
        chunks.extend_from_slice(&(w as u32 - 1).to_le_bytes()[..3]);
        chunks.extend_from_slice(&(h as u32 - 1).to_le_bytes()[..3]);
        chunks.extend_from_slice(&(planned.delay_ms as u32).clamp(0, U24_MAX).to_le_bytes()[..3]);
        chunks.push(frame_flags);

        chunks.extend_from_slice(b"VP8L");
        chunks.extend_from_slice(&(vp8_payload.len() as u32).to_le_bytes());
        chunks.extend_from_slice(vp8_payload);
        if vp8_payload.len() & 1 == 1 {
            chunks.push(0);
        }
    }

    let mut out = Vec::with_capacity(12 + chunks.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((4 + chunks.len()) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&chunks);

    Ok(out)
}

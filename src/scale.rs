//! Resolution Scaler (spec §4.1).

use crate::error::{EncodeError, EncodeResult};
use imgref::{ImgRef, ImgVec};
use rgb::{ComponentMap, RGBA8};

/// A resize target: exact dimensions, or a max box to fit into while
/// preserving aspect ratio.
#[derive(Debug, Copy, Clone)]
pub enum ScaleMode {
    Exact,
    FitPreserveAspect,
}

/// Named presets from spec §4.1, resolved to exact pixel dimensions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Preset {
    P144,
    P240,
    P360,
    P480,
    P720,
    Original,
}

impl Preset {
    pub fn dimensions(self) -> Option<(usize, usize)> {
        match self {
            Preset::P144 => Some((256, 144)),
            Preset::P240 => Some((426, 240)),
            Preset::P360 => Some((640, 360)),
            Preset::P480 => Some((854, 480)),
            Preset::P720 => Some((1280, 720)),
            Preset::Original => None,
        }
    }
}

/// Rounds a target dimension to the nearest even integer, never below 2.
fn round_even(v: f64) -> usize {
    let r = v.round() as i64;
    let r = r.max(2);
    if r % 2 == 1 { (r + 1) as usize } else { r as usize }
}

/// Resolves the scaler's target size for a given source frame, per
/// spec §4.1: exact dimensions are used as-is (rounded to even); a
/// fit-preserving target keeps the source aspect ratio to within 1px.
pub fn resolve_target(
    mode: ScaleMode,
    target: (usize, usize),
    source: (usize, usize),
) -> EncodeResult<(usize, usize)> {
    let (tw, th) = target;
    let (sw, sh) = source;
    if tw == 0 || th == 0 {
        return Err(EncodeError::InvalidDimensions(tw, th));
    }
    match mode {
        ScaleMode::Exact => Ok((round_even(tw as f64), round_even(th as f64))),
        ScaleMode::FitPreserveAspect => {
            let scale = (tw as f64 / sw as f64).min(th as f64 / sh as f64);
            let w = round_even(sw as f64 * scale);
            let h = round_even(sh as f64 * scale);
            Ok((w, h))
        }
    }
}

/// Scales `src` to exactly `(dst_w, dst_h)`.
///
/// For downscale ratios greater than 2× on either axis, repeatedly halves
/// (area-averaging 2×2 blocks) until the remaining ratio is ≤2×, then
/// finishes with one bilinear pass — this keeps small text/UI overlays
/// legible instead of blurring them away in one huge filter kernel.
/// Upscales and ≤2× downscales go straight to bilinear.
pub fn scale(src: ImgRef<'_, RGBA8>, dst_w: usize, dst_h: usize) -> EncodeResult<ImgVec<RGBA8>> {
    let (sw, sh) = (src.width(), src.height());
    if sw == 0 || sh == 0 || dst_w == 0 || dst_h == 0 {
        return Err(EncodeError::InvalidDimensions(dst_w, dst_h));
    }
    if sw == dst_w && sh == dst_h {
        let (buf, w, h) = src.to_contiguous_buf();
        return Ok(ImgVec::new(buf.into_owned(), w, h));
    }

    let mut current = {
        let (buf, w, h) = src.to_contiguous_buf();
        ImgVec::new(buf.into_owned(), w, h)
    };

    // Step down in ≤2x increments while we'd otherwise downscale by more
    // than 2x on either axis.
    loop {
        let (cw, ch) = (current.width(), current.height());
        let ratio_w = cw as f64 / dst_w as f64;
        let ratio_h = ch as f64 / dst_h as f64;
        if ratio_w <= 2.0 && ratio_h <= 2.0 {
            break;
        }
        let next_w = (cw / 2).max(dst_w);
        let next_h = (ch / 2).max(dst_h);
        current = box_average(current.as_ref(), next_w, next_h);
    }

    if current.width() == dst_w && current.height() == dst_h {
        Ok(current)
    } else {
        Ok(bilinear(current.as_ref(), dst_w, dst_h))
    }
}

/// One 2×2 (or nearest) area-average downsampling step.
fn box_average(src: ImgRef<'_, RGBA8>, dst_w: usize, dst_h: usize) -> ImgVec<RGBA8> {
    let (sw, sh) = (src.width(), src.height());
    let mut out = vec![RGBA8::new(0, 0, 0, 0); dst_w * dst_h];
    for y in 0..dst_h {
        let y0 = y * sh / dst_h;
        let y1 = ((y + 1) * sh / dst_h).max(y0 + 1).min(sh);
        for x in 0..dst_w {
            let x0 = x * sw / dst_w;
            let x1 = ((x + 1) * sw / dst_w).max(x0 + 1).min(sw);

            let (mut r, mut g, mut b, mut a) = (0u32, 0u32, 0u32, 0u32);
            let mut n = 0u32;
            for sy in y0..y1 {
                let row = &src.buf()[sy * src.stride()..sy * src.stride() + sw];
                for px in &row[x0..x1] {
                    r += px.r as u32;
                    g += px.g as u32;
                    b += px.b as u32;
                    a += px.a as u32;
                    n += 1;
                }
            }
            let n = n.max(1);
            out[y * dst_w + x] = RGBA8::new((r / n) as u8, (g / n) as u8, (b / n) as u8, (a / n) as u8);
        }
    }
    ImgVec::new(out, dst_w, dst_h)
}

/// A single bilinear resampling pass, used for the final step of a
/// downscale and for the entirety of an upscale.
fn bilinear(src: ImgRef<'_, RGBA8>, dst_w: usize, dst_h: usize) -> ImgVec<RGBA8> {
    let (sw, sh) = (src.width(), src.height());
    let mut out = vec![RGBA8::new(0, 0, 0, 0); dst_w * dst_h];

    let x_ratio = if dst_w > 1 { (sw - 1).max(0) as f64 / (dst_w - 1).max(1) as f64 } else { 0.0 };
    let y_ratio = if dst_h > 1 { (sh - 1).max(0) as f64 / (dst_h - 1).max(1) as f64 } else { 0.0 };

    let at = |x: usize, y: usize| -> RGBA8 {
        src.buf()[y * src.stride() + x]
    };

    for y in 0..dst_h {
        let sy = (y as f64 * y_ratio).min((sh - 1) as f64);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let wy = sy - y0 as f64;

        for x in 0..dst_w {
            let sx = (x as f64 * x_ratio).min((sw - 1) as f64);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let wx = sx - x0 as f64;

            let p00 = at(x0, y0).map(f64::from);
            let p10 = at(x1, y0).map(f64::from);
            let p01 = at(x0, y1).map(f64::from);
            let p11 = at(x1, y1).map(f64::from);

            let top = p00 * (1.0 - wx) + p10 * wx;
            let bottom = p01 * (1.0 - wx) + p11 * wx;
            let blended = top * (1.0 - wy) + bottom * wy;

            out[y * dst_w + x] = blended.map(|c| c.round().clamp(0.0, 255.0) as u8);
        }
    }
    ImgVec::new(out, dst_w, dst_h)
}

//! Floyd–Steinberg error diffusion (spec §4.2), operating on linearized
//! sRGB with the canonical 7/16, 3/16, 5/16, 1/16 weights.

use super::color::{linear_to_srgb, srgb_to_linear};
use super::kdtree::KdTree;
use imgref::ImgRef;
use rgb::{RGB8, RGBA8};

/// Quantizes `src` against `palette` with Floyd–Steinberg dithering,
/// returning one palette index per pixel. `transparent_threshold` pixels
/// (alpha below it) are mapped straight to `transparent_index` without
/// diffusing error, matching the quantizer's transparent-index contract.
pub fn dither_to_indices(
    src: ImgRef<'_, RGBA8>,
    palette: &[RGB8],
    tree: &KdTree,
    transparent_index: Option<u8>,
) -> Vec<u8> {
    let (w, h) = (src.width(), src.height());
    let mut indices = vec![0u8; w * h];

    // One running error accumulator per channel, per pixel; row-major,
    // non-serpentine traversal (matches the canonical algorithm).
    let mut err_r = vec![0f32; w * h];
    let mut err_g = vec![0f32; w * h];
    let mut err_b = vec![0f32; w * h];

    for y in 0..h {
        let row = src.row(y).unwrap_or(&[]);
        for x in 0..w {
            let pixel = row[x];
            let idx = y * w + x;

            if let Some(ti) = transparent_index {
                if pixel.a < 128 {
                    indices[idx] = ti;
                    continue;
                }
            }

            let lr = (srgb_to_linear(pixel.r) + err_r[idx]).clamp(0.0, 1.0);
            let lg = (srgb_to_linear(pixel.g) + err_g[idx]).clamp(0.0, 1.0);
            let lb = (srgb_to_linear(pixel.b) + err_b[idx]).clamp(0.0, 1.0);

            let target = RGB8::new(linear_to_srgb(lr), linear_to_srgb(lg), linear_to_srgb(lb));
            let chosen = tree.nearest(target);
            indices[idx] = chosen as u8;

            let picked = palette[chosen];
            let er = lr - srgb_to_linear(picked.r);
            let eg = lg - srgb_to_linear(picked.g);
            let eb = lb - srgb_to_linear(picked.b);

            diffuse(&mut err_r, w, h, x, y, er);
            diffuse(&mut err_g, w, h, x, y, eg);
            diffuse(&mut err_b, w, h, x, y, eb);
        }
    }

    indices
}

/// Spreads one channel's quantization error to the right, below-left,
/// below, and below-right neighbors with the canonical weights.
fn diffuse(err: &mut [f32], w: usize, h: usize, x: usize, y: usize, amount: f32) {
    let mut add = |x: i64, y: i64, weight: f32| {
        if x < 0 || y < 0 || x as usize >= w || y as usize >= h {
            return;
        }
        err[y as usize * w + x as usize] += amount * weight;
    };
    add(x as i64 + 1, y as i64, 7.0 / 16.0);
    add(x as i64 - 1, y as i64 + 1, 3.0 / 16.0);
    add(x as i64, y as i64 + 1, 5.0 / 16.0);
    add(x as i64 + 1, y as i64 + 1, 1.0 / 16.0);
}

/// Quantizes without dithering: nearest palette color per pixel.
pub fn nearest_to_indices(
    src: ImgRef<'_, RGBA8>,
    tree: &KdTree,
    transparent_index: Option<u8>,
) -> Vec<u8> {
    let (w, h) = (src.width(), src.height());
    let mut indices = vec![0u8; w * h];
    for y in 0..h {
        let row = src.row(y).unwrap_or(&[]);
        for x in 0..w {
            let pixel = row[x];
            indices[y * w + x] = if let Some(ti) = transparent_index {
                if pixel.a < 128 {
                    ti
                } else {
                    tree.nearest(RGB8::new(pixel.r, pixel.g, pixel.b)) as u8
                }
            } else {
                tree.nearest(RGB8::new(pixel.r, pixel.g, pixel.b)) as u8
            };
        }
    }
    indices
}

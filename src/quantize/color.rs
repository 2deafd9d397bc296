//! sRGB ↔ linear conversion helpers used by the dither pass (spec §4.2:
//! error diffusion "operates on linearized sRGB").

/// Converts one 8-bit sRGB channel to linear light in `[0.0, 1.0]`.
pub fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Converts a linear-light value in `[0.0, 1.0]` back to an 8-bit sRGB
/// channel, clamping out-of-range input (dithering can push values
/// slightly outside the unit range).
pub fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let encoded = if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round().clamp(0.0, 255.0) as u8
}

//! End-to-end scenarios against the public `encode()` façade, covering the
//! concrete byte-level scenarios this crate's design doc enumerates plus
//! the general testable properties (determinism, duration conservation,
//! palette closure, framing invariants).

use clipanim::cancel::CancellationToken;
use clipanim::progress::{ProgressEvent, ProgressReporter};
use clipanim::{encode, EncodeError, EncodeOptions, Format, FrameSourceResult, Loop, PaletteStrategy, Quality, RgbaFrame};
use imgref::ImgVec;
use rgb::RGBA8;

fn solid(w: usize, h: usize, color: RGBA8, ts: u64) -> FrameSourceResult {
    RgbaFrame::new(ImgVec::new(vec![color; w * h], w, h), ts).map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
}

/// Surfaces the crate's `log::info!` calls under `cargo test -- --nocapture`;
/// harmless to call more than once since later `try_init` calls are no-ops.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn red() -> RGBA8 {
    RGBA8::new(255, 0, 0, 255)
}

fn blue() -> RGBA8 {
    RGBA8::new(0, 0, 255, 255)
}

/// Owned snapshot of the fields these tests need from a decoded `gif::Frame`
/// (the borrowed `gif::Frame<'_>` itself is tied to the decoder's buffer).
struct FrameGeometry {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    dispose: gif::DisposalMethod,
    delay: u16,
}

/// Decodes `gif_bytes` into one [`FrameGeometry`] per emitted frame,
/// compositing through `gif_dispose::Screen` the same way a real player
/// would (grounded on the teacher's own decode-and-compare test helper).
fn decode_gif_frames(mut gif_bytes: &[u8]) -> Vec<FrameGeometry> {
    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = opts.read_info(&mut gif_bytes).unwrap();
    let mut screen = gif_dispose::Screen::new_decoder(&decoder);
    let mut out = Vec::new();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        screen.blit_frame(frame).unwrap();
        out.push(FrameGeometry {
            left: frame.left,
            top: frame.top,
            width: frame.width,
            height: frame.height,
            dispose: frame.dispose,
            delay: frame.delay,
        });
    }
    out
}

#[test]
fn single_solid_frame_gif_matches_exact_byte_layout() {
    init_logging();
    // spec scenario 1: a 2x2 red frame, quality=low, with a 100ms delay
    // (this crate derives per-frame delay from consecutive timestamps, so
    // a single-frame encode's only delay knob is `min_delay_ms` — set to
    // 100 here to stand in for the scenario's notional "next_ts=100ms").
    let frames = vec![solid(2, 2, red(), 0)];
    let mut opts = EncodeOptions::new(Format::Gif, 2, 2);
    opts.quality = Quality::Low;
    opts.min_delay_ms = 100;
    opts.r#loop = Loop::Once;

    let artifact = encode(frames, opts, None, None).unwrap();
    let bytes = &artifact.bytes;

    assert_eq!(&bytes[0..6], b"GIF89a");
    assert_eq!(&bytes[6..10], &[0x02, 0x00, 0x02, 0x00]); // logical screen 2x2
    assert_eq!(bytes[bytes.len() - 1], 0x3B); // trailer

    let decoded = decode_gif_frames(bytes);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].delay, 10); // 0x0A centiseconds == 100ms
}

#[test]
fn two_frame_delta_gif_has_a_minimal_dirty_rectangle() {
    // spec scenario 2: 4x4 red, then 4x4 red with one blue pixel at (0,0).
    let mut second = vec![red(); 16];
    second[0] = blue();
    let frames = vec![
        solid(4, 4, red(), 0),
        RgbaFrame::new(ImgVec::new(second, 4, 4), 50).map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    ];
    let mut opts = EncodeOptions::new(Format::Gif, 4, 4);
    opts.min_delay_ms = 20;
    opts.palette_strategy = PaletteStrategy::Global;

    let artifact = encode(frames, opts, None, None).unwrap();
    let decoded = decode_gif_frames(&artifact.bytes);
    assert_eq!(decoded.len(), 2);

    let second_frame = &decoded[1];
    assert_eq!((second_frame.left, second_frame.top), (0, 0));
    assert_eq!((second_frame.width, second_frame.height), (1, 1));
    assert_eq!(second_frame.dispose, gif::DisposalMethod::Keep);
}

#[test]
fn infinite_loop_writes_the_netscape_extension_exactly_once() {
    let frames = vec![solid(2, 2, red(), 0), solid(2, 2, blue(), 40)];
    let mut opts = EncodeOptions::new(Format::Gif, 2, 2);
    opts.r#loop = Loop::Infinite;

    let artifact = encode(frames, opts, None, None).unwrap();
    let needle: &[u8] = &[
        0x21, 0xFF, 0x0B, 0x4E, 0x45, 0x54, 0x53, 0x43, 0x41, 0x50, 0x45, 0x32, 0x2E, 0x30, 0x03, 0x01, 0x00, 0x00, 0x00,
    ];
    let count = artifact.bytes.windows(needle.len()).filter(|w| *w == needle).count();
    assert_eq!(count, 1);

    // The extension must precede all frame data: find the first image
    // descriptor ('0x2C') after it and check ordering.
    let ext_pos = artifact.bytes.windows(needle.len()).position(|w| w == needle).unwrap();
    let first_frame_pos = artifact.bytes[ext_pos..].iter().position(|&b| b == 0x2C).map(|p| p + ext_pos);
    assert!(first_frame_pos.is_some());
    assert!(ext_pos < first_frame_pos.unwrap());
}

#[test]
fn webp_animation_has_riff_magic_vp8x_anim_flag_and_three_frames() {
    let frames = vec![
        solid(8, 8, red(), 0),
        solid(8, 8, RGBA8::new(0, 255, 0, 255), 30),
        solid(8, 8, blue(), 60),
    ];
    let mut opts = EncodeOptions::new(Format::WebP, 8, 8);
    opts.r#loop = Loop::Infinite;

    let artifact = encode(frames, opts, None, None).unwrap();
    let bytes = &artifact.bytes;

    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WEBP");
    assert_eq!(&bytes[12..16], b"VP8X");
    assert_eq!(bytes[20] & 0x02, 0x02); // animation flag

    let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(riff_size as usize, bytes.len() - 8);

    // ANIM chunk directly follows the 18-byte VP8X chunk (8 header + 10 payload).
    let anim_start = 12 + 18;
    assert_eq!(&bytes[anim_start..anim_start + 4], b"ANIM");
    let anim_payload = anim_start + 8;
    assert_eq!(&bytes[anim_payload + 4..anim_payload + 6], &[0, 0]); // loop = infinite

    let anmf_count = bytes.windows(4).filter(|w| *w == b"ANMF").count();
    assert_eq!(anmf_count, 3);
    assert_eq!(artifact.frame_count, 3);
}

#[test]
fn browser_clamp_rule_raises_too_fast_gif_delays_to_100ms() {
    // spec scenario 5: four frames 10ms apart, min_delay_ms=20 — each
    // emitted delay must be 0x000A (100ms), not 0x0001 (10ms) or the
    // min_delay floor's own 0x0002 (20ms).
    let frames = vec![
        solid(2, 2, red(), 0),
        solid(2, 2, red(), 10),
        solid(2, 2, red(), 20),
        solid(2, 2, red(), 30),
    ];
    let mut opts = EncodeOptions::new(Format::Gif, 2, 2);
    opts.min_delay_ms = 20;

    let artifact = encode(frames, opts, None, None).unwrap();
    let decoded = decode_gif_frames(&artifact.bytes);
    assert_eq!(decoded.len(), 4);
    for f in &decoded[..3] {
        assert_eq!(f.delay, 10, "expected 0x000A (100ms) centiseconds");
    }
}

#[test]
fn cancelling_mid_stream_yields_no_artifact() {
    init_logging();
    struct CountingProgress {
        seen: Vec<usize>,
        cancel_after: usize,
        token: CancellationToken,
    }
    impl ProgressReporter for CountingProgress {
        fn report(&mut self, event: ProgressEvent) -> bool {
            self.seen.push(event.frame_index);
            if event.frame_index >= self.cancel_after {
                self.token.cancel();
            }
            true
        }
    }

    let frames: Vec<_> = (0..10).map(|n| solid(4, 4, red(), n as u64 * 10)).collect();
    let opts = EncodeOptions::new(Format::Gif, 4, 4);
    let token = CancellationToken::new();
    let mut progress = CountingProgress { seen: Vec::new(), cancel_after: 2, token: token.clone() };

    let result = encode(frames, opts, Some(&mut progress), Some(&token));
    assert!(matches!(result, Err(EncodeError::Cancelled)));

    let max_index = progress.seen.iter().copied().max().unwrap_or(0);
    assert!(max_index <= 3, "cancellation should stop ingestion shortly after frame 2, saw up to {max_index}");
}

#[test]
fn byte_determinism_across_two_identical_encodes() {
    init_logging();
    let make = || {
        vec![
            solid(6, 6, red(), 0),
            solid(6, 6, RGBA8::new(10, 200, 30, 255), 33),
            solid(6, 6, blue(), 66),
        ]
    };
    let opts_a = EncodeOptions::new(Format::Gif, 6, 6);
    let opts_b = EncodeOptions::new(Format::Gif, 6, 6);
    let a = encode(make(), opts_a, None, None).unwrap();
    let b = encode(make(), opts_b, None, None).unwrap();
    assert_eq!(a.bytes, b.bytes);

    let opts_a = EncodeOptions::new(Format::WebP, 6, 6);
    let opts_b = EncodeOptions::new(Format::WebP, 6, 6);
    let a = encode(make(), opts_a, None, None).unwrap();
    let b = encode(make(), opts_b, None, None).unwrap();
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn duration_conserves_the_sum_of_clamped_delays() {
    let frames = vec![solid(4, 4, red(), 0), solid(4, 4, blue(), 120), solid(4, 4, red(), 300)];
    let mut opts = EncodeOptions::new(Format::Gif, 4, 4);
    opts.min_delay_ms = 20;
    let artifact = encode(frames, opts, None, None).unwrap();
    // 120 + 180, then the last frame floors to min_delay_ms (20).
    assert_eq!(artifact.duration_ms, 120 + 180 + 20);
}

#[test]
fn every_gif_index_stays_within_the_active_palette() {
    let frames: Vec<_> = (0..20)
        .map(|n| solid(16, 16, RGBA8::new((n * 13) as u8, (n * 37) as u8, (n * 61) as u8, 255), n as u64 * 40))
        .collect();
    let mut opts = EncodeOptions::new(Format::Gif, 16, 16);
    opts.palette_strategy = PaletteStrategy::PerFrame;
    let artifact = encode(frames, opts, None, None).unwrap();

    let mut gif_bytes = artifact.bytes.as_slice();
    let mut decode_opts = gif::DecodeOptions::new();
    decode_opts.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = decode_opts.read_info(&mut gif_bytes).unwrap();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        let palette_len = frame
            .palette
            .as_deref()
            .or_else(|| decoder.global_palette())
            .map(|p| p.len() / 3)
            .unwrap_or(0);
        assert!(palette_len > 0);
        for &index in frame.buffer.iter() {
            assert!((index as usize) < palette_len, "index {index} exceeds palette of {palette_len}");
        }
    }
}

#[test]
fn gif_image_data_ends_with_a_zero_length_sub_block() {
    // The `gif` crate's own encoder guarantees sub-block framing; this
    // confirms our output round-trips through a standards-conformant
    // decoder at all (which would reject a malformed sub-block stream).
    let frames = vec![solid(32, 32, red(), 0), solid(32, 32, blue(), 50)];
    let opts = EncodeOptions::new(Format::Gif, 32, 32);
    let artifact = encode(frames, opts, None, None).unwrap();
    let decoded = decode_gif_frames(&artifact.bytes);
    assert_eq!(decoded.len(), 2);
}

#[test]
fn dirty_rect_never_exceeds_frame_bounds() {
    let frames = vec![
        solid(10, 6, red(), 0),
        solid(10, 6, blue(), 20),
        solid(10, 6, RGBA8::new(0, 255, 0, 255), 40),
    ];
    let opts = EncodeOptions::new(Format::Gif, 10, 6);
    let artifact = encode(frames, opts, None, None).unwrap();
    for frame in decode_gif_frames(&artifact.bytes) {
        assert!(frame.left as u32 + frame.width as u32 <= 10);
        assert!(frame.top as u32 + frame.height as u32 <= 6);
    }
}

#[test]
fn webp_chunk_payloads_are_padded_to_even_length() {
    let frames = vec![solid(7, 5, red(), 0), solid(7, 5, blue(), 25)];
    let opts = EncodeOptions::new(Format::WebP, 7, 5);
    let artifact = encode(frames, opts, None, None).unwrap();
    let bytes = &artifact.bytes;

    // Walk every chunk after the 12-byte RIFF/WEBP header and confirm each
    // payload is followed by a pad byte iff its length is odd.
    let mut i = 12usize;
    let mut chunk_count = 0;
    while i + 8 <= bytes.len() {
        let len = u32::from_le_bytes(bytes[i + 4..i + 8].try_into().unwrap()) as usize;
        let payload_start = i + 8;
        let payload_end = payload_start + len;
        assert!(payload_end <= bytes.len(), "chunk at {i} overruns the buffer");
        chunk_count += 1;
        i = payload_end + (len & 1);
    }
    assert_eq!(i, bytes.len(), "trailing bytes after the last chunk");
    assert!(chunk_count >= 3); // VP8X, ANIM, at least one ANMF
}

#[test]
fn duplicate_timestamps_are_rejected_before_any_bytes_are_written() {
    let frames = vec![solid(4, 4, red(), 0), solid(4, 4, blue(), 0)];
    let opts = EncodeOptions::new(Format::Gif, 4, 4);
    let err = encode(frames, opts, None, None).unwrap_err();
    assert!(matches!(err, EncodeError::DuplicateTimestamp(0)));
}

#[test]
fn dimensions_outside_the_valid_range_fail_fast() {
    let frames = vec![solid(4, 4, red(), 0)];
    let opts = EncodeOptions::new(Format::Gif, 0, 4);
    let err = encode(frames, opts, None, None).unwrap_err();
    assert!(matches!(err, EncodeError::InvalidDimensions(..)));
}

#[test]
fn global_and_per_frame_palette_strategies_both_produce_valid_gifs() {
    let make = || (0..5).map(|n| solid(12, 12, RGBA8::new((n * 50) as u8, 10, 200, 255), n as u64 * 30)).collect::<Vec<_>>();

    let mut global_opts = EncodeOptions::new(Format::Gif, 12, 12);
    global_opts.palette_strategy = PaletteStrategy::Global;
    let global = encode(make(), global_opts, None, None).unwrap();
    assert_eq!(&global.bytes[0..6], b"GIF89a");

    let mut per_frame_opts = EncodeOptions::new(Format::Gif, 12, 12);
    per_frame_opts.palette_strategy = PaletteStrategy::PerFrame;
    let per_frame = encode(make(), per_frame_opts, None, None).unwrap();
    assert_eq!(&per_frame.bytes[0..6], b"GIF89a");
}

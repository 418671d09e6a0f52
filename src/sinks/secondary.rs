//! # Secondary Display Worker
//!
//! The secondary panel has a fixed native geometry of 128x32 RGB-565. Every
//! input mode is adapted to that geometry: matching frames pass through,
//! half-height frames are centered, double-height frames are halved (block
//! averaging for true-color payloads, nearest for palette-indexed ones) and
//! centered. Frames that fit none of those shapes are dropped.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dmd_scale::{
    center_into, halve_indexed, halve_rgb24, halve_rgb565, indexed_to_rgb565, rgb24_to_rgb565,
};

use crate::engine::Shared;
use crate::frame::{FrameUpdate, Mode, SEG_BANK_WORDS};
use crate::palette::{update_palette, PALETTE_BYTES};
use crate::ring::Cursor;
use crate::sinks::hardware::SecondaryDisplay;

pub const SECONDARY_WIDTH: u16 = 128;
pub const SECONDARY_HEIGHT: u16 = 32;
const CANVAS_PIXELS: usize = SECONDARY_WIDTH as usize * SECONDARY_HEIGHT as usize;

/// Fit a palette-indexed frame onto the level canvas. Returns `false` for
/// geometries the panel does not adapt.
fn adapt_indexed(levels: &[u8], width: u16, height: u16, tmp: &mut [u8], canvas: &mut [u8]) -> bool {
    match (width, height) {
        (SECONDARY_WIDTH, SECONDARY_HEIGHT) => {
            canvas[..CANVAS_PIXELS].copy_from_slice(&levels[..CANVAS_PIXELS]);
            true
        }
        (SECONDARY_WIDTH, 16) => {
            center_into(levels, width, 16, canvas, SECONDARY_WIDTH, SECONDARY_HEIGHT, 0).is_ok()
        }
        (_, 64) if width % 2 == 0 && width / 2 <= SECONDARY_WIDTH => {
            match halve_indexed(levels, width, height, tmp) {
                Ok((w, h)) => {
                    center_into(tmp, w, h, canvas, SECONDARY_WIDTH, SECONDARY_HEIGHT, 0).is_ok()
                }
                Err(_) => false,
            }
        }
        _ => false,
    }
}

/// Fit an RGB-565 frame onto the word canvas.
fn adapt_words(words: &[u16], width: u16, height: u16, tmp: &mut [u16], canvas: &mut [u16]) -> bool {
    match (width, height) {
        (SECONDARY_WIDTH, SECONDARY_HEIGHT) => {
            canvas[..CANVAS_PIXELS].copy_from_slice(&words[..CANVAS_PIXELS]);
            true
        }
        (SECONDARY_WIDTH, 16) => {
            center_into(words, width, 16, canvas, SECONDARY_WIDTH, SECONDARY_HEIGHT, 0).is_ok()
        }
        (_, 64) if width % 2 == 0 && width / 2 <= SECONDARY_WIDTH => {
            match halve_rgb565(words, width, height, tmp) {
                Ok((w, h)) => {
                    center_into(tmp, w, h, canvas, SECONDARY_WIDTH, SECONDARY_HEIGHT, 0).is_ok()
                }
                Err(_) => false,
            }
        }
        _ => false,
    }
}

/// Fit an RGB888 frame onto the word canvas, averaging in 8-bit space before
/// the RGB-565 conversion.
fn adapt_rgb24(
    pixels: &[u8],
    width: u16,
    height: u16,
    tmp_rgb: &mut [u8],
    tmp_words: &mut [u16],
    canvas: &mut [u16],
) -> bool {
    let (src, w, h): (&[u8], u16, u16) = match (width, height) {
        (SECONDARY_WIDTH, SECONDARY_HEIGHT) | (SECONDARY_WIDTH, 16) => (pixels, width, height),
        (_, 64) if width % 2 == 0 && width / 2 <= SECONDARY_WIDTH => {
            match halve_rgb24(pixels, width, height, tmp_rgb) {
                Ok((w, h)) => (&tmp_rgb[..w as usize * h as usize * 3], w, h),
                Err(_) => return false,
            }
        }
        _ => return false,
    };
    let len = w as usize * h as usize;
    if rgb24_to_rgb565(src, &mut tmp_words[..len], len).is_err() {
        return false;
    }
    if (w, h) == (SECONDARY_WIDTH, SECONDARY_HEIGHT) {
        canvas[..CANVAS_PIXELS].copy_from_slice(&tmp_words[..CANVAS_PIXELS]);
        true
    } else {
        center_into(&tmp_words[..len], w, h, canvas, SECONDARY_WIDTH, SECONDARY_HEIGHT, 0).is_ok()
    }
}

pub(crate) fn secondary_worker(shared: Arc<Shared>, mut display: Box<dyn SecondaryDisplay>) {
    let mut cursor = Cursor::fanout_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut palette = [0u8; PALETTE_BYTES];
    let mut canvas = vec![0u16; CANVAS_PIXELS];
    let mut previous = vec![0u16; CANVAS_PIXELS];
    let mut pushed_once = false;

    let max_pixels = crate::frame::MAX_WIDTH * crate::frame::MAX_HEIGHT;
    let mut levels = vec![0u8; max_pixels];
    let mut level_canvas = vec![0u8; CANVAS_PIXELS];
    let mut tmp_levels = vec![0u8; max_pixels];
    let mut tmp_rgb = vec![0u8; max_pixels * 3];
    let mut tmp_words = vec![0u16; max_pixels];

    loop {
        if !shared.ring.wait_frame() {
            return;
        }

        loop {
            let write_index = shared.ring.write_index();
            if cursor.caught_up(write_index) {
                break;
            }
            cursor.advance(write_index);
            shared.ring.read_slot(cursor.position(), &mut scratch);

            let colorizer_active = shared.colorizer_active.load(Ordering::Acquire);
            let len = scratch.pixel_len();

            let placed = match scratch.mode {
                Mode::Rgb24 => adapt_rgb24(
                    &scratch.pixels[..len * 3],
                    scratch.width,
                    scratch.height,
                    &mut tmp_rgb,
                    &mut tmp_words,
                    &mut canvas,
                ),
                Mode::Rgb16
                | Mode::Colorized32
                | Mode::Colorized64
                | Mode::Colorized32With64
                | Mode::Colorized64With32 => adapt_words(
                    &scratch.seg_a[..len],
                    scratch.width,
                    scratch.height,
                    &mut tmp_words,
                    &mut canvas,
                ),
                Mode::ColorizedIndexed => {
                    let frame_palette = scratch.load_palette();
                    adapt_indexed(
                        &scratch.pixels[..len],
                        scratch.width,
                        scratch.height,
                        &mut tmp_levels,
                        &mut level_canvas,
                    ) && indexed_to_rgb565(&level_canvas, &frame_palette, &mut canvas, CANVAS_PIXELS)
                        .is_ok()
                }
                Mode::Data if !colorizer_active => {
                    update_palette(
                        &mut palette,
                        scratch.depth,
                        scratch.red,
                        scratch.green,
                        scratch.blue,
                        shared.config.brightness_curve,
                    );
                    adapt_indexed(
                        &scratch.pixels[..len],
                        scratch.width,
                        scratch.height,
                        &mut tmp_levels,
                        &mut level_canvas,
                    ) && indexed_to_rgb565(&level_canvas, &palette, &mut canvas, CANVAS_PIXELS)
                        .is_ok()
                }
                Mode::AlphaNumeric if !colorizer_active => {
                    update_palette(
                        &mut palette,
                        scratch.depth,
                        scratch.red,
                        scratch.green,
                        scratch.blue,
                        shared.config.brightness_curve,
                    );
                    let banks = scratch.has_seg_b.then_some(&scratch.seg_b[..]);
                    shared.segment_renderer.render(
                        scratch.layout,
                        &scratch.seg_a[..SEG_BANK_WORDS],
                        banks,
                        &mut levels,
                    );
                    indexed_to_rgb565(&levels[..CANVAS_PIXELS], &palette, &mut canvas, CANVAS_PIXELS)
                        .is_ok()
                }
                _ => false,
            };

            if placed && (!pushed_once || canvas != previous) {
                display.update(&canvas);
                previous.copy_from_slice(&canvas);
                pushed_once = true;
            }

            if shared.ring.stopped() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_geometry_passes_through() {
        let words: Vec<u16> = (0..CANVAS_PIXELS as u32).map(|v| v as u16).collect();
        let mut tmp = vec![0u16; CANVAS_PIXELS];
        let mut canvas = vec![0u16; CANVAS_PIXELS];
        assert!(adapt_words(&words, 128, 32, &mut tmp, &mut canvas));
        assert_eq!(canvas, words);
    }

    #[test]
    fn half_height_frames_are_centered() {
        let words = vec![0xFFFFu16; 128 * 16];
        let mut tmp = vec![0u16; CANVAS_PIXELS];
        let mut canvas = vec![0u16; CANVAS_PIXELS];
        assert!(adapt_words(&words, 128, 16, &mut tmp, &mut canvas));
        assert_eq!(canvas[0], 0);
        assert_eq!(canvas[8 * 128], 0xFFFF);
        assert_eq!(canvas[23 * 128 + 127], 0xFFFF);
        assert_eq!(canvas[24 * 128], 0);
    }

    #[test]
    fn double_height_rgb24_is_block_averaged() {
        // 192x64 gradient columns collapse into 96x32 averages on the canvas.
        let (w, h) = (192u16, 64u16);
        let mut pixels = vec![0u8; w as usize * h as usize * 3];
        for y in 0..h as usize {
            for x in 0..w as usize {
                let v = (x % 2 * 60 + y % 2 * 20) as u8;
                let i = (y * w as usize + x) * 3;
                pixels[i..i + 3].copy_from_slice(&[v; 3]);
            }
        }
        let mut tmp_rgb = vec![0u8; pixels.len()];
        let mut tmp_words = vec![0u16; w as usize * h as usize];
        let mut canvas = vec![0u16; CANVAS_PIXELS];
        assert!(adapt_rgb24(&pixels, w, h, &mut tmp_rgb, &mut tmp_words, &mut canvas));
        // Every 2x2 block holds 0, 60, 20, 80 -> mean 40.
        let expected = dmd_scale::pack_rgb565(40, 40, 40);
        // 96 wide centered on 128: 16 columns of border each side.
        assert_eq!(canvas[0], 0);
        assert_eq!(canvas[16], expected);
        assert_eq!(canvas[111], expected);
        assert_eq!(canvas[112], 0);
    }

    #[test]
    fn unsupported_geometry_is_dropped() {
        let words = vec![0u16; 100 * 25];
        let mut tmp = vec![0u16; CANVAS_PIXELS];
        let mut canvas = vec![0u16; CANVAS_PIXELS];
        assert!(!adapt_words(&words, 100, 25, &mut tmp, &mut canvas));
    }
}

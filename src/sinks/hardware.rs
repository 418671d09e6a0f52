//! # Primary Hardware Display Worker
//!
//! Drives the main pixel display (serial or Wi-Fi attached) through the
//! [`HardwareDisplay`] trait. The worker consumes the ring with the
//! latest-wins cursor, tracks geometry and palette state so the device is
//! only reprogrammed on change, and dispatches each record by mode.
//!
//! While a colorizer session is active, raw `Data` frames are skipped here;
//! the colorization worker republishes them as colorized records and those
//! are rendered instead.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::engine::Shared;
use crate::error::DmdResult;
use crate::frame::{FrameUpdate, Mode, SEG_BANK_WORDS};
use crate::palette::{adjust_rgb24_depth, update_palette, PALETTE_BYTES};
use crate::ring::Cursor;

/// Driver interface of the primary hardware display.
pub trait HardwareDisplay: Send {
    /// Native panel width; decides which paired colorized variant applies.
    fn native_width(&self) -> u16;
    fn set_frame_size(&mut self, width: u16, height: u16);
    fn set_palette(&mut self, palette: &[u8], colors: u16);
    /// Toggle the device's own upscaling of undersized frames.
    fn set_pre_upscaling(&mut self, enabled: bool);
    fn render_rgb24(&mut self, pixels: &[u8]);
    fn render_rgb565(&mut self, pixels: &[u16]);
    fn render_gray2(&mut self, pixels: &[u8]);
    fn render_gray4(&mut self, pixels: &[u8]);
    fn render_colored_gray6(
        &mut self,
        pixels: &[u8],
        palette: &[u8; PALETTE_BYTES],
        rotations: Option<&[u8; 24]>,
    );
}

/// Driver interface of the secondary fixed-geometry display.
pub trait SecondaryDisplay: Send {
    /// `rgb565` holds one word per pixel of the 128x32 panel.
    fn update(&mut self, rgb565: &[u16]);
}

/// Connection parameters handed to a [`DisplayProvider`].
#[derive(Debug, Clone, Default)]
pub struct HardwareOptions {
    pub device: Option<String>,
    pub debug: bool,
    pub rgb_order: Option<u8>,
    pub brightness: Option<u8>,
    pub save_settings: bool,
    /// Reach the panel over Wi-Fi at `(addr, port)` instead of serial
    pub wifi: Option<(String, u16)>,
}

/// Opens concrete display drivers. Platforms without a given driver return
/// an error from the respective method and the engine runs without that
/// sink; discovery failures never propagate past the finder thread.
pub trait DisplayProvider: Send + 'static {
    fn open_hardware(&self, options: &HardwareOptions) -> DmdResult<Box<dyn HardwareDisplay>>;
    fn open_secondary(&self, device: Option<&str>) -> DmdResult<Box<dyn SecondaryDisplay>>;
}

pub(crate) fn hardware_worker(shared: Arc<Shared>, mut display: Box<dyn HardwareDisplay>) {
    let mut cursor = Cursor::fanout_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut width = 0u16;
    let mut height = 0u16;
    let mut palette = [0u8; PALETTE_BYTES];
    let mut seg_a = [0u16; SEG_BANK_WORDS];
    let mut seg_b = [0u16; SEG_BANK_WORDS];
    let mut adjusted = vec![0u8; crate::frame::PIXEL_CAPACITY];
    let mut rendered = vec![0u8; crate::frame::MAX_WIDTH * crate::frame::MAX_HEIGHT];
    let native_width = display.native_width();

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
            let skip = (colorizer_active && !scratch.mode.is_colorized())
                // Paired colorized variants carry a geometry hint: each
                // panel class renders exactly one of the two siblings.
                || (scratch.mode == Mode::Colorized64With32 && native_width == 256)
                || (scratch.mode == Mode::Colorized32With64 && native_width < 256);

            if !skip {
                if scratch.width != width || scratch.height != height {
                    width = scratch.width;
                    height = scratch.height;
                    display.set_frame_size(width, height);
                }
                let len = scratch.pixel_len();

                match scratch.mode {
                    Mode::Rgb24 => {
                        if scratch.depth < 24 {
                            update_palette(
                                &mut palette,
                                scratch.depth,
                                scratch.red,
                                scratch.green,
                                scratch.blue,
                                shared.config.brightness_curve,
                            );
                            adjust_rgb24_depth(
                                &scratch.pixels[..len * 3],
                                &mut adjusted[..len * 3],
                                len,
                                &palette,
                                scratch.depth,
                            );
                            display.set_pre_upscaling(false);
                            display.render_rgb24(&adjusted[..len * 3]);
                            display.set_pre_upscaling(true);
                        } else {
                            display.set_pre_upscaling(false);
                            display.render_rgb24(&scratch.pixels[..len * 3]);
                            display.set_pre_upscaling(true);
                        }
                    }
                    Mode::Rgb16 => {
                        display.set_pre_upscaling(false);
                        display.render_rgb565(&scratch.seg_a[..len]);
                        display.set_pre_upscaling(true);
                    }
                    Mode::Colorized32
                    | Mode::Colorized64
                    | Mode::Colorized32With64
                    | Mode::Colorized64With32 => {
                        display.render_rgb565(&scratch.seg_a[..len]);
                    }
                    Mode::ColorizedIndexed => {
                        let frame_palette = scratch.load_palette();
                        display.render_colored_gray6(
                            &scratch.pixels[..len],
                            &frame_palette,
                            None,
                        );
                    }
                    Mode::Data => {
                        update_palette(
                            &mut palette,
                            scratch.depth,
                            scratch.red,
                            scratch.green,
                            scratch.blue,
                            shared.config.brightness_curve,
                        );
                        let colors: u16 = if scratch.depth == 2 { 4 } else { 16 };
                        display.set_palette(&palette[..colors as usize * 3], colors);
                        match scratch.depth {
                            2 => display.render_gray2(&scratch.pixels[..len]),
                            4 => display.render_gray4(&scratch.pixels[..len]),
                            other => {
                                log::error!("unrenderable data depth {}", other);
                            }
                        }
                    }
                    Mode::AlphaNumeric => {
                        let mut changed = update_palette(
                            &mut palette,
                            scratch.depth,
                            scratch.red,
                            scratch.green,
                            scratch.blue,
                            shared.config.brightness_curve,
                        );
                        if scratch.seg_a[..SEG_BANK_WORDS] != seg_a[..] {
                            seg_a.copy_from_slice(&scratch.seg_a[..SEG_BANK_WORDS]);
                            changed = true;
                        }
                        if scratch.has_seg_b && scratch.seg_b[..] != seg_b[..] {
                            seg_b.copy_from_slice(&scratch.seg_b);
                            changed = true;
                        }
                        if changed {
                            let banks = scratch.has_seg_b.then_some(&seg_b[..]);
                            shared.segment_renderer.render(
                                scratch.layout,
                                &seg_a,
                                banks,
                                &mut rendered,
                            );
                            display.set_palette(&palette[..12], 4);
                            display.render_gray2(&rendered[..len]);
                        }
                    }
                }
            }

            if shared.ring.stopped() {
                return;
            }
        }
    }
}

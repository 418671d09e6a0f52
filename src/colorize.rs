//! # Colorization Worker
//!
//! Monochrome frames are colorized by an external library keyed on the ROM
//! name. The worker owns the session lifecycle: it reloads on ROM-name
//! changes, feeds every `Data` frame through the session, republishes the
//! colorized output into the ring as new records, and schedules palette
//! rotations on a wall-clock deadline between input frames.
//!
//! The worker owns no sink. Republished records carry colorized mode tags,
//! which every sink treats as inputs only, so colorization can never feed
//! back into itself.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::Shared;
use crate::error::DmdResult;
use crate::frame::{FrameUpdate, Mode};
use crate::palette::PALETTE_BYTES;
use crate::ring::{Cursor, Wakeup};
use crate::trigger::TRIGGER_NONE;

/// Knobs forwarded to the colorizer when a session is loaded.
#[derive(Debug, Clone, Copy)]
pub struct ColorizerOptions {
    pub frames_timeout_ms: u32,
    pub frames_to_skip: u32,
    /// Request 32-row output from the session
    pub want_32: bool,
    /// Request 64-row output from the session
    pub want_64: bool,
}

/// Payload produced by a colorizer session.
#[derive(Debug, Clone)]
pub enum ColorizedOutput {
    /// First-generation output: 6-bit indexed pixels plus a 64-entry palette
    /// at the input geometry.
    Indexed { width: u16, height: u16, pixels: Vec<u8>, palette: [u8; PALETTE_BYTES] },
    /// Second-generation output: RGB-565 frames at 32 and/or 64 rows.
    /// A width of zero marks the respective frame as absent.
    Rgb565 { width32: u16, frame32: Vec<u16>, width64: u16, frame64: Vec<u16> },
}

/// Result of colorizing one input frame.
#[derive(Debug, Clone)]
pub struct Colorization {
    pub output: ColorizedOutput,
    /// Trigger id reported with this frame, [`TRIGGER_NONE`] when absent
    pub trigger_id: u32,
    /// Milliseconds until the next palette rotation; valid when in `1..2048`
    pub rotation_delay_ms: u16,
}

/// Result of advancing the palette rotation between input frames.
#[derive(Debug, Clone)]
pub struct RotationUpdate {
    pub output: ColorizedOutput,
    pub render32: bool,
    pub render64: bool,
    pub rotation_delay_ms: u16,
}

/// One colorization session, valid for a single ROM.
pub trait ColorizerSession: Send {
    /// Colorize a monochrome frame. `None` means the colorizer has no frame
    /// for this input and the engine should pass it over.
    fn colorize(&mut self, pixels: &[u8], width: u16, height: u16) -> Option<Colorization>;

    /// Advance the rotating palette entries. `None` ends rotation.
    fn rotate(&mut self) -> Option<RotationUpdate>;
}

/// Opens colorization sessions from an asset directory. At most one session
/// is active at a time; the worker disposes the previous session before
/// loading the next.
pub trait ColorizerLoader: Send + Sync {
    fn load(
        &self,
        alt_color_path: &Path,
        rom_name: &str,
        options: &ColorizerOptions,
    ) -> DmdResult<Box<dyn ColorizerSession>>;
}

fn rotation_deadline(delay_ms: u16) -> Option<Instant> {
    if (1..2048).contains(&delay_ms) {
        Some(Instant::now() + Duration::from_millis(delay_ms as u64))
    } else {
        None
    }
}

/// Re-enter the ring with the colorized payload. For paired 32+64 output the
/// `render32`/`render64` flags gate which sibling records are emitted.
fn republish(shared: &Shared, output: &ColorizedOutput, render32: bool, render64: bool) {
    match output {
        ColorizedOutput::Indexed { width, height, pixels, palette } => {
            let mut frame = Box::new(FrameUpdate::zeroed());
            frame.mode = Mode::ColorizedIndexed;
            frame.depth = 6;
            frame.width = *width;
            frame.height = *height;
            let len = pixels.len().min(frame.pixels.len());
            frame.pixels[..len].copy_from_slice(&pixels[..len]);
            frame.has_pixels = true;
            frame.store_palette(palette);
            shared.push_update(&frame, false);
        }
        ColorizedOutput::Rgb565 { width32, frame32, width64, frame64 } => {
            let both = *width32 > 0 && *width64 > 0;
            if *width32 > 0 && (!both || render32) {
                let mode = if both { Mode::Colorized32With64 } else { Mode::Colorized32 };
                shared.push_update(&rgb565_frame(mode, *width32, 32, frame32), false);
            }
            if *width64 > 0 && (!both || render64) {
                let mode = if both { Mode::Colorized64With32 } else { Mode::Colorized64 };
                shared.push_update(&rgb565_frame(mode, *width64, 64, frame64), false);
            }
        }
    }
}

fn rgb565_frame(mode: Mode, width: u16, height: u16, words: &[u16]) -> Box<FrameUpdate> {
    let mut frame = Box::new(FrameUpdate::zeroed());
    frame.mode = mode;
    frame.depth = 24;
    frame.width = width;
    frame.height = height;
    let len = words.len().min(frame.seg_a.len());
    frame.seg_a[..len].copy_from_slice(&words[..len]);
    frame.has_seg_a = true;
    frame
}

pub(crate) fn colorize_worker(shared: Arc<Shared>, loader: Box<dyn ColorizerLoader>) {
    // Advance one slot at a time without snap-forward: the colorizer keys
    // animations on the exact input sequence, so coalescing under lag would
    // derail it.
    let mut cursor = Cursor::lossless_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut session: Option<Box<dyn ColorizerSession>> = None;
    let mut current_rom: Option<String> = None;
    let mut last_input: Option<Box<FrameUpdate>> = None;
    let mut last_trigger = TRIGGER_NONE;
    let mut deadline: Option<Instant> = None;

    loop {
        let wake = shared.ring.wait_frame_until(deadline);
        if wake == Wakeup::Stop {
            shared.colorizer_active.store(false, Ordering::Release);
            return;
        }

        let (rom, alt_path) = {
            let ctx = shared.context.read().expect("context lock poisoned");
            (ctx.rom_name.clone(), ctx.alt_color_path.clone())
        };
        if current_rom.as_deref() != Some(rom.as_str()) {
            current_rom = Some(rom.clone());
            session = None;
            last_input = None;
            last_trigger = TRIGGER_NONE;
            deadline = None;
            shared.colorizer_active.store(false, Ordering::Release);

            if !rom.is_empty() {
                let options = ColorizerOptions {
                    frames_timeout_ms: shared.config.frames_timeout_ms,
                    frames_to_skip: shared.config.frames_to_skip,
                    want_32: true,
                    want_64: true,
                };
                match loader.load(Path::new(&alt_path), &rom, &options) {
                    Ok(s) => {
                        log::info!("colorization active for '{}'", rom);
                        session = Some(s);
                        shared.colorizer_active.store(true, Ordering::Release);
                    }
                    Err(e) => log::info!("{}", e),
                }
            }
        }

        match wake {
            Wakeup::Frame => loop {
                let write_index = shared.ring.write_index();
                if cursor.caught_up(write_index) {
                    break;
                }
                cursor.advance(write_index);
                shared.ring.read_slot(cursor.position(), &mut scratch);

                if scratch.mode == Mode::Data {
                    if let Some(s) = session.as_mut() {
                        let len = scratch.pixel_len();
                        if let Some(c) = s.colorize(&scratch.pixels[..len], scratch.width, scratch.height) {
                            if let Some(slot) = last_input.as_deref_mut() {
                                *slot = *scratch;
                            } else {
                                last_input = Some(scratch.clone());
                            }
                            republish(&shared, &c.output, true, true);
                            deadline = rotation_deadline(c.rotation_delay_ms);
                            if c.trigger_id != TRIGGER_NONE && c.trigger_id != last_trigger {
                                last_trigger = c.trigger_id;
                                shared.dispatcher.handle_trigger(c.trigger_id);
                            }
                        }
                    }
                }

                if shared.ring.stopped() {
                    shared.colorizer_active.store(false, Ordering::Release);
                    return;
                }
            },
            Wakeup::Deadline => {
                deadline = None;
                if last_input.is_some() {
                    if let Some(s) = session.as_mut() {
                        if let Some(r) = s.rotate() {
                            republish(&shared, &r.output, r.render32, r.render64);
                            deadline = rotation_deadline(r.rotation_delay_ms);
                        }
                    }
                }
            }
            Wakeup::Stop => unreachable!("handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_deadline_honors_valid_range() {
        assert!(rotation_deadline(0).is_none());
        assert!(rotation_deadline(1).is_some());
        assert!(rotation_deadline(2047).is_some());
        assert!(rotation_deadline(2048).is_none());
    }
}

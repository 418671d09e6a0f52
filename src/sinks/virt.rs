//! # In-Process Buffer Sinks
//!
//! Virtual sinks let a host application embed the display: a level sink
//! exposes raw monochrome levels, a 24-bit sink exposes fully composed
//! RGB888 frames, and a console sink renders ASCII art. Handles are created
//! and destroyed through the engine; each sink family has one worker thread,
//! started lazily on first registration, that consumes the ring and fans the
//! frame out to every registered handle with a matching buffer length.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dmd_scale::{indexed_to_rgb24, rgb565_to_rgb24};

use crate::engine::Shared;
use crate::frame::{FrameUpdate, Mode, MAX_HEIGHT, MAX_WIDTH, PIXEL_CAPACITY, SEG_BANK_WORDS};
use crate::palette::{update_palette, PALETTE_BYTES};
use crate::ring::Cursor;

/// Shade ramp used by the console sink, darkest first.
const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

/// Exposes raw monochrome levels (one byte per pixel) to the host.
pub struct LevelSink {
    pub(crate) id: u64,
    width: u16,
    height: u16,
    state: Mutex<(Vec<u8>, u8)>,
    generation: AtomicU64,
}

impl LevelSink {
    pub(crate) fn new(id: u64, width: u16, height: u16) -> Self {
        Self {
            id,
            width,
            height,
            state: Mutex::new((vec![0; width as usize * height as usize], 2)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Buffer length this sink accepts: one level byte per pixel.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every accepted frame; lets pollers detect fresh data.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Latest levels and their depth.
    pub fn snapshot(&self) -> (Vec<u8>, u8) {
        let state = self.state.lock().expect("level sink lock poisoned");
        state.clone()
    }

    pub(crate) fn push(&self, levels: &[u8], depth: u8) {
        let mut state = self.state.lock().expect("level sink lock poisoned");
        state.0.copy_from_slice(levels);
        state.1 = depth;
        drop(state);
        self.generation.fetch_add(1, Ordering::Release);
    }
}

/// Exposes fully composed RGB888 frames to the host.
pub struct Rgb24Sink {
    pub(crate) id: u64,
    width: u16,
    height: u16,
    state: Mutex<Vec<u8>>,
    generation: AtomicU64,
}

impl Rgb24Sink {
    pub(crate) fn new(id: u64, width: u16, height: u16) -> Self {
        Self {
            id,
            width,
            height,
            state: Mutex::new(vec![0; width as usize * height as usize * 3]),
            generation: AtomicU64::new(0),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Buffer length this sink accepts: three bytes per pixel.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.state.lock().expect("rgb24 sink lock poisoned").clone()
    }

    pub(crate) fn push(&self, rgb24: &[u8]) {
        let mut state = self.state.lock().expect("rgb24 sink lock poisoned");
        state.copy_from_slice(rgb24);
        drop(state);
        self.generation.fetch_add(1, Ordering::Release);
    }
}

/// Renders monochrome frames as ASCII art, one character per pixel.
pub struct ConsoleSink {
    pub(crate) id: u64,
    width: u16,
    height: u16,
    state: Mutex<String>,
    generation: AtomicU64,
}

impl ConsoleSink {
    pub(crate) fn new(id: u64, width: u16, height: u16) -> Self {
        Self { id, width, height, state: Mutex::new(String::new()), generation: AtomicU64::new(0) }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Pixel count this sink accepts.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Latest ASCII rendering, one line per pixel row.
    pub fn text(&self) -> String {
        self.state.lock().expect("console sink lock poisoned").clone()
    }

    pub(crate) fn push(&self, levels: &[u8], depth: u8) {
        let colors = (1u16 << depth) as usize;
        let mut text = String::with_capacity(self.len() + self.height as usize);
        for row in levels.chunks_exact(self.width as usize) {
            for &level in row {
                let shade = level as usize * (ASCII_RAMP.len() - 1) / (colors - 1).max(1);
                text.push(ASCII_RAMP[shade.min(ASCII_RAMP.len() - 1)] as char);
            }
            text.push('\n');
        }
        *self.state.lock().expect("console sink lock poisoned") = text;
        self.generation.fetch_add(1, Ordering::Release);
    }
}

pub(crate) fn level_worker(shared: Arc<Shared>) {
    let mut cursor = Cursor::fanout_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut previous = vec![0u8; MAX_WIDTH * MAX_HEIGHT];
    let mut pushed_once = false;

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
            if scratch.mode == Mode::Data && !colorizer_active {
                let len = scratch.pixel_len();
                let changed = !pushed_once || previous[..len] != scratch.pixels[..len];
                if changed {
                    previous[..len].copy_from_slice(&scratch.pixels[..len]);
                    pushed_once = true;
                    let sinks = shared.level_sinks.read().expect("level registry poisoned");
                    for sink in sinks.iter() {
                        if sink.len() == len {
                            sink.push(&scratch.pixels[..len], scratch.depth);
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

pub(crate) fn console_worker(shared: Arc<Shared>) {
    let mut cursor = Cursor::fanout_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut previous = vec![0u8; MAX_WIDTH * MAX_HEIGHT];
    let mut pushed_once = false;

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
            if scratch.mode == Mode::Data && !colorizer_active {
                let len = scratch.pixel_len();
                let changed = !pushed_once || previous[..len] != scratch.pixels[..len];
                if changed {
                    previous[..len].copy_from_slice(&scratch.pixels[..len]);
                    pushed_once = true;
                    let sinks = shared.console_sinks.read().expect("console registry poisoned");
                    for sink in sinks.iter() {
                        if sink.len() == len {
                            sink.push(&scratch.pixels[..len], scratch.depth);
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

pub(crate) fn rgb24_worker(shared: Arc<Shared>) {
    let mut cursor = Cursor::fanout_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut palette = [0u8; PALETTE_BYTES];
    let mut levels = vec![0u8; MAX_WIDTH * MAX_HEIGHT];
    let mut composed = vec![0u8; PIXEL_CAPACITY];
    let mut previous = vec![0u8; PIXEL_CAPACITY];
    let mut pushed_once = false;

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
            let composed_len = len * 3;

            let composed_ok = match scratch.mode {
                Mode::Rgb24 => {
                    composed[..composed_len].copy_from_slice(&scratch.pixels[..composed_len]);
                    true
                }
                Mode::ColorizedIndexed => {
                    let frame_palette = scratch.load_palette();
                    indexed_to_rgb24(
                        &scratch.pixels[..len],
                        &frame_palette,
                        &mut composed[..composed_len],
                        len,
                    )
                    .is_ok()
                }
                Mode::Colorized32
                | Mode::Colorized64
                | Mode::Colorized32With64
                | Mode::Colorized64With32 => {
                    rgb565_to_rgb24(&scratch.seg_a[..len], &mut composed[..composed_len], len)
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
                    indexed_to_rgb24(
                        &scratch.pixels[..len],
                        &palette,
                        &mut composed[..composed_len],
                        len,
                    )
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
                    indexed_to_rgb24(&levels[..len], &palette, &mut composed[..composed_len], len)
                        .is_ok()
                }
                _ => false,
            };

            if composed_ok {
                let changed = !pushed_once || previous[..composed_len] != composed[..composed_len];
                if changed {
                    previous[..composed_len].copy_from_slice(&composed[..composed_len]);
                    pushed_once = true;
                    let sinks = shared.rgb24_sinks.read().expect("rgb24 registry poisoned");
                    for sink in sinks.iter() {
                        if sink.len() == composed_len {
                            sink.push(&composed[..composed_len]);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_sink_snapshot_and_generation() {
        let sink = LevelSink::new(1, 4, 2);
        assert_eq!(sink.generation(), 0);
        sink.push(&[0, 1, 2, 3, 3, 2, 1, 0], 2);
        assert_eq!(sink.generation(), 1);
        let (levels, depth) = sink.snapshot();
        assert_eq!(levels, vec![0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(depth, 2);
    }

    #[test]
    fn console_sink_renders_shades() {
        let sink = ConsoleSink::new(1, 4, 1);
        sink.push(&[0, 1, 2, 3], 2);
        let text = sink.text();
        let chars: Vec<char> = text.trim_end().chars().collect();
        assert_eq!(chars.len(), 4);
        assert_eq!(chars[0], ' ');
        assert_eq!(chars[3], '@');
        // Shades are strictly brighter left to right.
        let pos = |c: char| ASCII_RAMP.iter().position(|&r| r as char == c).unwrap();
        assert!(pos(chars[0]) < pos(chars[1]));
        assert!(pos(chars[1]) < pos(chars[2]));
        assert!(pos(chars[2]) < pos(chars[3]));
    }
}

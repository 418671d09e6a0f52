//! # Dump Sinks
//!
//! Two archival consumers that observe every slot, bypassing the latest-wins
//! snap-forward: a text dump writing monochrome frames as hex grids with
//! millisecond offsets, and a raw dump writing complete frame records in
//! their wire encoding. Both rotate their output file on ROM-name changes
//! (`<rom>.txt` / `<rom>.raw`, opened in append mode); a failed write stops
//! dumping until the next rotation.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::Shared;
use crate::error::DmdError;
use crate::frame::{FrameUpdate, Mode};
use crate::ring::Cursor;

/// A depth-2 frame shown for less time than this is a candidate fade
/// intermediate.
const TRANSITIONAL_MS: u32 = 25;

struct DumpFile {
    extension: &'static str,
    directory: PathBuf,
    rom: Option<String>,
    file: Option<File>,
    failed: bool,
}

impl DumpFile {
    fn new(directory: &str, extension: &'static str) -> Self {
        Self {
            extension,
            directory: PathBuf::from(directory),
            rom: None,
            file: None,
            failed: false,
        }
    }

    fn rom_differs(&self, rom: &str) -> bool {
        self.rom.as_deref() != Some(rom)
    }

    /// Rotate to `<directory>/<rom>.<extension>`.
    fn rotate(&mut self, rom: &str) {
        self.rom = Some(rom.to_string());
        self.file = None;
        self.failed = false;
        if rom.is_empty() {
            return;
        }
        let path = self.directory.join(format!("{}.{}", rom, self.extension));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => self.file = Some(file),
            Err(e) => {
                log::error!("{}", DmdError::dump_io(path, e));
                self.failed = true;
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        if self.failed {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(bytes) {
                let path = self
                    .directory
                    .join(format!("{}.{}", self.rom.as_deref().unwrap_or(""), self.extension));
                log::error!("{}", DmdError::dump_io(path, e));
                self.file = None;
                self.failed = true;
            }
        }
    }
}

struct TextEntry {
    ms: u32,
    depth: u8,
    width: u16,
    height: u16,
    levels: Vec<u8>,
}

/// Whether the middle frame of a window reads as a fade between its
/// neighbors: wherever the outer frames agree on the on/off boundary (level
/// 2 and above is "on"), the middle frame must agree too; it may only
/// deviate where the outer frames themselves disagree.
fn is_fade_intermediate(prev: &TextEntry, mid: &TextEntry, next: &TextEntry) -> bool {
    if prev.levels.len() != mid.levels.len() || mid.levels.len() != next.levels.len() {
        return false;
    }
    for i in 0..mid.levels.len() {
        let on_prev = prev.levels[i] >= 2;
        let on_next = next.levels[i] >= 2;
        if on_prev == on_next && (mid.levels[i] >= 2) != on_prev {
            return false;
        }
    }
    true
}

fn format_entry(entry: &TextEntry) -> String {
    let mut out = String::with_capacity(entry.levels.len() + entry.height as usize + 16);
    out.push_str(&format!("0x{:08x}\n", entry.ms));
    for row in entry.levels.chunks_exact(entry.width as usize) {
        for &level in row {
            out.push_str(&format!("{:x}", level));
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

pub(crate) fn text_dump_worker(shared: Arc<Shared>) {
    let mut cursor = Cursor::lossless_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut output = DumpFile::new(&shared.config.dump_path, "txt");
    let mut window: VecDeque<TextEntry> = VecDeque::with_capacity(3);

    loop {
        if !shared.ring.wait_frame() {
            for entry in window.drain(..) {
                output.write(format_entry(&entry).as_bytes());
            }
            return;
        }

        loop {
            let write_index = shared.ring.write_index();
            if cursor.caught_up(write_index) {
                break;
            }
            cursor.advance(write_index);
            shared.ring.read_slot(cursor.position(), &mut scratch);

            let (rom, ms) = {
                let ctx = shared.context.read().expect("context lock poisoned");
                (ctx.rom_name.clone(), ctx.rom_started.elapsed().as_millis() as u32)
            };
            if output.rom_differs(&rom) {
                // Entries still in the window belong to the previous ROM's
                // file; flush them before switching.
                for entry in window.drain(..) {
                    output.write(format_entry(&entry).as_bytes());
                }
                output.rotate(&rom);
            }

            if scratch.mode == Mode::Data && !rom.is_empty() {
                let len = scratch.pixel_len();
                window.push_back(TextEntry {
                    ms,
                    depth: scratch.depth,
                    width: scratch.width,
                    height: scratch.height,
                    levels: scratch.pixels[..len].to_vec(),
                });

                if window.len() == 3 {
                    let suppress = window[1].depth == 2
                        && window[2].ms.saturating_sub(window[1].ms) < TRANSITIONAL_MS
                        && is_fade_intermediate(&window[0], &window[1], &window[2]);
                    if suppress {
                        // The dropped frame's display time folds into the
                        // preceding entry.
                        window.remove(1);
                    } else if let Some(oldest) = window.pop_front() {
                        output.write(format_entry(&oldest).as_bytes());
                    }
                }
            }

            if shared.ring.stopped() {
                for entry in window.drain(..) {
                    output.write(format_entry(&entry).as_bytes());
                }
                return;
            }
        }
    }
}

pub(crate) fn raw_dump_worker(shared: Arc<Shared>) {
    let mut cursor = Cursor::lossless_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut output = DumpFile::new(&shared.config.dump_path, "raw");
    let mut record = Vec::with_capacity(8 + dmd_net::FRAME_RECORD_BYTES);

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

            let (rom, ms) = {
                let ctx = shared.context.read().expect("context lock poisoned");
                (ctx.rom_name.clone(), ctx.rom_started.elapsed().as_millis() as u32)
            };
            if output.rom_differs(&rom) {
                output.rotate(&rom);
            }

            if !rom.is_empty() {
                record.clear();
                record.extend_from_slice(&ms.to_le_bytes());
                record.extend_from_slice(&(dmd_net::FRAME_RECORD_BYTES as u32).to_le_bytes());
                dmd_net::encode_frame(&scratch.wire_view(), &mut record);
                output.write(&record);
            }

            if shared.ring.stopped() {
                return;
            }
        }
    }
}

/// Shared directory helper so hosts can locate dump files.
pub fn dump_file_path(directory: &str, rom: &str, extension: &str) -> PathBuf {
    Path::new(directory).join(format!("{}.{}", rom, extension))
}

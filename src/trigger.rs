//! # Trigger Dispatch and Pattern Matching
//!
//! Triggers are small integer events fired toward the host: the colorizer
//! reports them alongside colorized frames, and the pattern matcher derives
//! them by comparing monochrome frames against a per-ROM video library. Both
//! paths funnel through [`TriggerDispatcher`], which invokes the registered
//! callback once per unique id.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use crate::config::TriggerCallback;
use crate::engine::Shared;
use crate::error::DmdResult;
use crate::frame::{FrameUpdate, Mode};
use crate::ring::Cursor;

/// Sentinel id meaning "no trigger".
pub const TRIGGER_NONE: u32 = u32::MAX;

/// Latch that fires the host callback only when the trigger id changes.
///
/// The colorizer and the pattern matcher do not coordinate; each caller
/// stream is de-duplicated by id change only, so a different caller may
/// legitimately refire the same id.
pub struct TriggerDispatcher {
    last: Mutex<Option<u32>>,
    callback: RwLock<Option<TriggerCallback>>,
}

impl TriggerDispatcher {
    pub fn new() -> Self {
        Self { last: Mutex::new(None), callback: RwLock::new(None) }
    }

    pub fn set_callback(&self, callback: Option<TriggerCallback>) {
        *self.callback.write().expect("trigger callback lock poisoned") = callback;
    }

    /// Fire the callback if `id` differs from the previously handled id.
    pub fn handle_trigger(&self, id: u32) {
        if id == TRIGGER_NONE {
            return;
        }
        let mut last = self.last.lock().expect("trigger latch poisoned");
        if *last == Some(id) {
            return;
        }
        *last = Some(id);
        drop(last);

        log::debug!("trigger {}", id);
        if let Some(cb) = self.callback.read().expect("trigger callback lock poisoned").as_ref() {
            cb(id);
        }
    }
}

impl Default for TriggerDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches monochrome frames against per-ROM capture assets and yields
/// trigger ids. The production matcher is an external collaborator.
pub trait PatternMatcher: Send {
    /// Load the assets for a ROM. Called on every ROM-name change; an error
    /// disables matching until the next change.
    fn set_context(&mut self, video_path: &Path, rom: &str, exact_match: bool) -> DmdResult<()>;

    /// Inspect one frame and return a trigger id when it matches.
    fn match_frame(&mut self, pixels: &[u8], depth: u8, width: u16, height: u16) -> Option<u32>;
}

pub(crate) fn pattern_worker(shared: Arc<Shared>, mut matcher: Box<dyn PatternMatcher>) {
    let mut cursor = Cursor::fanout_at(shared.ring.write_index());
    let mut scratch = Box::new(FrameUpdate::zeroed());
    let mut current_rom: Option<String> = None;
    let mut loaded = false;

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

            if scratch.mode == Mode::Data {
                let (rom, video_path) = {
                    let ctx = shared.context.read().expect("context lock poisoned");
                    (ctx.rom_name.clone(), ctx.pattern_video_path.clone())
                };
                if current_rom.as_deref() != Some(rom.as_str()) {
                    current_rom = Some(rom.clone());
                    loaded = if rom.is_empty() {
                        false
                    } else {
                        match matcher.set_context(
                            Path::new(&video_path),
                            &rom,
                            shared.config.pattern_exact_match,
                        ) {
                            Ok(()) => true,
                            Err(e) => {
                                log::info!("{}", e);
                                false
                            }
                        }
                    };
                }

                if loaded {
                    let len = scratch.pixel_len();
                    if let Some(id) = matcher.match_frame(
                        &scratch.pixels[..len],
                        scratch.depth,
                        scratch.width,
                        scratch.height,
                    ) {
                        shared.dispatcher.handle_trigger(id);
                    }
                }
            }

            if shared.ring.stopped() {
                return;
            }
        }
    }
}

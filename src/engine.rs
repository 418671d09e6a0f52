//! # Engine Orchestration
//!
//! [`DmdEngine`] owns the whole pipeline: the frame ring, the producer
//! intake, the per-family sink workers, the colorization and pattern
//! workers, and the optional network forwarder. Construction follows the
//! builder pattern; external collaborators (colorizer, pattern matcher,
//! segment renderer, display drivers) are injected behind their traits.
//!
//! ## Threading
//!
//! Each sink family runs one worker thread blocking on the ring's condition
//! variable. The producer's calling thread performs the slot write and the
//! network send itself; both are short and never wait on a sink. Dropping
//! the engine requests stop under the signal lock, broadcasts, and joins
//! every thread in a deterministic order: producer-side threads first, then
//! sink threads, then the colorization and pattern threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::colorize::{colorize_worker, ColorizerLoader};
use crate::config::DmdConfig;
use crate::error::{DmdError, DmdResult};
use crate::frame::{
    check_geometry, AlphaNumericLayout, BlockSegmentRenderer, FrameUpdate, Mode, SegmentRenderer,
    ALPHANUM_HEIGHT, ALPHANUM_WIDTH, SEG_BANK_WORDS,
};
use crate::logger;
use crate::ring::FrameRing;
use crate::sinks::dump::{raw_dump_worker, text_dump_worker};
use crate::sinks::hardware::{hardware_worker, DisplayProvider, HardwareOptions};
use crate::sinks::secondary::secondary_worker;
use crate::sinks::virt::{
    console_worker, level_worker, rgb24_worker, ConsoleSink, LevelSink, Rgb24Sink,
};
use crate::trigger::{pattern_worker, PatternMatcher, TriggerDispatcher};

/// Context strings owned by the engine, written by the producer API and read
/// by several workers.
pub(crate) struct Context {
    pub rom_name: String,
    pub alt_color_path: String,
    pub pattern_video_path: String,
    /// Base for the dump sinks' millisecond offsets
    pub rom_started: Instant,
}

/// State shared between the engine facade and its worker threads.
pub(crate) struct Shared {
    pub ring: FrameRing,
    pub config: DmdConfig,
    pub context: RwLock<Context>,
    /// Set on ROM change, sent once on the next network packet
    pub disconnect_others: AtomicBool,
    pub finding: AtomicBool,
    /// A colorizer session is loaded; sinks skip raw `Data` frames
    pub colorizer_active: AtomicBool,
    pub hardware_attached: AtomicBool,
    pub secondary_attached: AtomicBool,
    pub dispatcher: TriggerDispatcher,
    pub level_sinks: RwLock<Vec<Arc<LevelSink>>>,
    pub rgb24_sinks: RwLock<Vec<Arc<Rgb24Sink>>>,
    pub console_sinks: RwLock<Vec<Arc<ConsoleSink>>>,
    pub segment_renderer: Box<dyn SegmentRenderer>,
    pub net: Mutex<Option<dmd_net::NetPublisher>>,
    pub next_sink_id: AtomicU64,
}

impl Shared {
    /// The intake core: write the record into the ring, wake every consumer,
    /// and forward non-colorized records to the display server.
    pub(crate) fn push_update(&self, frame: &FrameUpdate, buffered: bool) {
        self.ring.push(frame, buffered);
        if !frame.mode.is_colorized() {
            self.forward_to_network(frame, buffered);
        }
    }

    fn forward_to_network(&self, frame: &FrameUpdate, buffered: bool) {
        let net = self.net.lock().expect("network publisher lock poisoned");
        let Some(publisher) = net.as_ref() else { return };
        if !publisher.is_connected() {
            return;
        }

        let packet = {
            let ctx = self.context.read().expect("context lock poisoned");
            dmd_net::encode_packet(
                dmd_net::StreamHeader {
                    buffered,
                    disconnect_others: self.disconnect_others.load(Ordering::Acquire),
                },
                &dmd_net::PathsContext {
                    rom_name: &ctx.rom_name,
                    alt_color_path: &ctx.alt_color_path,
                    pattern_video_path: &ctx.pattern_video_path,
                },
                &frame.wire_view(),
            )
        };
        match publisher.send(packet) {
            Ok(()) => self.disconnect_others.store(false, Ordering::Release),
            Err(e) => log::warn!("{}", DmdError::from(e)),
        }
    }
}

/// Clears the frame-ready flag one tick after it was raised, giving every
/// blocked consumer a chance to observe it.
fn ready_reset_worker(shared: Arc<Shared>) {
    loop {
        if !shared.ring.wait_frame() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
        shared.ring.clear_frame_ready();
        if shared.ring.stopped() {
            return;
        }
    }
}

#[derive(Default)]
struct Workers {
    ready_reset: Option<JoinHandle<()>>,
    level: Option<JoinHandle<()>>,
    rgb24: Option<JoinHandle<()>>,
    console: Option<JoinHandle<()>>,
    hardware: Option<JoinHandle<()>>,
    secondary: Option<JoinHandle<()>>,
    dump_text: Option<JoinHandle<()>>,
    dump_raw: Option<JoinHandle<()>>,
    colorize: Option<JoinHandle<()>>,
    pattern: Option<JoinHandle<()>>,
    finder: Option<JoinHandle<()>>,
    net_writer: Option<JoinHandle<()>>,
}

fn spawn_worker<F>(name: &str, f: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    match thread::Builder::new().name(name.to_string()).spawn(f) {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::error!("failed to start {} thread: {}", name, e);
            None
        }
    }
}

fn join(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        let _ = handle.join();
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Builder for a [`DmdEngine`] with injected collaborators.
pub struct DmdEngineBuilder {
    config: DmdConfig,
    segment_renderer: Option<Box<dyn SegmentRenderer>>,
    colorizer: Option<Box<dyn ColorizerLoader>>,
    pattern_matcher: Option<Box<dyn PatternMatcher>>,
}

impl DmdEngineBuilder {
    pub fn new(config: DmdConfig) -> Self {
        Self { config, segment_renderer: None, colorizer: None, pattern_matcher: None }
    }

    /// Replace the built-in segment renderer.
    pub fn segment_renderer(mut self, renderer: Box<dyn SegmentRenderer>) -> Self {
        self.segment_renderer = Some(renderer);
        self
    }

    /// Attach a colorization loader. The worker only runs when `alt_color`
    /// is enabled in the configuration.
    pub fn colorizer(mut self, loader: Box<dyn ColorizerLoader>) -> Self {
        self.colorizer = Some(loader);
        self
    }

    /// Attach a pattern matcher. The worker only runs when `pattern_capture`
    /// is enabled in the configuration.
    pub fn pattern_matcher(mut self, matcher: Box<dyn PatternMatcher>) -> Self {
        self.pattern_matcher = Some(matcher);
        self
    }

    pub fn build(self) -> DmdEngine {
        let config = self.config;
        if let Some(cb) = config.log_callback.clone() {
            logger::install(cb);
        }
        let trigger_callback = config.trigger_callback.clone();

        let shared = Arc::new(Shared {
            ring: FrameRing::new(),
            context: RwLock::new(Context {
                rom_name: String::new(),
                alt_color_path: config.alt_color_path.clone(),
                pattern_video_path: config.pattern_video_path.clone(),
                rom_started: Instant::now(),
            }),
            disconnect_others: AtomicBool::new(false),
            finding: AtomicBool::new(false),
            colorizer_active: AtomicBool::new(false),
            hardware_attached: AtomicBool::new(false),
            secondary_attached: AtomicBool::new(false),
            dispatcher: TriggerDispatcher::new(),
            level_sinks: RwLock::new(Vec::new()),
            rgb24_sinks: RwLock::new(Vec::new()),
            console_sinks: RwLock::new(Vec::new()),
            segment_renderer: self
                .segment_renderer
                .unwrap_or_else(|| Box::new(BlockSegmentRenderer)),
            net: Mutex::new(None),
            next_sink_id: AtomicU64::new(1),
            config,
        });
        shared.dispatcher.set_callback(trigger_callback);

        let mut workers = Workers::default();

        if shared.config.network_enabled {
            let net_cfg = dmd_net::NetConfig {
                addr: shared.config.network_addr.clone(),
                port: shared.config.network_port,
                ..Default::default()
            };
            match dmd_net::connect(&net_cfg) {
                Ok((publisher, handle)) => {
                    *shared.net.lock().expect("network publisher lock poisoned") = Some(publisher);
                    workers.net_writer = Some(handle);
                }
                Err(e) => log::error!("{}", DmdError::from(e)),
            }
        }

        {
            let shared = Arc::clone(&shared);
            workers.ready_reset = spawn_worker("dmd-ready-reset", move || ready_reset_worker(shared));
        }
        if shared.config.dump_text {
            let shared = Arc::clone(&shared);
            workers.dump_text = spawn_worker("dmd-dump-text", move || text_dump_worker(shared));
        }
        if shared.config.dump_raw {
            let shared = Arc::clone(&shared);
            workers.dump_raw = spawn_worker("dmd-dump-raw", move || raw_dump_worker(shared));
        }
        // With network forwarding enabled the remote server owns
        // colorization and pattern matching.
        if !shared.config.network_enabled {
            if shared.config.alt_color {
                if let Some(loader) = self.colorizer {
                    let shared = Arc::clone(&shared);
                    workers.colorize =
                        spawn_worker("dmd-colorize", move || colorize_worker(shared, loader));
                }
            }
            if shared.config.pattern_capture {
                if let Some(matcher) = self.pattern_matcher {
                    let shared = Arc::clone(&shared);
                    workers.pattern =
                        spawn_worker("dmd-pattern", move || pattern_worker(shared, matcher));
                }
            }
        }

        DmdEngine { shared, workers: Arc::new(Mutex::new(workers)) }
    }
}

/// The fan-out engine: one producer feeding a heterogeneous set of display
/// sinks through a fixed-size frame ring.
pub struct DmdEngine {
    shared: Arc<Shared>,
    workers: Arc<Mutex<Workers>>,
}

impl DmdEngine {
    /// Engine with default collaborators (built-in segment renderer, no
    /// colorizer, no pattern matcher).
    pub fn new(config: DmdConfig) -> Self {
        DmdEngineBuilder::new(config).build()
    }

    pub fn builder(config: DmdConfig) -> DmdEngineBuilder {
        DmdEngineBuilder::new(config)
    }

    /// Submit a frame. `mode` selects the payload interpretation: monochrome
    /// levels (`Data`, depth 2 or 4), packed RGB888 (`Rgb24`) or packed
    /// RGB565 byte pairs (`Rgb16`).
    #[allow(clippy::too_many_arguments)]
    pub fn update_data(
        &self,
        pixels: &[u8],
        depth: u8,
        width: u16,
        height: u16,
        red: u8,
        green: u8,
        blue: u8,
        mode: Mode,
        buffered: bool,
    ) -> DmdResult<()> {
        if !matches!(mode, Mode::Data | Mode::Rgb24 | Mode::Rgb16)
            || (mode == Mode::Data && depth != 2 && depth != 4)
        {
            let e = DmdError::UnsupportedFrame { mode: mode.name(), width, height };
            log::error!("{}", e);
            return Err(e);
        }
        if let Err(e) = check_geometry(mode, depth, width, height) {
            log::error!("{}", e);
            return Err(e);
        }

        let len = width as usize * height as usize;
        let payload = match mode {
            Mode::Rgb24 => len * 3,
            Mode::Rgb16 => len * 2,
            _ => len,
        };
        if pixels.len() < payload {
            let e = DmdError::UnsupportedFrame { mode: mode.name(), width, height };
            log::error!("short payload: {}", e);
            return Err(e);
        }

        let mut frame = Box::new(FrameUpdate::zeroed());
        frame.mode = mode;
        frame.depth = depth;
        frame.width = width;
        frame.height = height;
        frame.red = red;
        frame.green = green;
        frame.blue = blue;
        match mode {
            Mode::Rgb16 => {
                for (i, pair) in pixels[..payload].chunks_exact(2).enumerate() {
                    frame.seg_a[i] = u16::from_le_bytes([pair[0], pair[1]]);
                }
                frame.has_seg_a = true;
            }
            _ => {
                frame.pixels[..payload].copy_from_slice(&pixels[..payload]);
                frame.has_pixels = true;
            }
        }
        self.shared.push_update(&frame, buffered);
        Ok(())
    }

    /// Submit a packed RGB888 frame at full color depth.
    pub fn update_rgb24(
        &self,
        pixels: &[u8],
        width: u16,
        height: u16,
        buffered: bool,
    ) -> DmdResult<()> {
        self.update_data(pixels, 24, width, height, 0, 0, 0, Mode::Rgb24, buffered)
    }

    /// Submit a packed RGB565 frame.
    pub fn update_rgb16(
        &self,
        words: &[u16],
        width: u16,
        height: u16,
        buffered: bool,
    ) -> DmdResult<()> {
        if let Err(e) = check_geometry(Mode::Rgb16, 24, width, height) {
            log::error!("{}", e);
            return Err(e);
        }
        let len = width as usize * height as usize;
        if words.len() < len {
            let e = DmdError::UnsupportedFrame { mode: Mode::Rgb16.name(), width, height };
            log::error!("short payload: {}", e);
            return Err(e);
        }
        let mut frame = Box::new(FrameUpdate::zeroed());
        frame.mode = Mode::Rgb16;
        frame.depth = 24;
        frame.width = width;
        frame.height = height;
        frame.seg_a[..len].copy_from_slice(&words[..len]);
        frame.has_seg_a = true;
        self.shared.push_update(&frame, buffered);
        Ok(())
    }

    /// Submit alphanumeric segment data; each bank holds up to
    /// [`SEG_BANK_WORDS`] words. Alphanumeric updates are never buffered.
    pub fn update_alphanumeric(
        &self,
        layout: AlphaNumericLayout,
        seg_a: &[u16],
        seg_b: Option<&[u16]>,
        red: u8,
        green: u8,
        blue: u8,
    ) -> DmdResult<()> {
        let mut frame = Box::new(FrameUpdate::zeroed());
        frame.mode = Mode::AlphaNumeric;
        frame.layout = layout;
        frame.depth = 2;
        frame.width = ALPHANUM_WIDTH;
        frame.height = ALPHANUM_HEIGHT;
        frame.red = red;
        frame.green = green;
        frame.blue = blue;
        let n = seg_a.len().min(SEG_BANK_WORDS);
        frame.seg_a[..n].copy_from_slice(&seg_a[..n]);
        frame.has_seg_a = true;
        if let Some(seg_b) = seg_b {
            let n = seg_b.len().min(SEG_BANK_WORDS);
            frame.seg_b[..n].copy_from_slice(&seg_b[..n]);
            frame.has_seg_b = true;
        }
        self.shared.push_update(&frame, false);
        Ok(())
    }

    /// Re-enqueue the last buffered frame as an ordinary update.
    pub fn queue_last_buffered(&self) {
        let mut frame = Box::new(FrameUpdate::zeroed());
        if self.shared.ring.replay_into(&mut frame) {
            self.shared.push_update(&frame, false);
        }
    }

    /// Set the current ROM name (hard-truncated to 255 bytes). A change
    /// resets the dump clock and arms the network disconnect-others flag for
    /// one packet.
    pub fn set_rom_name(&self, name: &str) {
        let name = truncate_utf8(name, dmd_net::MAX_NAME_BYTES - 1);
        let mut ctx = self.shared.context.write().expect("context lock poisoned");
        if ctx.rom_name != name {
            log::info!("ROM set to '{}'", name);
            ctx.rom_name = name.to_string();
            ctx.rom_started = Instant::now();
            drop(ctx);
            self.shared.disconnect_others.store(true, Ordering::Release);
        }
    }

    pub fn set_alt_color_path(&self, path: &str) {
        let path = truncate_utf8(path, dmd_net::MAX_PATH_BYTES - 1);
        self.shared.context.write().expect("context lock poisoned").alt_color_path =
            path.to_string();
    }

    pub fn set_pattern_video_path(&self, path: &str) {
        let path = truncate_utf8(path, dmd_net::MAX_PATH_BYTES - 1);
        self.shared.context.write().expect("context lock poisoned").pattern_video_path =
            path.to_string();
    }

    /// Discover and attach display hardware on a background thread.
    /// Idempotent while a discovery pass is already running.
    pub fn find_displays<P: DisplayProvider>(&self, provider: P) {
        if self.shared.config.network_enabled {
            log::info!("display discovery skipped: frames forward to the display server");
            return;
        }
        if self.shared.finding.swap(true, Ordering::AcqRel) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let workers = Arc::clone(&self.workers);
        let finder = spawn_worker("dmd-find-displays", move || {
            let cfg = &shared.config;

            if cfg.hardware_display_enabled {
                let wifi = match (cfg.hardware_wifi_enabled, &cfg.hardware_wifi_addr) {
                    (false, _) => Ok(None),
                    (true, Some(addr)) => Ok(Some((addr.clone(), cfg.hardware_wifi_port))),
                    (true, None) => Err(DmdError::config(
                        "hardware_wifi_addr",
                        "required when hardware_wifi_enabled is set",
                    )),
                };
                match wifi {
                    Err(e) => log::error!("{}", e),
                    Ok(wifi) => {
                        let options = HardwareOptions {
                            device: cfg.hardware_device.clone(),
                            debug: cfg.hardware_debug,
                            rgb_order: cfg.hardware_rgb_order,
                            brightness: cfg.hardware_brightness,
                            save_settings: cfg.hardware_save_settings,
                            wifi,
                        };
                        match provider.open_hardware(&options) {
                            Ok(display) => {
                                log::info!("hardware display attached");
                                shared.hardware_attached.store(true, Ordering::Release);
                                let worker_shared = Arc::clone(&shared);
                                let handle = spawn_worker("dmd-hardware", move || {
                                    hardware_worker(worker_shared, display)
                                });
                                workers.lock().expect("worker table poisoned").hardware = handle;
                            }
                            Err(e) => log::info!("{}", e),
                        }
                    }
                }
            }

            if cfg.secondary_display_enabled {
                match provider.open_secondary(cfg.secondary_device.as_deref()) {
                    Ok(display) => {
                        log::info!("secondary display attached");
                        shared.secondary_attached.store(true, Ordering::Release);
                        let worker_shared = Arc::clone(&shared);
                        let handle = spawn_worker("dmd-secondary", move || {
                            secondary_worker(worker_shared, display)
                        });
                        workers.lock().expect("worker table poisoned").secondary = handle;
                    }
                    // The driver is a runtime capability; platforms without
                    // it simply run without the secondary sink.
                    Err(e) => log::info!("{}", e),
                }
            }

            shared.finding.store(false, Ordering::Release);
        });
        self.workers.lock().expect("worker table poisoned").finder = finder;
    }

    /// Whether a discovery pass is currently running.
    pub fn is_finding(&self) -> bool {
        self.shared.finding.load(Ordering::Acquire)
    }

    /// Whether any physical display is attached.
    pub fn has_display(&self) -> bool {
        self.shared.hardware_attached.load(Ordering::Acquire)
            || self.shared.secondary_attached.load(Ordering::Acquire)
    }

    /// Register an in-process level sink; its worker starts on first use.
    pub fn create_level_sink(&self, width: u16, height: u16) -> Arc<LevelSink> {
        let id = self.shared.next_sink_id.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::new(LevelSink::new(id, width, height));
        self.shared
            .level_sinks
            .write()
            .expect("level registry poisoned")
            .push(Arc::clone(&sink));
        let mut workers = self.workers.lock().expect("worker table poisoned");
        if workers.level.is_none() {
            let shared = Arc::clone(&self.shared);
            workers.level = spawn_worker("dmd-level", move || level_worker(shared));
        }
        sink
    }

    pub fn destroy_level_sink(&self, sink: &Arc<LevelSink>) -> bool {
        let mut sinks = self.shared.level_sinks.write().expect("level registry poisoned");
        let before = sinks.len();
        sinks.retain(|s| s.id != sink.id);
        sinks.len() != before
    }

    /// Register an in-process 24-bit sink; its worker starts on first use.
    pub fn create_rgb24_sink(&self, width: u16, height: u16) -> Arc<Rgb24Sink> {
        let id = self.shared.next_sink_id.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::new(Rgb24Sink::new(id, width, height));
        self.shared
            .rgb24_sinks
            .write()
            .expect("rgb24 registry poisoned")
            .push(Arc::clone(&sink));
        let mut workers = self.workers.lock().expect("worker table poisoned");
        if workers.rgb24.is_none() {
            let shared = Arc::clone(&self.shared);
            workers.rgb24 = spawn_worker("dmd-rgb24", move || rgb24_worker(shared));
        }
        sink
    }

    pub fn destroy_rgb24_sink(&self, sink: &Arc<Rgb24Sink>) -> bool {
        let mut sinks = self.shared.rgb24_sinks.write().expect("rgb24 registry poisoned");
        let before = sinks.len();
        sinks.retain(|s| s.id != sink.id);
        sinks.len() != before
    }

    /// Register an in-process console sink; its worker starts on first use.
    pub fn create_console_sink(&self, width: u16, height: u16) -> Arc<ConsoleSink> {
        let id = self.shared.next_sink_id.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::new(ConsoleSink::new(id, width, height));
        self.shared
            .console_sinks
            .write()
            .expect("console registry poisoned")
            .push(Arc::clone(&sink));
        let mut workers = self.workers.lock().expect("worker table poisoned");
        if workers.console.is_none() {
            let shared = Arc::clone(&self.shared);
            workers.console = spawn_worker("dmd-console", move || console_worker(shared));
        }
        sink
    }

    pub fn destroy_console_sink(&self, sink: &Arc<ConsoleSink>) -> bool {
        let mut sinks = self.shared.console_sinks.write().expect("console registry poisoned");
        let before = sinks.len();
        sinks.retain(|s| s.id != sink.id);
        sinks.len() != before
    }
}

impl Drop for DmdEngine {
    fn drop(&mut self) {
        self.shared.ring.request_stop();

        // The finder may still be registering sink workers and needs the
        // worker table for that; join it without holding the lock.
        let mut finder = self.workers.lock().expect("worker table poisoned").finder.take();
        join(&mut finder);

        let mut workers =
            std::mem::take(&mut *self.workers.lock().expect("worker table poisoned"));
        join(&mut workers.ready_reset);
        join(&mut workers.level);
        join(&mut workers.rgb24);
        join(&mut workers.console);
        join(&mut workers.hardware);
        join(&mut workers.secondary);
        join(&mut workers.dump_text);
        join(&mut workers.dump_raw);
        join(&mut workers.colorize);
        join(&mut workers.pattern);
        // Dropping the publisher closes the channel; the writer drains what
        // is queued and exits.
        *self.shared.net.lock().expect("network publisher lock poisoned") = None;
        join(&mut workers.net_writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_utf8("abcdef", 4), "abcd");
        assert_eq!(truncate_utf8("abc", 4), "abc");
        // Multi-byte char straddling the limit is dropped whole.
        assert_eq!(truncate_utf8("ab\u{00e9}cd", 3), "ab");
    }

    #[test]
    fn engine_survives_construction_and_teardown() {
        let cfg = DmdConfig { hardware_display_enabled: false, ..Default::default() };
        let engine = DmdEngine::new(cfg);
        assert!(!engine.has_display());
        assert!(!engine.is_finding());
        engine.set_rom_name("mm_109c");
        engine
            .update_data(&[0u8; 128 * 32], 2, 128, 32, 255, 0, 0, Mode::Data, false)
            .expect("update accepted");
        drop(engine);
    }

    #[test]
    fn oversize_geometry_is_rejected() {
        let engine = DmdEngine::new(DmdConfig::default());
        let err = engine
            .update_data(&[0u8; 4], 2, 300, 80, 0, 0, 0, Mode::Data, false)
            .expect_err("oversize rejected");
        assert_eq!(err.category(), "oversize_geometry");
    }
}

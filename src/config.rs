//! # Engine Configuration
//!
//! All knobs recognized by the engine live in [`DmdConfig`], an explicit
//! struct passed at engine construction. A process-wide convenience accessor
//! is provided for host applications that cannot thread a context through
//! their call stack, but the engine itself only ever reads the instance it
//! was built with.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::palette::{default_brightness, BrightnessCurve};

/// User hook receiving every log record emitted by the engine.
pub type LogCallback = Arc<dyn Fn(log::Level, &str) + Send + Sync>;

/// User hook fired once per unique trigger id. Calls arrive on engine-owned
/// threads; the callback must not block for long.
pub type TriggerCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Configuration consulted when the engine is constructed.
#[derive(Clone)]
pub struct DmdConfig {
    /// Enable the colorization worker when a loader is attached
    pub alt_color: bool,
    /// Default directory for colorization assets
    pub alt_color_path: String,
    /// Enable the pattern-trigger matcher when one is attached
    pub pattern_capture: bool,
    /// Require exact pixel matches in the pattern matcher
    pub pattern_exact_match: bool,
    /// Default directory for pattern-trigger videos
    pub pattern_video_path: String,
    /// Colorizer frame timeout, forwarded to the loader
    pub frames_timeout_ms: u32,
    /// Colorizer skip count, forwarded to the loader
    pub frames_to_skip: u32,

    /// Look for the primary hardware display during device discovery
    pub hardware_display_enabled: bool,
    /// Serial device override for the primary display
    pub hardware_device: Option<String>,
    pub hardware_debug: bool,
    pub hardware_rgb_order: Option<u8>,
    pub hardware_brightness: Option<u8>,
    pub hardware_save_settings: bool,
    /// Reach the primary display over Wi-Fi instead of serial
    pub hardware_wifi_enabled: bool,
    pub hardware_wifi_addr: Option<String>,
    pub hardware_wifi_port: u16,

    /// Look for the secondary 128x32 display during device discovery
    pub secondary_display_enabled: bool,
    pub secondary_device: Option<String>,

    /// Forward frames to a remote display server
    pub network_enabled: bool,
    pub network_addr: String,
    pub network_port: u16,

    /// Write a hex text dump of every monochrome frame
    pub dump_text: bool,
    /// Write a binary dump of every frame record
    pub dump_raw: bool,
    /// Directory receiving `<rom>.txt` / `<rom>.raw` dump files
    pub dump_path: String,

    pub log_callback: Option<LogCallback>,
    pub trigger_callback: Option<TriggerCallback>,
    /// Gamma curve used for palette derivation
    pub brightness_curve: BrightnessCurve,
}

impl Default for DmdConfig {
    fn default() -> Self {
        Self {
            alt_color: true,
            alt_color_path: String::new(),
            pattern_capture: true,
            pattern_exact_match: false,
            pattern_video_path: String::new(),
            frames_timeout_ms: 0,
            frames_to_skip: 0,
            hardware_display_enabled: true,
            hardware_device: None,
            hardware_debug: false,
            hardware_rgb_order: None,
            hardware_brightness: None,
            hardware_save_settings: false,
            hardware_wifi_enabled: false,
            hardware_wifi_addr: None,
            hardware_wifi_port: 3333,
            secondary_display_enabled: true,
            secondary_device: None,
            network_enabled: false,
            network_addr: "localhost".to_string(),
            network_port: 6789,
            dump_text: false,
            dump_raw: false,
            dump_path: String::new(),
            log_callback: None,
            trigger_callback: None,
            brightness_curve: default_brightness,
        }
    }
}

impl std::fmt::Debug for DmdConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmdConfig")
            .field("alt_color", &self.alt_color)
            .field("pattern_capture", &self.pattern_capture)
            .field("hardware_display_enabled", &self.hardware_display_enabled)
            .field("hardware_wifi_enabled", &self.hardware_wifi_enabled)
            .field("secondary_display_enabled", &self.secondary_display_enabled)
            .field("network_enabled", &self.network_enabled)
            .field("network_addr", &self.network_addr)
            .field("network_port", &self.network_port)
            .field("dump_text", &self.dump_text)
            .field("dump_raw", &self.dump_raw)
            .field("has_log_callback", &self.log_callback.is_some())
            .field("has_trigger_callback", &self.trigger_callback.is_some())
            .finish()
    }
}

static GLOBAL: Lazy<RwLock<DmdConfig>> = Lazy::new(|| RwLock::new(DmdConfig::default()));

/// Process-wide configuration for hosts that cannot thread a context struct.
/// Read it once at engine construction; later mutations do not reach a
/// running engine.
pub fn global() -> &'static RwLock<DmdConfig> {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = DmdConfig::default();
        assert!(cfg.alt_color);
        assert!(cfg.pattern_capture);
        assert!(!cfg.network_enabled);
        assert_eq!(cfg.network_addr, "localhost");
        assert_eq!(cfg.network_port, 6789);
        assert!(cfg.hardware_device.is_none());
    }

    #[test]
    fn global_accessor_is_shared() {
        {
            let mut cfg = global().write().unwrap();
            cfg.network_port = 7001;
        }
        assert_eq!(global().read().unwrap().network_port, 7001);
        global().write().unwrap().network_port = 6789;
    }
}

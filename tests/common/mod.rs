//! Shared test doubles: recording display drivers, a scriptable colorizer
//! and a polling helper for cross-thread assertions.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dmdcast::palette::PALETTE_BYTES;
use dmdcast::{
    Colorization, ColorizedOutput, ColorizerLoader, ColorizerOptions, ColorizerSession,
    DisplayProvider, DmdError, DmdResult, HardwareDisplay, HardwareOptions, RotationUpdate,
    SecondaryDisplay, TRIGGER_NONE,
};

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    FrameSize(u16, u16),
    Palette(Vec<u8>, u16),
    PreUpscaling(bool),
    Rgb24(Vec<u8>),
    Rgb565(Vec<u16>),
    Gray2(Vec<u8>),
    Gray4(Vec<u8>),
    ColoredGray6(Vec<u8>, Vec<u8>),
}

/// Thread-shared log of driver calls with their arrival times.
#[derive(Clone, Default)]
pub struct CallLog(pub Arc<Mutex<Vec<(Instant, HwCall)>>>);

impl CallLog {
    pub fn push(&self, call: HwCall) {
        self.0.lock().unwrap().push((Instant::now(), call));
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.0.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, HwCall)> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&HwCall) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|(_, c)| matches(c)).count()
    }
}

pub struct RecordingHardware {
    pub log: CallLog,
    pub width: u16,
}

impl HardwareDisplay for RecordingHardware {
    fn native_width(&self) -> u16 {
        self.width
    }

    fn set_frame_size(&mut self, width: u16, height: u16) {
        self.log.push(HwCall::FrameSize(width, height));
    }

    fn set_palette(&mut self, palette: &[u8], colors: u16) {
        self.log.push(HwCall::Palette(palette.to_vec(), colors));
    }

    fn set_pre_upscaling(&mut self, enabled: bool) {
        self.log.push(HwCall::PreUpscaling(enabled));
    }

    fn render_rgb24(&mut self, pixels: &[u8]) {
        self.log.push(HwCall::Rgb24(pixels.to_vec()));
    }

    fn render_rgb565(&mut self, pixels: &[u16]) {
        self.log.push(HwCall::Rgb565(pixels.to_vec()));
    }

    fn render_gray2(&mut self, pixels: &[u8]) {
        self.log.push(HwCall::Gray2(pixels.to_vec()));
    }

    fn render_gray4(&mut self, pixels: &[u8]) {
        self.log.push(HwCall::Gray4(pixels.to_vec()));
    }

    fn render_colored_gray6(
        &mut self,
        pixels: &[u8],
        palette: &[u8; PALETTE_BYTES],
        _rotations: Option<&[u8; 24]>,
    ) {
        self.log.push(HwCall::ColoredGray6(pixels.to_vec(), palette.to_vec()));
    }
}

#[derive(Clone, Default)]
pub struct SecondaryLog(pub Arc<Mutex<Vec<Vec<u16>>>>);

impl SecondaryLog {
    pub fn frames(&self) -> Vec<Vec<u16>> {
        self.0.lock().unwrap().clone()
    }
}

pub struct RecordingSecondary {
    pub log: SecondaryLog,
}

impl SecondaryDisplay for RecordingSecondary {
    fn update(&mut self, rgb565: &[u16]) {
        self.log.0.lock().unwrap().push(rgb565.to_vec());
    }
}

/// Provider handing out at most one pre-built driver per family.
pub struct MockProvider {
    hardware: Mutex<Option<Box<dyn HardwareDisplay>>>,
    secondary: Mutex<Option<Box<dyn SecondaryDisplay>>>,
}

impl MockProvider {
    pub fn new(
        hardware: Option<Box<dyn HardwareDisplay>>,
        secondary: Option<Box<dyn SecondaryDisplay>>,
    ) -> Self {
        Self { hardware: Mutex::new(hardware), secondary: Mutex::new(secondary) }
    }
}

impl DisplayProvider for MockProvider {
    fn open_hardware(&self, _options: &HardwareOptions) -> DmdResult<Box<dyn HardwareDisplay>> {
        self.hardware
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DmdError::hardware_open("mock", "no hardware configured"))
    }

    fn open_secondary(&self, _device: Option<&str>) -> DmdResult<Box<dyn SecondaryDisplay>> {
        self.secondary
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DmdError::hardware_open("mock-secondary", "no driver on this platform"))
    }
}

/// Loader producing sessions from a factory closure.
pub struct MockColorizer(pub Arc<dyn Fn() -> Box<dyn ColorizerSession> + Send + Sync>);

impl ColorizerLoader for MockColorizer {
    fn load(
        &self,
        _alt_color_path: &Path,
        _rom_name: &str,
        _options: &ColorizerOptions,
    ) -> DmdResult<Box<dyn ColorizerSession>> {
        Ok((self.0)())
    }
}

/// Session emitting a 32-row RGB565 frame of `first` per input and a single
/// rotation frame of `second` after `rotation_delay_ms`.
pub struct RotatingSession {
    pub first: u16,
    pub second: u16,
    pub rotation_delay_ms: u16,
}

impl ColorizerSession for RotatingSession {
    fn colorize(&mut self, _pixels: &[u8], _width: u16, _height: u16) -> Option<Colorization> {
        Some(Colorization {
            output: ColorizedOutput::Rgb565 {
                width32: 128,
                frame32: vec![self.first; 128 * 32],
                width64: 0,
                frame64: Vec::new(),
            },
            trigger_id: TRIGGER_NONE,
            rotation_delay_ms: self.rotation_delay_ms,
        })
    }

    fn rotate(&mut self) -> Option<RotationUpdate> {
        Some(RotationUpdate {
            output: ColorizedOutput::Rgb565 {
                width32: 128,
                frame32: vec![self.second; 128 * 32],
                width64: 0,
                frame64: Vec::new(),
            },
            render32: true,
            render64: false,
            rotation_delay_ms: 0,
        })
    }
}

/// Session replaying a scripted list of trigger ids, one per input frame.
pub struct TriggerSession {
    pub ids: VecDeque<u32>,
}

impl ColorizerSession for TriggerSession {
    fn colorize(&mut self, pixels: &[u8], width: u16, height: u16) -> Option<Colorization> {
        let trigger_id = self.ids.pop_front()?;
        Some(Colorization {
            output: ColorizedOutput::Indexed {
                width,
                height,
                pixels: pixels.to_vec(),
                palette: [0; PALETTE_BYTES],
            },
            trigger_id,
            rotation_delay_ms: 0,
        })
    }

    fn rotate(&mut self) -> Option<RotationUpdate> {
        None
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

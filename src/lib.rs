//! # dmdcast
//!
//! A real-time dot-matrix display fan-out engine for pinball emulation and
//! related retro-graphics applications. A single producer feeds pixel frames
//! (monochrome with depth, RGB888, RGB565 or alphanumeric segment words) at
//! varying geometries; the engine colorizes them through a ROM-keyed
//! external library, renders segment data to pixels, and concurrently pushes
//! every frame to a heterogeneous set of physical and virtual sinks.
//!
//! ## Architecture
//!
//! The pipeline is built around a fixed-size frame ring with one producer
//! cursor and a private cursor per consumer:
//!
//! ```text
//! producer ──▶ frame ring ──▶ hardware display worker
//!     │            │    ├───▶ secondary display worker
//!     │            │    ├───▶ level / rgb24 / console workers
//!     │            │    ├───▶ text / raw dump workers (lossless)
//!     │            │    └───▶ pattern trigger worker
//!     │            ▼
//!     │      colorization worker ──▶ colorized records re-enter the ring
//!     └─────▶ TCP display server (producer path, non-colorized frames)
//! ```
//!
//! Fan-out consumers run under a latest-wins policy: a worker that falls too
//! far behind is snapped forward to near the producer and frames in between
//! are dropped. The dump workers bypass the snap and observe every frame.
//!
//! ## External Collaborators
//!
//! Concrete device drivers, the colorization library, the segment renderer
//! and the pattern matcher are injected behind traits:
//!
//! - [`HardwareDisplay`] / [`SecondaryDisplay`] / [`DisplayProvider`]
//! - [`ColorizerLoader`] / [`ColorizerSession`]
//! - [`SegmentRenderer`] (a built-in block renderer is the default)
//! - [`PatternMatcher`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use dmdcast::{DmdConfig, DmdEngine, Mode};
//!
//! let config = DmdConfig::default();
//! let engine = DmdEngine::new(config);
//! engine.set_rom_name("mm_109c");
//!
//! let frame = vec![0u8; 128 * 32];
//! engine.update_data(&frame, 2, 128, 32, 255, 0, 0, Mode::Data, false)?;
//! # Ok::<(), dmdcast::DmdError>(())
//! ```

pub mod colorize;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod logger;
pub mod palette;
pub mod ring;
pub mod sinks;
pub mod trigger;

pub use colorize::{
    Colorization, ColorizedOutput, ColorizerLoader, ColorizerOptions, ColorizerSession,
    RotationUpdate,
};
pub use config::{DmdConfig, LogCallback, TriggerCallback};
pub use engine::{DmdEngine, DmdEngineBuilder};
pub use error::{DmdError, DmdResult};
pub use frame::{
    AlphaNumericLayout, BlockSegmentRenderer, FrameUpdate, Mode, SegmentRenderer, MAX_HEIGHT,
    MAX_WIDTH,
};
pub use sinks::hardware::{
    DisplayProvider, HardwareDisplay, HardwareOptions, SecondaryDisplay,
};
pub use sinks::virt::{ConsoleSink, LevelSink, Rgb24Sink};
pub use trigger::{PatternMatcher, TriggerDispatcher, TRIGGER_NONE};

//! # Engine Error Types
//!
//! Every failure in the engine is recoverable locally: a hardware sink that
//! fails to open disables only itself, a colorizer that fails to load leaves
//! frames uncolorized for the current ROM, a dump file that cannot be written
//! stops dumping until the next ROM change. The error type therefore carries
//! enough context to log a useful message, and nothing more.

use std::path::PathBuf;

/// Error type for engine operations, one variant per failure domain.
#[derive(Debug)]
pub enum DmdError {
    /// A configuration option is missing or inconsistent
    Config { option: String, reason: String },
    /// A hardware display driver refused to open
    HardwareOpen { device: String, reason: String },
    /// The colorization asset for a ROM could not be loaded
    ColorizerLoad { rom: String, path: PathBuf, reason: String },
    /// The pattern-trigger assets for a ROM could not be loaded
    PatternLoad { rom: String, reason: String },
    /// A dump file could not be opened or written
    DumpIo { path: PathBuf, source: std::io::Error },
    /// Connecting to the display server failed
    NetworkConnect { addr: String, source: std::io::Error },
    /// Sending a frame to the display server failed
    NetworkWrite { reason: String },
    /// The producer submitted a frame larger than a ring slot can hold
    OversizeGeometry { width: u16, height: u16, depth: u8 },
    /// A sink cannot render this mode/geometry combination
    UnsupportedFrame { mode: &'static str, width: u16, height: u16 },
}

impl DmdError {
    pub fn config(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { option: option.into(), reason: reason.into() }
    }

    pub fn hardware_open(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HardwareOpen { device: device.into(), reason: reason.into() }
    }

    pub fn colorizer_load(
        rom: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ColorizerLoad { rom: rom.into(), path: path.into(), reason: reason.into() }
    }

    pub fn pattern_load(rom: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PatternLoad { rom: rom.into(), reason: reason.into() }
    }

    pub fn dump_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DumpIo { path: path.into(), source }
    }

    /// Short category slug, used as a stable prefix in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::HardwareOpen { .. } => "hardware_open",
            Self::ColorizerLoad { .. } => "colorizer_load",
            Self::PatternLoad { .. } => "pattern_load",
            Self::DumpIo { .. } => "dump_io",
            Self::NetworkConnect { .. } => "network_connect",
            Self::NetworkWrite { .. } => "network_write",
            Self::OversizeGeometry { .. } => "oversize_geometry",
            Self::UnsupportedFrame { .. } => "unsupported_frame",
        }
    }
}

impl std::fmt::Display for DmdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmdError::Config { option, reason } => {
                write!(f, "configuration error in '{}': {}", option, reason)
            }
            DmdError::HardwareOpen { device, reason } => {
                write!(f, "failed to open display '{}': {}", device, reason)
            }
            DmdError::ColorizerLoad { rom, path, reason } => {
                write!(
                    f,
                    "failed to load colorization for '{}' from {}: {}",
                    rom,
                    path.display(),
                    reason
                )
            }
            DmdError::PatternLoad { rom, reason } => {
                write!(f, "failed to load pattern triggers for '{}': {}", rom, reason)
            }
            DmdError::DumpIo { path, source } => {
                write!(f, "dump I/O error on {}: {}", path.display(), source)
            }
            DmdError::NetworkConnect { addr, source } => {
                write!(f, "failed to connect to display server {}: {}", addr, source)
            }
            DmdError::NetworkWrite { reason } => {
                write!(f, "display server send failed: {}", reason)
            }
            DmdError::OversizeGeometry { width, height, depth } => {
                write!(f, "frame {}x{} at depth {} exceeds slot capacity", width, height, depth)
            }
            DmdError::UnsupportedFrame { mode, width, height } => {
                write!(f, "unsupported {} frame at {}x{}", mode, width, height)
            }
        }
    }
}

impl std::error::Error for DmdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DumpIo { source, .. } => Some(source),
            Self::NetworkConnect { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<dmd_net::NetError> for DmdError {
    fn from(e: dmd_net::NetError) -> Self {
        match e {
            dmd_net::NetError::Connect { addr, source } => Self::NetworkConnect { addr, source },
            other => Self::NetworkWrite { reason: other.to_string() },
        }
    }
}

/// Result type alias using the engine error type.
pub type DmdResult<T> = Result<T, DmdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_stable() {
        let e = DmdError::hardware_open("/dev/ttyUSB0", "no such device");
        assert_eq!(e.category(), "hardware_open");
        assert!(e.to_string().contains("/dev/ttyUSB0"));
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error;
        let e = DmdError::dump_io("/tmp/mm_109c.raw", std::io::Error::other("disk full"));
        assert!(e.source().is_some());
    }
}

// SPDX-License-Identifier: MIT
//! # TCP Streaming Sink for Dot-Matrix Frames
//!
//! This crate carries frame records from a dmdcast producer to a remote
//! display server over a persistent TCP connection. Every non-colorized frame
//! is shipped as one packed little-endian packet: a two-byte stream header,
//! a fixed-size paths header carrying ROM and asset-directory context, and
//! the raw frame record.
//!
//! ## Architecture Overview
//!
//! - **Fixed wire layout**: every field is serialized explicitly, field by
//!   field, little-endian. No struct transmutes, so the layout is stable
//!   across compilers and releases.
//! - **Bounded channel**: callers hand finished packets to a
//!   `crossbeam-channel` with a small capacity; the producer path never
//!   blocks on the network.
//! - **Writer thread**: a single thread owns the `TcpStream` and drains the
//!   channel in order, so the server observes frames in producer call order.
//!
//! ## Failure Model
//!
//! A connect failure is reported synchronously from [`connect`]. A write
//! failure marks the publisher as disconnected and ends the writer thread;
//! subsequent sends return [`NetError::Disconnected`] and the caller decides
//! whether to log or reconnect. A full queue drops the frame being sent,
//! never an already-queued one.

use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Fixed capacity of the name field in the paths header (255 bytes + NUL).
pub const MAX_NAME_BYTES: usize = 256;
/// Fixed capacity of each path field in the paths header.
pub const MAX_PATH_BYTES: usize = 256;

/// Pixel payload capacity of a frame record (256x64 RGB888).
pub const WIRE_PIXEL_BYTES: usize = 256 * 64 * 3;
/// Primary segment/RGB-565 carrier capacity in 16-bit words.
pub const WIRE_SEG_WORDS: usize = 256 * 64;
/// Secondary segment bank capacity in 16-bit words.
pub const WIRE_SEG2_WORDS: usize = 128;

/// Serialized size of the fixed frame-record prelude (mode through tint).
pub const RECORD_PRELUDE_BYTES: usize = 13;
/// Serialized size of one complete frame record.
pub const FRAME_RECORD_BYTES: usize =
    RECORD_PRELUDE_BYTES + WIRE_PIXEL_BYTES + WIRE_SEG_WORDS * 2 + WIRE_SEG2_WORDS * 2;

/// Serialized size of the stream header.
pub const STREAM_HEADER_BYTES: usize = 2;
/// Serialized size of the paths header.
pub const PATHS_HEADER_BYTES: usize = MAX_NAME_BYTES + 2 * MAX_PATH_BYTES;
/// Serialized size of one complete packet.
pub const PACKET_BYTES: usize = STREAM_HEADER_BYTES + PATHS_HEADER_BYTES + FRAME_RECORD_BYTES;

/// Error type for connection setup and frame submission.
#[derive(Debug)]
pub enum NetError {
    /// TCP connect to the display server failed
    Connect { addr: String, source: std::io::Error },
    /// The writer thread observed a socket error and shut down
    Disconnected,
    /// The outgoing queue is full; the frame was dropped
    QueueFull,
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetError::Connect { addr, source } => {
                write!(f, "failed to connect to {}: {}", addr, source)
            }
            NetError::Disconnected => write!(f, "display server connection lost"),
            NetError::QueueFull => write!(f, "outgoing frame queue full, frame dropped"),
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetError::Connect { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Per-packet flags preceding the paths header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// The producer marked this frame for replay buffering
    pub buffered: bool,
    /// The server should drop its other clients before applying this frame.
    /// Set for exactly one packet after a ROM change.
    pub disconnect_others: bool,
}

/// ROM and asset-directory context, sent with every packet so a server that
/// joins mid-stream can orient itself.
#[derive(Debug, Clone, Copy)]
pub struct PathsContext<'a> {
    pub rom_name: &'a str,
    pub alt_color_path: &'a str,
    pub pattern_video_path: &'a str,
}

/// Borrowed view of one frame record, sized by the protocol constants so
/// serialization cannot fail at runtime.
pub struct WireFrame<'a> {
    pub mode: u8,
    pub layout: u8,
    pub depth: u8,
    pub width: u16,
    pub height: u16,
    pub has_pixels: bool,
    pub has_seg_a: bool,
    pub has_seg_b: bool,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub pixels: &'a [u8; WIRE_PIXEL_BYTES],
    pub seg_a: &'a [u16; WIRE_SEG_WORDS],
    pub seg_b: &'a [u16; WIRE_SEG2_WORDS],
}

fn put_fixed_str(out: &mut Vec<u8>, s: &str, capacity: usize) {
    let bytes = s.as_bytes();
    // Hard truncation to capacity - 1; the terminating NUL always fits.
    let len = bytes.len().min(capacity - 1);
    out.extend_from_slice(&bytes[..len]);
    out.resize(out.len() + (capacity - len), 0);
}

/// Serialize the stream header.
pub fn encode_stream_header(header: StreamHeader, out: &mut Vec<u8>) {
    out.push(header.buffered as u8);
    out.push(header.disconnect_others as u8);
}

/// Serialize the paths header with NUL-terminated fixed fields.
pub fn encode_paths(paths: &PathsContext<'_>, out: &mut Vec<u8>) {
    put_fixed_str(out, paths.rom_name, MAX_NAME_BYTES);
    put_fixed_str(out, paths.alt_color_path, MAX_PATH_BYTES);
    put_fixed_str(out, paths.pattern_video_path, MAX_PATH_BYTES);
}

/// Serialize one frame record. Always emits exactly [`FRAME_RECORD_BYTES`].
pub fn encode_frame(frame: &WireFrame<'_>, out: &mut Vec<u8>) {
    out.reserve(FRAME_RECORD_BYTES);
    out.push(frame.mode);
    out.push(frame.layout);
    out.push(frame.depth);
    out.extend_from_slice(&frame.width.to_le_bytes());
    out.extend_from_slice(&frame.height.to_le_bytes());
    out.push(frame.has_pixels as u8);
    out.push(frame.has_seg_a as u8);
    out.push(frame.has_seg_b as u8);
    out.push(frame.red);
    out.push(frame.green);
    out.push(frame.blue);
    out.extend_from_slice(frame.pixels.as_slice());
    for word in frame.seg_a.iter() {
        out.extend_from_slice(&word.to_le_bytes());
    }
    for word in frame.seg_b.iter() {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

/// Serialize one complete packet: stream header, paths header, frame record.
pub fn encode_packet(
    header: StreamHeader,
    paths: &PathsContext<'_>,
    frame: &WireFrame<'_>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(PACKET_BYTES);
    encode_stream_header(header, &mut out);
    encode_paths(paths, &mut out);
    encode_frame(frame, &mut out);
    debug_assert_eq!(out.len(), PACKET_BYTES);
    out
}

/// Connection parameters for the display server.
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub addr: String,
    pub port: u16,
    /// Packets queued toward the writer thread before sends start dropping.
    pub queue_capacity: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self { addr: "localhost".to_string(), port: 6789, queue_capacity: 8 }
    }
}

/// Handle for submitting packets to the writer thread.
///
/// Cloneable and cheap; all clones feed the same ordered queue.
#[derive(Clone)]
pub struct NetPublisher {
    tx: Sender<Vec<u8>>,
    connected: Arc<AtomicBool>,
}

impl NetPublisher {
    /// Queue a packet for transmission without blocking.
    pub fn send(&self, packet: Vec<u8>) -> Result<(), NetError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(NetError::Disconnected);
        }
        match self.tx.try_send(packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NetError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(NetError::Disconnected),
        }
    }

    /// Whether the writer thread still holds a healthy socket.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Connect to the display server and start the writer thread.
///
/// Returns the publisher handle and the writer's join handle. The thread ends
/// when every publisher clone is dropped or the socket fails.
pub fn connect(cfg: &NetConfig) -> Result<(NetPublisher, JoinHandle<()>), NetError> {
    let stream = TcpStream::connect((cfg.addr.as_str(), cfg.port)).map_err(|source| {
        NetError::Connect { addr: format!("{}:{}", cfg.addr, cfg.port), source }
    })?;
    // Frames are latency-sensitive; never batch them behind Nagle.
    let _ = stream.set_nodelay(true);

    let (tx, rx) = bounded(cfg.queue_capacity.max(1));
    let connected = Arc::new(AtomicBool::new(true));
    let writer_connected = Arc::clone(&connected);

    let handle = thread::Builder::new()
        .name("dmd-net-writer".to_string())
        .spawn(move || writer_loop(stream, rx, writer_connected))
        .map_err(|source| NetError::Connect {
            addr: format!("{}:{}", cfg.addr, cfg.port),
            source,
        })?;

    log::info!("connected to display server {}:{}", cfg.addr, cfg.port);
    Ok((NetPublisher { tx, connected }, handle))
}

fn writer_loop(mut stream: TcpStream, rx: Receiver<Vec<u8>>, connected: Arc<AtomicBool>) {
    for packet in rx.iter() {
        if let Err(e) = stream.write_all(&packet) {
            log::error!("display server write failed: {}", e);
            connected.store(false, Ordering::Release);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame<'a>(
        pixels: &'a [u8; WIRE_PIXEL_BYTES],
        seg_a: &'a [u16; WIRE_SEG_WORDS],
        seg_b: &'a [u16; WIRE_SEG2_WORDS],
    ) -> WireFrame<'a> {
        WireFrame {
            mode: 1,
            layout: 0,
            depth: 2,
            width: 128,
            height: 32,
            has_pixels: true,
            has_seg_a: false,
            has_seg_b: false,
            red: 255,
            green: 0,
            blue: 0,
            pixels,
            seg_a,
            seg_b,
        }
    }

    #[test]
    fn packet_has_fixed_size() {
        let pixels = Box::new([0u8; WIRE_PIXEL_BYTES]);
        let seg_a = Box::new([0u16; WIRE_SEG_WORDS]);
        let seg_b = [0u16; WIRE_SEG2_WORDS];
        let paths = PathsContext { rom_name: "mm_109c", alt_color_path: "", pattern_video_path: "" };
        let packet = encode_packet(
            StreamHeader { buffered: false, disconnect_others: false },
            &paths,
            &test_frame(&pixels, &seg_a, &seg_b),
        );
        assert_eq!(packet.len(), PACKET_BYTES);
    }

    #[test]
    fn stream_header_layout() {
        let mut out = Vec::new();
        encode_stream_header(StreamHeader { buffered: true, disconnect_others: false }, &mut out);
        assert_eq!(out, [1, 0]);
    }

    #[test]
    fn paths_are_nul_terminated_and_truncated() {
        let long = "x".repeat(400);
        let paths =
            PathsContext { rom_name: &long, alt_color_path: "/colors", pattern_video_path: "" };
        let mut out = Vec::new();
        encode_paths(&paths, &mut out);
        assert_eq!(out.len(), PATHS_HEADER_BYTES);
        // Hard truncation to capacity - 1 keeps room for the NUL.
        assert_eq!(out[MAX_NAME_BYTES - 2], b'x');
        assert_eq!(out[MAX_NAME_BYTES - 1], 0);
        assert_eq!(&out[MAX_NAME_BYTES..MAX_NAME_BYTES + 7], b"/colors");
        assert_eq!(out[MAX_NAME_BYTES + 7], 0);
    }

    #[test]
    fn record_prelude_is_little_endian() {
        let pixels = Box::new([0u8; WIRE_PIXEL_BYTES]);
        let mut seg_a = Box::new([0u16; WIRE_SEG_WORDS]);
        seg_a[0] = 0xBEEF;
        let seg_b = [0u16; WIRE_SEG2_WORDS];
        let mut out = Vec::new();
        encode_frame(&test_frame(&pixels, &seg_a, &seg_b), &mut out);
        assert_eq!(out.len(), FRAME_RECORD_BYTES);
        // width = 128 at offset 3, height = 32 at offset 5
        assert_eq!(&out[3..5], &[128, 0]);
        assert_eq!(&out[5..7], &[32, 0]);
        // seg_a words follow the pixel payload, little-endian
        let seg_off = RECORD_PRELUDE_BYTES + WIRE_PIXEL_BYTES;
        assert_eq!(&out[seg_off..seg_off + 2], &[0xEF, 0xBE]);
    }
}

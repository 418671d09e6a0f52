//! Dump sinks: file rotation by ROM name, hex text layout and raw record
//! framing.

mod common;

use std::time::Duration;

use common::wait_until;
use dmdcast::{DmdConfig, DmdEngine, Mode};

fn dump_config(dir: &str) -> DmdConfig {
    DmdConfig {
        alt_color: false,
        pattern_capture: false,
        hardware_display_enabled: false,
        secondary_display_enabled: false,
        dump_text: true,
        dump_raw: true,
        dump_path: dir.to_string(),
        ..Default::default()
    }
}

#[test]
fn dumps_rotate_by_rom_and_capture_every_frame() {
    let dir = tempfile::tempdir().expect("create dump dir");
    let engine = DmdEngine::new(dump_config(dir.path().to_str().unwrap()));

    engine.set_rom_name("gnr_300");
    // Two distinct depth-4 frames; depth 4 is exempt from transitional
    // suppression so both must appear in the text dump.
    let mut first = vec![0u8; 16 * 4];
    let mut second = vec![0u8; 16 * 4];
    for (i, v) in first.iter_mut().enumerate() {
        *v = (i % 16) as u8;
    }
    for v in second.iter_mut() {
        *v = 15;
    }
    engine.update_data(&first, 4, 16, 4, 255, 69, 0, Mode::Data, false).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    engine.update_data(&second, 4, 16, 4, 255, 69, 0, Mode::Data, false).unwrap();
    std::thread::sleep(Duration::from_millis(5));

    engine.set_rom_name("sttng_s7");
    engine.update_data(&first, 4, 16, 4, 255, 69, 0, Mode::Data, false).unwrap();

    let raw_a = dir.path().join("gnr_300.raw");
    let raw_b = dir.path().join("sttng_s7.raw");
    assert!(wait_until(Duration::from_secs(2), || raw_a.exists() && raw_b.exists()));
    // Drop flushes the text window.
    drop(engine);

    let text = std::fs::read_to_string(dir.path().join("gnr_300.txt")).unwrap();
    let entries: Vec<&str> = text.split("\n\n").filter(|e| !e.is_empty()).collect();
    assert_eq!(entries.len(), 2, "both frames dumped:\n{}", text);

    let first_entry: Vec<&str> = entries[0].lines().collect();
    assert!(first_entry[0].starts_with("0x"));
    assert_eq!(first_entry.len(), 1 + 4);
    assert_eq!(first_entry[1], "0123456789abcdef");
    assert_eq!(entries[1].lines().nth(1).unwrap(), "ffffffffffffffff");

    // Raw dump: one length-framed record per frame seen under that ROM.
    let raw = std::fs::read(raw_a).unwrap();
    let record_bytes = 8 + dmd_net::FRAME_RECORD_BYTES;
    assert_eq!(raw.len() % record_bytes, 0);
    assert_eq!(raw.len() / record_bytes, 2);
    let size = u32::from_le_bytes(raw[4..8].try_into().unwrap());
    assert_eq!(size as usize, dmd_net::FRAME_RECORD_BYTES);
}

#[test]
fn depth2_fade_intermediates_are_suppressed() {
    let dir = tempfile::tempdir().expect("create dump dir");
    let engine = DmdEngine::new(DmdConfig {
        dump_raw: false,
        ..dump_config(dir.path().to_str().unwrap())
    });

    engine.set_rom_name("fade_test");
    let steady = vec![3u8; 8];
    let mid = vec![2u8; 8];
    // Outer frames agree everywhere; the quick middle frame only deviates in
    // brightness, so it reads as a fade and is dropped.
    engine.update_data(&steady, 2, 8, 1, 255, 0, 0, Mode::Data, false).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    engine.update_data(&mid, 2, 8, 1, 255, 0, 0, Mode::Data, false).unwrap();
    engine.update_data(&steady, 2, 8, 1, 255, 0, 0, Mode::Data, false).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    drop(engine);

    let text = std::fs::read_to_string(dir.path().join("fade_test.txt")).unwrap();
    let entries: Vec<&str> = text.split("\n\n").filter(|e| !e.is_empty()).collect();
    assert_eq!(entries.len(), 2, "middle fade frame kept:\n{}", text);
    assert_eq!(entries[0].lines().nth(1).unwrap(), "33333333");
    assert_eq!(entries[1].lines().nth(1).unwrap(), "33333333");
}

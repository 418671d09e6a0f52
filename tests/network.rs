//! Wire-level behavior of the network forwarder: packet layout, buffered
//! replay flags and the disconnect-others latch across ROM changes.

mod common;

use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use dmd_net::{MAX_NAME_BYTES, PACKET_BYTES, STREAM_HEADER_BYTES};
use dmdcast::{DmdConfig, DmdEngine, Mode};

struct Capture {
    listener: TcpListener,
    port: u16,
}

impl Capture {
    fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind capture listener");
        let port = listener.local_addr().unwrap().port();
        Self { listener, port }
    }

    /// Accept one connection and drain it to EOF on a background thread.
    fn drain(self) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let (mut socket, _) = self.listener.accept().expect("accept engine connection");
            let mut bytes = Vec::new();
            socket.read_to_end(&mut bytes).expect("drain engine stream");
            bytes
        })
    }
}

fn network_config(port: u16) -> DmdConfig {
    DmdConfig {
        alt_color: false,
        pattern_capture: false,
        hardware_display_enabled: false,
        secondary_display_enabled: false,
        network_enabled: true,
        network_addr: "127.0.0.1".to_string(),
        network_port: port,
        ..Default::default()
    }
}

fn packets(bytes: &[u8]) -> Vec<&[u8]> {
    assert_eq!(bytes.len() % PACKET_BYTES, 0, "stream is not packet aligned");
    bytes.chunks_exact(PACKET_BYTES).collect()
}

fn rom_name(packet: &[u8]) -> &str {
    let field = &packet[STREAM_HEADER_BYTES..STREAM_HEADER_BYTES + MAX_NAME_BYTES];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end]).unwrap()
}

#[test]
fn buffered_replay_is_sent_twice_with_cleared_flag() {
    let capture = Capture::bind();
    let port = capture.port;
    let reader = capture.drain();

    let engine = DmdEngine::new(network_config(port));
    engine.set_rom_name("taf_l7");

    let frame: Vec<u8> = (0..128u32 * 32).map(|v| (v % 4) as u8).collect();
    engine.update_data(&frame, 2, 128, 32, 255, 0, 0, Mode::Data, true).unwrap();
    thread::sleep(Duration::from_millis(10));
    engine.queue_last_buffered();
    thread::sleep(Duration::from_millis(10));
    drop(engine);

    let bytes = reader.join().unwrap();
    let packets = packets(&bytes);
    assert_eq!(packets.len(), 2);

    // First send is marked buffered, the replay is not.
    assert_eq!(packets[0][0], 1);
    assert_eq!(packets[1][0], 0);
    // Identical frame records on the wire.
    let record_off = PACKET_BYTES - dmd_net::FRAME_RECORD_BYTES;
    assert_eq!(packets[0][record_off..], packets[1][record_off..]);
    assert_eq!(rom_name(packets[0]), "taf_l7");
}

#[test]
fn disconnect_others_fires_once_per_rom_change() {
    let capture = Capture::bind();
    let port = capture.port;
    let reader = capture.drain();

    let engine = DmdEngine::new(network_config(port));
    let frame = vec![0u8; 128 * 32];

    engine.set_rom_name("X");
    for _ in 0..10 {
        engine.update_data(&frame, 2, 128, 32, 255, 255, 255, Mode::Data, false).unwrap();
        thread::sleep(Duration::from_millis(3));
    }
    engine.set_rom_name("Y");
    for _ in 0..3 {
        engine.update_data(&frame, 2, 128, 32, 255, 255, 255, Mode::Data, false).unwrap();
        thread::sleep(Duration::from_millis(3));
    }
    drop(engine);

    let bytes = reader.join().unwrap();
    let packets = packets(&bytes);
    assert_eq!(packets.len(), 13);

    let flags: Vec<u8> = packets.iter().map(|p| p[1]).collect();
    // The first packet after each rename carries the flag, all others are
    // clear until the next rename.
    assert_eq!(flags[0], 1);
    assert!(flags[1..10].iter().all(|&f| f == 0));
    assert_eq!(flags[10], 1);
    assert!(flags[11..].iter().all(|&f| f == 0));

    assert_eq!(rom_name(packets[0]), "X");
    assert_eq!(rom_name(packets[9]), "X");
    assert_eq!(rom_name(packets[10]), "Y");
    assert_eq!(rom_name(packets[12]), "Y");
}

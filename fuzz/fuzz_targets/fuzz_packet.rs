#![no_main]

use libfuzzer_sys::fuzz_target;
use rcon_supervisor::Packet;

fuzz_target!(|data: &[u8]| {
    // Packet parsing must never panic on arbitrary bytes
    let _ = Packet::from_bytes(data);
});

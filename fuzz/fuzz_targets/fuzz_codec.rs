#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use rcon_supervisor::RconCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Feed the stream one byte at a time, the worst case for partial frames
    let mut codec = RconCodec::new(64 * 1024);
    let mut buf = BytesMut::new();
    for byte in data {
        buf.extend_from_slice(std::slice::from_ref(byte));
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});

//! Integration tests for the headless transport over a real Unix socket
//!
//! The test plays the host: it listens under the temp directory, sends the
//! initial size and drives the engine side through `HeadlessPipe`.
//!
//! Run with: cargo test --test ipc_integration_tests

use flare_engine::flare::frame::FrameSink;
use flare_engine::flare::ipc::{
    socket_path, Decoded, HeadlessEvent, HeadlessPipe, Message, MessageDecoder, MessageType,
};
use flare_engine::glam::IVec2;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread;
use std::time::Duration;

fn read_messages(stream: &mut UnixStream, count: usize) -> Vec<Message> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut decoder = MessageDecoder::new();
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    while out.len() < count {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "engine closed the socket early");
        decoder.push(&chunk[..n]);
        while let Some(decoded) = decoder.next_message() {
            if let Decoded::Message(m) = decoded {
                out.push(m);
            }
        }
    }
    out
}

#[test]
fn test_integration_connect_push_and_close() {
    let name = format!("flare-ipc-test-{}", std::process::id());
    let path = socket_path(&name);
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();

    let host = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&Message::resize(IVec2::new(2, 2)).encode().unwrap()).unwrap();
        stream.write_all(&Message::empty(MessageType::UnlockFrame).encode().unwrap()).unwrap();

        let received = read_messages(&mut stream, 4);
        let types: Vec<MessageType> = received.iter().map(|m| m.ty).collect();
        assert_eq!(types, vec![
            MessageType::UpdateData,
            MessageType::PushFrame,
            MessageType::FrameData,
            MessageType::Close,
        ]);
        assert_eq!(received[1].len(), 2 * 2 * 4);
    });

    let pipe = HeadlessPipe::connect(&name).unwrap();
    assert_eq!(pipe.size(), (2, 2));

    pipe.push_frame(2, 2, vec![255; 16]).unwrap();

    // Wait until the unlock has arrived before updating
    let mut events = Vec::new();
    for _ in 0..100 {
        events.extend(pipe.poll());
        if events.contains(&HeadlessEvent::UnlockFrame) {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(events.contains(&HeadlessEvent::UnlockFrame));

    pipe.update();
    drop(pipe);

    host.join().unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_integration_connect_without_host_fails() {
    let result = HeadlessPipe::connect("flare-ipc-no-such-host");
    assert!(result.is_err());
}

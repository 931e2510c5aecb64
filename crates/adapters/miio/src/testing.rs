//! A fake miio device on a loopback UDP socket.
//!
//! It answers the hello, checks checksums and decrypts requests with its
//! token, and records every method call.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use tokio::net::UdpSocket;

use crate::cipher::MiioCipher;
use crate::packet::{self, HEADER_LEN, Header};

pub const TOKEN_HEX: &str = "00112233445566778899aabbccddeeff";
pub const DEVICE_ID: u32 = 0x0bad_cafe;
pub const DEVICE_STAMP: u32 = 4000;

#[derive(Default)]
struct State {
    calls: Mutex<Vec<(String, Value)>>,
    stamps: Mutex<Vec<u32>>,
    hellos: AtomicUsize,
    failures: Mutex<VecDeque<(i64, String)>>,
}

/// Handle on a running fake device. The task stops with the test runtime.
#[derive(Clone)]
pub struct FakeMiio {
    addr: SocketAddr,
    state: Arc<State>,
}

impl FakeMiio {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("bind fake miio socket");
        let addr = socket.local_addr().expect("fake miio address");
        let state = Arc::new(State::default());
        tokio::spawn(serve(socket, Arc::clone(&state)));
        Self { addr, state }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// `(method, params)` of every accepted request.
    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.state.calls).clone()
    }

    pub fn stamps(&self) -> Vec<u32> {
        lock(&self.state.stamps).clone()
    }

    pub fn hellos(&self) -> usize {
        self.state.hellos.load(Ordering::SeqCst)
    }

    /// Answer the next request with an `error` object.
    pub fn fail_next(&self, code: i64, message: &str) {
        lock(&self.state.failures).push_back((code, message.to_string()));
    }
}

fn token() -> [u8; 16] {
    let mut token = [0u8; 16];
    hex::decode_to_slice(TOKEN_HEX, &mut token).expect("valid fake token");
    token
}

async fn serve(socket: UdpSocket, state: Arc<State>) {
    let token = token();
    let cipher = MiioCipher::new(&token);
    let mut buf = vec![0u8; 4096];
    loop {
        let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
            return;
        };
        if let Some(reply) = handle(&state, &token, &cipher, &buf[..len]) {
            let _ = socket.send_to(&reply, peer).await;
        }
    }
}

fn handle(state: &State, token: &[u8; 16], cipher: &MiioCipher, request: &[u8]) -> Option<Vec<u8>> {
    if request == packet::hello_packet() {
        state.hellos.fetch_add(1, Ordering::SeqCst);
        let mut reply = packet::hello_packet();
        reply[4..8].fill(0);
        reply[8..12].copy_from_slice(&DEVICE_ID.to_be_bytes());
        reply[12..16].copy_from_slice(&DEVICE_STAMP.to_be_bytes());
        return Some(reply.to_vec());
    }

    let header = packet::parse_header(request).ok()?;
    let device = Header {
        device_id: DEVICE_ID,
        stamp: DEVICE_STAMP,
    };
    if !packet::verify_checksum(token, request) {
        let body = json!({ "id": 0, "error": { "code": -1, "message": "bad checksum" } });
        return Some(packet::encode(token, cipher, device, body.to_string().as_bytes()));
    }
    let plain = cipher.decrypt(&request[HEADER_LEN..]).ok()?;
    let call: Value = serde_json::from_slice(&plain).ok()?;
    let id = call["id"].clone();
    let method = call["method"].as_str().unwrap_or_default().to_string();

    lock(&state.stamps).push(header.stamp);
    let body = if let Some((code, message)) = lock(&state.failures).pop_front() {
        json!({ "id": id, "error": { "code": code, "message": message } })
    } else {
        lock(&state.calls).push((method, call["params"].clone()));
        json!({ "id": id, "result": ["ok"] })
    };
    Some(packet::encode(token, cipher, device, body.to_string().as_bytes()))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

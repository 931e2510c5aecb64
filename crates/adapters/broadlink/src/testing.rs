//! A fake Broadlink blaster on a loopback UDP socket.
//!
//! It answers hello, auth and `0x6a` control packets, decrypting requests the
//! way a real device does, and records what it was asked to transmit.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::UdpSocket;

use crate::packet::{self, CMD_AUTH, CMD_CONTROL, CMD_HELLO, DEFAULT_KEY, HEADER_LEN};

pub const DEVTYPE: u16 = 0x2737;
pub const MAC: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
const DEVICE_ID: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];
const SESSION_KEY: [u8; 16] = *b"fake-session-key";
/// "Nothing learned yet".
const ERR_NO_DATA: i16 = -7;

#[derive(Default)]
struct State {
    sent: Mutex<Vec<Vec<u8>>>,
    counters: Mutex<Vec<u16>>,
    auths: AtomicUsize,
    failures: Mutex<VecDeque<i16>>,
    learned: Mutex<Option<(usize, Vec<u8>)>>,
}

/// Handle on a running fake device. The task stops with the test runtime.
#[derive(Clone)]
pub struct FakeBroadlink {
    addr: SocketAddr,
    state: Arc<State>,
}

impl FakeBroadlink {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("bind fake Broadlink socket");
        let addr = socket.local_addr().expect("fake Broadlink address");
        let state = Arc::new(State::default());
        tokio::spawn(serve(socket, Arc::clone(&state)));
        Self { addr, state }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Transmitted IR codes as hex, zero padding stripped.
    pub fn sent_codes(&self) -> Vec<String> {
        lock(&self.state.sent)
            .iter()
            .map(|code| {
                let end = code.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                hex::encode(&code[..end])
            })
            .collect()
    }

    /// Packet counters of every auth and control packet received.
    pub fn counters(&self) -> Vec<u16> {
        lock(&self.state.counters).clone()
    }

    pub fn auths(&self) -> usize {
        self.state.auths.load(Ordering::SeqCst)
    }

    /// Answer the next auth or control packet with `code`.
    pub fn fail_next(&self, code: i16) {
        lock(&self.state.failures).push_back(code);
    }

    /// Report `code` as captured after `empty_polls` unsuccessful polls.
    pub fn learn_after(&self, empty_polls: usize, code: &str) {
        let code = hex::decode(code).expect("hex IR code");
        *lock(&self.state.learned) = Some((empty_polls, code));
    }
}

async fn serve(socket: UdpSocket, state: Arc<State>) {
    let mut buf = vec![0u8; 2048];
    loop {
        let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
            return;
        };
        if let Some(reply) = handle(&state, &buf[..len]) {
            let _ = socket.send_to(&reply, peer).await;
        }
    }
}

fn handle(state: &State, request: &[u8]) -> Option<Vec<u8>> {
    if request.len() == packet::DISCOVERY_LEN && u16::from(request[0x26]) == CMD_HELLO {
        let mut reply = vec![0u8; 0x80];
        reply[..8].copy_from_slice(&packet::MAGIC);
        reply[0x34..0x36].copy_from_slice(&DEVTYPE.to_le_bytes());
        reply[0x3a..0x40].copy_from_slice(&MAC);
        return Some(reply);
    }
    if request.len() < HEADER_LEN {
        return None;
    }

    let command = u16::from_le_bytes([request[0x26], request[0x27]]);
    lock(&state.counters).push(u16::from_le_bytes([request[0x28], request[0x29]]));
    if command == CMD_AUTH {
        state.auths.fetch_add(1, Ordering::SeqCst);
    }
    if let Some(code) = lock(&state.failures).pop_front() {
        return Some(reply(command, code, &[], &DEFAULT_KEY));
    }

    match command {
        CMD_AUTH => {
            let mut payload = vec![0u8; 0x20];
            payload[..4].copy_from_slice(&DEVICE_ID);
            payload[0x04..0x14].copy_from_slice(&SESSION_KEY);
            Some(reply(command, 0, &payload, &DEFAULT_KEY))
        }
        CMD_CONTROL => {
            if request[0x30..0x34] != DEVICE_ID || request[0x2a..0x30] != MAC {
                return Some(reply(command, -1, &[], &SESSION_KEY));
            }
            let plain = packet::decrypt(&SESSION_KEY, &request[HEADER_LEN..]).ok()?;
            let expected = u16::from_le_bytes([request[0x34], request[0x35]]);
            if packet::checksum(&plain) != expected {
                return Some(reply(command, -5, &[], &SESSION_KEY));
            }
            Some(control(state, command, &plain))
        }
        _ => Some(reply(command, -3, &[], &DEFAULT_KEY)),
    }
}

fn control(state: &State, command: u16, plain: &[u8]) -> Vec<u8> {
    match plain.first() {
        Some(0x02) => {
            lock(&state.sent).push(plain[4..].to_vec());
            reply(command, 0, &[0u8; 4], &SESSION_KEY)
        }
        Some(0x04) => {
            let mut learned = lock(&state.learned);
            match learned.as_mut() {
                Some((0, code)) => {
                    let mut payload = vec![0x04, 0, 0, 0];
                    payload.extend_from_slice(code);
                    reply(command, 0, &payload, &SESSION_KEY)
                }
                Some((polls, _)) => {
                    *polls -= 1;
                    reply(command, ERR_NO_DATA, &[], &SESSION_KEY)
                }
                None => reply(command, ERR_NO_DATA, &[], &SESSION_KEY),
            }
        }
        _ => reply(command, 0, &[0u8; 4], &SESSION_KEY),
    }
}

fn reply(command: u16, code: i16, payload: &[u8], key: &[u8; 16]) -> Vec<u8> {
    let mut packet = vec![0u8; HEADER_LEN];
    packet[..8].copy_from_slice(&packet::MAGIC);
    packet[0x22..0x24].copy_from_slice(&code.to_le_bytes());
    packet[0x24..0x26].copy_from_slice(&DEVTYPE.to_le_bytes());
    packet[0x26..0x28].copy_from_slice(&(command + 0x3e8).to_le_bytes());
    packet.extend_from_slice(&packet::encrypt(key, payload));
    packet::seal(&mut packet);
    packet
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

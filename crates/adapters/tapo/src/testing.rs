//! A fake Tapo device served by wiremock.
//!
//! It speaks the handshake, `login_device` and `securePassthrough` exchange,
//! keeps a `device_on` flag, and records every decrypted inner request.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::cipher::TapoCipher;

pub const HANDSHAKE_TOKEN: &str = "handshake-token";
pub const SESSION_TOKEN: &str = "session-token";
const COOKIE: &str = "TP_SESSIONID=4F3C2A";

#[derive(Default)]
struct State {
    device_on: Mutex<bool>,
    requests: Mutex<Vec<Value>>,
    handshakes: AtomicUsize,
    failures: Mutex<VecDeque<i64>>,
}

/// Handle on a running fake device.
#[derive(Clone, Default)]
pub struct FakeTapoDevice {
    state: Arc<State>,
}

impl FakeTapoDevice {
    /// Start a mock server answering on `POST /app`.
    pub async fn start() -> (MockServer, Self) {
        let server = MockServer::start().await;
        let device = Self::default();
        Mock::given(method("POST"))
            .and(path("/app"))
            .respond_with(device.clone())
            .mount(&server)
            .await;
        (server, device)
    }

    /// Decrypted inner requests in arrival order, handshakes excluded.
    pub fn requests(&self) -> Vec<Value> {
        lock(&self.state.requests).clone()
    }

    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    pub fn is_on(&self) -> bool {
        *lock(&self.state.device_on)
    }

    /// Answer the next passthrough call with `code` instead of handling it.
    pub fn fail_next(&self, code: i64) {
        lock(&self.state.failures).push_back(code);
    }

    fn passthrough(&self, request: &Request, body: &Value) -> ResponseTemplate {
        let token = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned());
        let Some(token) = token else {
            return error(-1501);
        };
        let cookie_ok = request
            .headers
            .get("cookie")
            .and_then(|value| value.to_str().ok())
            == Some(COOKIE);
        if !cookie_ok || (token != HANDSHAKE_TOKEN && token != SESSION_TOKEN) {
            return error(9999);
        }

        let cipher = TapoCipher::from_token(&token);
        let inner = body["params"]["request"]
            .as_str()
            .and_then(|encoded| cipher.decrypt(encoded).ok())
            .and_then(|plain| serde_json::from_slice::<Value>(&plain).ok());
        let Some(inner) = inner else {
            return error(-1010);
        };
        lock(&self.state.requests).push(inner.clone());

        if let Some(code) = lock(&self.state.failures).pop_front() {
            return error(code);
        }

        let result = match (inner["method"].as_str(), token.as_str()) {
            (Some("login_device"), HANDSHAKE_TOKEN) => json!({ "token": SESSION_TOKEN }),
            (Some("set_device_info"), SESSION_TOKEN) => {
                if let Some(on) = inner["params"]["device_on"].as_bool() {
                    *lock(&self.state.device_on) = on;
                }
                json!({})
            }
            (Some("get_device_info"), SESSION_TOKEN) => json!({
                "device_on": self.is_on(),
                "model": "L530",
            }),
            (Some(_), _) => return error(-1501),
            (None, _) => return error(-1003),
        };

        let reply = json!({ "error_code": 0, "result": result }).to_string();
        ResponseTemplate::new(200).set_body_json(json!({
            "error_code": 0,
            "result": { "response": cipher.encrypt(reply.as_bytes()) },
        }))
    }
}

impl Respond for FakeTapoDevice {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return error(-1003);
        };
        match body["method"].as_str() {
            Some("handshake") => {
                self.state.handshakes.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", format!("{COOKIE};TIMEOUT=1440").as_str())
                    .set_body_json(json!({
                        "error_code": 0,
                        "result": { "key": HANDSHAKE_TOKEN },
                    }))
            }
            Some("securePassthrough") => self.passthrough(request, &body),
            _ => error(-1002),
        }
    }
}

fn error(code: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "error_code": code }))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

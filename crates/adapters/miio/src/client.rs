//! Miio protocol client.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::cipher::MiioCipher;
use crate::error::MiioError;
use crate::packet::{self, Header};

pub const DEFAULT_PORT: u16 = 54321;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_DATAGRAM: usize = 4096;

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug)]
struct Session {
    device_id: u32,
    device_stamp: u32,
    discovered: Instant,
    last_stamp: u32,
}

impl Session {
    /// Device stamp plus elapsed seconds, never repeating.
    fn next_stamp(&mut self) -> u32 {
        let elapsed = u32::try_from(self.discovered.elapsed().as_secs()).unwrap_or(u32::MAX);
        let stamp = self
            .device_stamp
            .saturating_add(elapsed)
            .max(self.last_stamp.saturating_add(1));
        self.last_stamp = stamp;
        stamp
    }
}

#[derive(Debug, Default)]
struct State {
    session: Option<Session>,
    request_id: u32,
}

/// Client for one miio device. Discovery runs before the first command.
pub struct MiioClient {
    target: String,
    token: [u8; 16],
    cipher: MiioCipher,
    timeout: Duration,
    state: Mutex<State>,
}

impl std::fmt::Debug for MiioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiioClient")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl MiioClient {
    /// Build a client for `address` (port 54321 by default) using the
    /// 32-hex-character device token.
    ///
    /// # Errors
    ///
    /// Returns [`MiioError::InvalidToken`] or [`MiioError::InvalidAddress`].
    pub fn new(address: &str, token: &str) -> Result<Self, MiioError> {
        let token: [u8; 16] = hex::decode(token.trim())
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(MiioError::InvalidToken)?;

        let address = address.trim();
        if address.is_empty() {
            return Err(MiioError::InvalidAddress(address.to_string()));
        }
        let target = if let Ok(ip) = address.parse::<IpAddr>() {
            SocketAddr::new(ip, DEFAULT_PORT).to_string()
        } else if address
            .rsplit_once(':')
            .is_some_and(|(_, port)| port.parse::<u16>().is_ok())
        {
            address.to_string()
        } else {
            format!("{address}:{DEFAULT_PORT}")
        };

        Ok(Self {
            target,
            cipher: MiioCipher::new(&token),
            token,
            timeout: DEFAULT_TIMEOUT,
            state: Mutex::new(State::default()),
        })
    }

    /// Override the per-datagram deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Device id learned by the last hello, if any.
    pub async fn device_id(&self) -> Option<u32> {
        self.state
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| session.device_id)
    }

    /// Send the hello datagram and remember the device id and stamp.
    ///
    /// # Errors
    ///
    /// Returns [`MiioError::Timeout`] or [`MiioError::Malformed`] when the
    /// device does not answer properly.
    pub async fn discover(&self) -> Result<(), MiioError> {
        let mut state = self.state.lock().await;
        state.session = Some(self.hello().await?);
        Ok(())
    }

    /// Call `method` with `params` and return the reply's `result`.
    ///
    /// # Errors
    ///
    /// Returns [`MiioError::Device`] when the reply carries an `error`, or
    /// the transport error of the exchange.
    #[tracing::instrument(skip(self, params), fields(addr = %self.target))]
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, MiioError> {
        let mut state = self.state.lock().await;
        let mut session = match state.session.take() {
            Some(session) => session,
            None => self.hello().await?,
        };
        state.request_id = state.request_id.wrapping_add(1);
        let id = state.request_id;

        let params = if params.is_null() { json!([]) } else { params };
        let request = json!({ "id": id, "method": method, "params": params });
        let header = Header {
            device_id: session.device_id,
            stamp: session.next_stamp(),
        };
        let packet = packet::encode(
            &self.token,
            &self.cipher,
            header,
            request.to_string().as_bytes(),
        );

        let result = self.exchange(&packet).await;
        if !matches!(result, Err(MiioError::Timeout(_))) {
            state.session = Some(session);
        }
        let (_, plain) = packet::decode(&self.token, &self.cipher, &result?)
            .inspect_err(|_| state.session = None)?;

        let reply: Reply = serde_json::from_slice(&plain).map_err(MiioError::Json)?;
        if reply.id != u64::from(id) {
            return Err(MiioError::UnexpectedId {
                expected: id,
                got: reply.id,
            });
        }
        if let Some(error) = reply.error.filter(|error| !error.is_null()) {
            return Err(MiioError::Device {
                method: method.to_string(),
                code: error.get("code").and_then(Value::as_i64),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), str::to_string),
            });
        }
        tracing::debug!(%method, "command acknowledged");
        Ok(reply.result)
    }

    async fn hello(&self) -> Result<Session, MiioError> {
        let reply = self.exchange(&packet::hello_packet()).await?;
        let header = packet::parse_header(&reply)?;
        tracing::debug!(addr = %self.target, device_id = header.device_id, "hello answered");
        Ok(Session {
            device_id: header.device_id,
            device_stamp: header.stamp,
            discovered: Instant::now(),
            last_stamp: 0,
        })
    }

    /// One fresh socket per exchange.
    async fn exchange(&self, packet: &[u8]) -> Result<Vec<u8>, MiioError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect(self.target.as_str()).await?;
        tokio::time::timeout(self.timeout, socket.send(packet))
            .await
            .map_err(|_| MiioError::Timeout(self.timeout))??;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| MiioError::Timeout(self.timeout))??;
        buf.truncate(len);
        Ok(buf)
    }
}

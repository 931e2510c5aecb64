//! Broadlink device client.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use hearth_app::ports::IrControllable;
use hearth_domain::error::HubError;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::BroadlinkError;
use crate::packet::{self, CMD_AUTH, CMD_CONTROL, DEFAULT_KEY, DeviceInfo, Frame};

pub const DEFAULT_PORT: u16 = 80;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const LEARN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_DATAGRAM: usize = 2048;

const IR_SEND: u8 = 0x02;
const IR_ENTER_LEARNING: u8 = 0x03;
const IR_CHECK_DATA: u8 = 0x04;

#[derive(Debug)]
struct Session {
    device: DeviceInfo,
    id: [u8; 4],
    key: [u8; 16],
}

#[derive(Debug, Default)]
struct State {
    count: u16,
    session: Option<Session>,
}

impl State {
    fn next_count(&mut self) -> u16 {
        self.count = self.count.wrapping_add(1);
        self.count
    }
}

/// Client for one Broadlink blaster.
///
/// The first command says hello to the configured address, authenticates,
/// and keeps the session key. The packet counter grows across sessions.
#[derive(Debug)]
pub struct BroadlinkClient {
    target: String,
    timeout: Duration,
    state: Mutex<State>,
}

impl BroadlinkClient {
    /// Build a client for `address` (`host` or `host:port`, port 80 by
    /// default). No packet is sent until the first command.
    ///
    /// # Errors
    ///
    /// Returns [`BroadlinkError::InvalidAddress`] for an empty address.
    pub fn new(address: &str) -> Result<Self, BroadlinkError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(BroadlinkError::InvalidAddress(address.to_string()));
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

    /// Broadcast a hello on port 80 and return the first device that answers.
    ///
    /// # Errors
    ///
    /// Returns [`BroadlinkError::Timeout`] if nothing answers in time.
    #[tracing::instrument]
    pub async fn discover(timeout: Duration) -> Result<DeviceInfo, BroadlinkError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        let hello = packet::discovery_packet(socket.local_addr()?, &chrono::Local::now());
        socket
            .send_to(&hello, (Ipv4Addr::BROADCAST, DEFAULT_PORT))
            .await?;

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
                .await
                .map_err(|_| BroadlinkError::Timeout(timeout))??;
            match packet::parse_discovery(&buf[..len], from) {
                Ok(device) => {
                    tracing::info!(%device, "discovered Broadlink device");
                    return Ok(device);
                }
                Err(err) => tracing::debug!(%from, error = %err, "ignoring reply"),
            }
        }
    }

    /// Say hello to one known address.
    ///
    /// # Errors
    ///
    /// Returns [`BroadlinkError::Timeout`] or [`BroadlinkError::ShortReply`]
    /// when the device does not answer properly.
    pub async fn discover_at(
        target: impl ToSocketAddrs,
        timeout: Duration,
    ) -> Result<DeviceInfo, BroadlinkError> {
        let socket = connect(target).await?;
        let hello = packet::discovery_packet(socket.local_addr()?, &chrono::Local::now());
        let reply = exchange(&socket, &hello, timeout).await?;
        packet::parse_discovery(&reply, socket.peer_addr()?)
    }

    /// Say hello and authenticate, replacing any existing session.
    ///
    /// # Errors
    ///
    /// Returns [`BroadlinkError::Auth`] when the device refuses, or the
    /// transport error of either exchange.
    pub async fn auth(&self) -> Result<(), BroadlinkError> {
        let mut state = self.state.lock().await;
        state.session = None;
        let session = self.open_session(&mut state).await?;
        state.session = Some(session);
        Ok(())
    }

    /// Transmit a hex-encoded IR code.
    ///
    /// # Errors
    ///
    /// Returns [`BroadlinkError::InvalidCode`] before any packet is sent if
    /// `code` is not hex.
    pub async fn send_ir(&self, code: &str) -> Result<(), BroadlinkError> {
        let data = hex::decode(code.trim()).map_err(BroadlinkError::InvalidCode)?;
        let mut payload = vec![IR_SEND, 0, 0, 0];
        payload.extend_from_slice(&data);
        self.control(&payload).await?;
        Ok(())
    }

    /// Enter learning mode and poll once a second until a code is captured.
    ///
    /// # Errors
    ///
    /// Returns [`BroadlinkError::LearnTimeout`] if nothing is captured before
    /// `timeout` elapses.
    #[tracing::instrument(skip(self), fields(addr = %self.target))]
    pub async fn learn_ir(&self, timeout: Duration) -> Result<String, BroadlinkError> {
        self.control(&[IR_ENTER_LEARNING, 0, 0, 0]).await?;
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            tokio::time::sleep(LEARN_POLL_INTERVAL).await;
            match self.control(&[IR_CHECK_DATA, 0, 0, 0]).await {
                Ok(payload) => {
                    let code = captured_code(&payload);
                    if !code.is_empty() {
                        tracing::info!(bytes = code.len(), "IR code captured");
                        return Ok(hex::encode(code));
                    }
                }
                Err(BroadlinkError::Device { .. } | BroadlinkError::Timeout(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Err(BroadlinkError::LearnTimeout(timeout))
    }

    /// Send a `0x6a` payload, authenticating first if needed, and return the
    /// decrypted reply payload.
    async fn control(&self, payload: &[u8]) -> Result<Vec<u8>, BroadlinkError> {
        let mut state = self.state.lock().await;
        let session = match state.session.take() {
            Some(session) => session,
            None => self.open_session(&mut state).await?,
        };
        let count = state.next_count();
        let result = self.send_control(&session, count, payload).await;
        state.session = Some(session);
        result
    }

    async fn send_control(
        &self,
        session: &Session,
        count: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>, BroadlinkError> {
        let frame = Frame {
            devtype: session.device.devtype,
            command: CMD_CONTROL,
            count,
            mac: session.device.mac,
            id: session.id,
            payload,
        };
        let socket = connect(session.device.addr).await?;
        let reply = exchange(&socket, &frame.encode(&session.key), self.timeout).await?;
        packet::open_reply(CMD_CONTROL, &reply, &session.key)
    }

    async fn open_session(&self, state: &mut State) -> Result<Session, BroadlinkError> {
        let device = Self::discover_at(self.target.as_str(), self.timeout).await?;
        tracing::debug!(%device, "hello answered, authenticating");

        let mut payload = [0u8; 0x50];
        payload[0x04..0x14].fill(0x31);
        payload[0x1e] = 0x01;
        payload[0x2d] = 0x01;
        payload[0x30..0x36].copy_from_slice(b"hearth");

        let frame = Frame {
            devtype: device.devtype,
            command: CMD_AUTH,
            count: state.next_count(),
            mac: device.mac,
            id: [0; 4],
            payload: &payload,
        };
        let socket = connect(device.addr).await?;
        let reply = exchange(&socket, &frame.encode(&DEFAULT_KEY), self.timeout).await?;
        let plain = packet::open_reply(CMD_AUTH, &reply, &DEFAULT_KEY).map_err(|err| match err {
            BroadlinkError::Device { .. } => BroadlinkError::Auth(Box::new(err)),
            other => other,
        })?;
        if plain.len() < 0x14 {
            return Err(BroadlinkError::ShortReply {
                len: plain.len(),
                min: 0x14,
            });
        }

        let mut id = [0u8; 4];
        id.copy_from_slice(&plain[..4]);
        let mut key = [0u8; 16];
        key.copy_from_slice(&plain[0x04..0x14]);
        tracing::info!(%device, "authenticated with Broadlink device");
        Ok(Session { device, id, key })
    }
}

/// One fresh socket per exchange, connected to the device.
async fn connect(target: impl ToSocketAddrs) -> Result<UdpSocket, BroadlinkError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(target).await?;
    Ok(socket)
}

async fn exchange(
    socket: &UdpSocket,
    packet: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, BroadlinkError> {
    tokio::time::timeout(timeout, socket.send(packet))
        .await
        .map_err(|_| BroadlinkError::Timeout(timeout))??;
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let len = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| BroadlinkError::Timeout(timeout))??;
    buf.truncate(len);
    Ok(buf)
}

/// IR bytes of a check-data reply: the 4-byte header skipped and the
/// trailing cipher-block zero padding removed.
fn captured_code(payload: &[u8]) -> &[u8] {
    let data = payload.get(4..).unwrap_or_default();
    let end = data.iter().rposition(|b| *b != 0).map_or(0, |last| last + 1);
    &data[..end]
}

impl IrControllable for BroadlinkClient {
    async fn send_ir(&self, code: &str) -> Result<(), HubError> {
        Ok(BroadlinkClient::send_ir(self, code).await?)
    }

    async fn learn_ir(&self, timeout: Duration) -> Result<String, HubError> {
        Ok(BroadlinkClient::learn_ir(self, timeout).await?)
    }
}

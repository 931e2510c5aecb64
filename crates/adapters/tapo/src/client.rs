//! Tapo device client.
//!
//! A session is a handshake token plus the cookie the device hands out with
//! it. `login_device` swaps the token for a session token; every later call is
//! encrypted under a key derived from the current token and posted as a
//! `securePassthrough` envelope to `/app?token=<token>`.

use std::sync::OnceLock;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hearth_app::ports::{Dimmable, Switchable};
use hearth_domain::command::Color;
use hearth_domain::error::{HubError, ParameterError};
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::cipher::TapoCipher;
use crate::config::TapoCredentials;
use crate::error::TapoError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_KEY_BITS: usize = 1024;

/// PEM of the handshake public key, generated once per process.
static HANDSHAKE_KEY: OnceLock<String> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct Reply {
    error_code: i64,
    #[serde(default)]
    result: Value,
}

#[derive(Debug)]
struct Session {
    token: String,
    cookie: Option<String>,
}

/// Client for one Tapo plug or bulb.
///
/// The session is established lazily on the first call and dropped when the
/// device reports it expired, so the next call starts over.
pub struct TapoClient {
    base_url: String,
    credentials: TapoCredentials,
    http: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for TapoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapoClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TapoClient {
    /// Build a client for the device at `address` (a host, `host:port`, or
    /// full URL).
    ///
    /// # Errors
    ///
    /// Returns [`TapoError::Http`] if the HTTP client cannot be built.
    pub fn new(address: &str, credentials: TapoCredentials) -> Result<Self, TapoError> {
        let address = address.trim().trim_end_matches('/');
        let base_url = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(TapoError::Http)?;
        Ok(Self {
            base_url,
            credentials,
            http,
            session: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange a fresh RSA public key for a handshake token and cookie,
    /// replacing any existing session.
    ///
    /// # Errors
    ///
    /// Returns [`TapoError::Handshake`] wrapping the underlying failure.
    pub async fn handshake(&self) -> Result<(), TapoError> {
        let mut guard = self.session.lock().await;
        *guard = None;
        *guard = Some(self.open_session().await?);
        Ok(())
    }

    /// Log into the current session.
    ///
    /// # Errors
    ///
    /// Returns [`TapoError::NoSession`] before a handshake and
    /// [`TapoError::Login`] when the device refuses. Either way the session is
    /// dropped.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), TapoError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(TapoError::NoSession);
        };
        if let Err(err) = self.login_session(session, email, password).await {
            *guard = None;
            return Err(err);
        }
        Ok(())
    }

    /// Apply `fields` with `set_device_info`.
    ///
    /// # Errors
    ///
    /// Returns the session, transport or device error of the call.
    pub async fn set_device_info(&self, fields: Map<String, Value>) -> Result<(), TapoError> {
        self.call("set_device_info", Value::Object(fields)).await?;
        Ok(())
    }

    /// Read the device state.
    ///
    /// # Errors
    ///
    /// Returns the session, transport or device error of the call, or
    /// [`TapoError::MissingField`] if the result is not an object.
    pub async fn get_device_info(&self) -> Result<Map<String, Value>, TapoError> {
        match self.call("get_device_info", Value::Null).await? {
            Value::Object(info) => Ok(info),
            _ => Err(TapoError::MissingField("result")),
        }
    }

    /// Run one encrypted call, establishing the session first if needed.
    #[tracing::instrument(skip(self, params), fields(base_url = %self.base_url))]
    async fn call(&self, method: &str, params: Value) -> Result<Value, TapoError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            let mut session = self.open_session().await?;
            self.login_session(&mut session, &self.credentials.email, &self.credentials.password)
                .await?;
            *guard = Some(session);
        }
        let Some(session) = guard.as_mut() else {
            return Err(TapoError::NoSession);
        };

        let mut request = json!({ "method": method });
        if !params.is_null() {
            request["params"] = params;
        }
        match self.secure_request(session, method, &request).await {
            Err(err) if err.invalidates_session() => {
                tracing::warn!(error = %err, "session rejected, will re-authenticate");
                *guard = None;
                Err(err)
            }
            other => other,
        }
    }

    async fn open_session(&self) -> Result<Session, TapoError> {
        self.handshake_request()
            .await
            .map_err(|err| TapoError::Handshake(Box::new(err)))
    }

    async fn handshake_request(&self) -> Result<Session, TapoError> {
        let public_pem = handshake_key().await?;

        let response = self
            .http
            .post(format!("{}/app", self.base_url))
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "method": "handshake", "params": { "key": public_pem } }))
            .send()
            .await
            .map_err(TapoError::Http)?;
        let cookie = session_cookie(&response);
        let result = parse_reply("handshake", &response.bytes().await.map_err(TapoError::Http)?)?;
        let token = result
            .get("key")
            .and_then(Value::as_str)
            .ok_or(TapoError::MissingField("key"))?;

        tracing::debug!(base_url = %self.base_url, "handshake completed");
        Ok(Session {
            token: token.to_string(),
            cookie,
        })
    }

    async fn login_session(
        &self,
        session: &mut Session,
        email: &str,
        password: &str,
    ) -> Result<(), TapoError> {
        let request = json!({
            "method": "login_device",
            "params": {
                "username": STANDARD.encode(email),
                "password": STANDARD.encode(password),
            },
        });
        let result = self
            .secure_request(session, "login_device", &request)
            .await
            .map_err(|err| TapoError::Login(Box::new(err)))?;
        let token = result
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| TapoError::Login(Box::new(TapoError::MissingField("token"))))?;
        session.token = token.to_string();
        tracing::debug!(base_url = %self.base_url, "logged in");
        Ok(())
    }

    async fn secure_request(
        &self,
        session: &mut Session,
        method: &str,
        request: &Value,
    ) -> Result<Value, TapoError> {
        let cipher = TapoCipher::from_token(&session.token);
        let plaintext = serde_json::to_vec(request).map_err(TapoError::Json)?;
        let envelope = json!({
            "method": "securePassthrough",
            "params": { "request": cipher.encrypt(&plaintext) },
        });

        let mut builder = self
            .http
            .post(format!("{}/app", self.base_url))
            .query(&[("token", session.token.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .json(&envelope);
        if let Some(cookie) = &session.cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder.send().await.map_err(TapoError::Http)?;
        if let Some(cookie) = session_cookie(&response) {
            session.cookie = Some(cookie);
        }
        let outer = parse_reply(method, &response.bytes().await.map_err(TapoError::Http)?)?;
        match outer.get("response").and_then(Value::as_str) {
            Some(encrypted) => parse_reply(method, &cipher.decrypt(encrypted)?),
            None => Ok(outer),
        }
    }

    async fn switch(&self, on: bool) -> Result<(), TapoError> {
        let mut fields = Map::new();
        fields.insert("device_on".into(), Value::Bool(on));
        self.set_device_info(fields).await
    }

    /// Turn the light on with extra fields.
    async fn light(&self, extra: &[(&str, i64)]) -> Result<(), TapoError> {
        let mut fields = Map::new();
        fields.insert("device_on".into(), Value::Bool(true));
        for (key, value) in extra {
            fields.insert((*key).to_string(), Value::from(*value));
        }
        self.set_device_info(fields).await
    }
}

async fn handshake_key() -> Result<&'static str, TapoError> {
    if let Some(pem) = HANDSHAKE_KEY.get() {
        return Ok(pem);
    }
    let pem = tokio::task::spawn_blocking(|| {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), HANDSHAKE_KEY_BITS)
            .map_err(TapoError::KeyGeneration)?;
        RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(TapoError::KeyEncoding)
    })
    .await
    .map_err(|_| TapoError::Cipher("handshake key generation was cancelled"))??;
    Ok(HANDSHAKE_KEY.get_or_init(|| pem))
}

/// The cookie value is everything before the first `;` of `Set-Cookie`.
fn session_cookie(response: &reqwest::Response) -> Option<String> {
    let value = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    let cookie = value.split(';').next()?.trim();
    (!cookie.is_empty()).then(|| cookie.to_string())
}

fn parse_reply(method: &str, body: &[u8]) -> Result<Value, TapoError> {
    let reply: Reply = serde_json::from_slice(body).map_err(TapoError::Json)?;
    if reply.error_code != 0 {
        return Err(TapoError::ErrorCode {
            method: method.to_string(),
            code: reply.error_code,
        });
    }
    Ok(reply.result)
}

impl Switchable for TapoClient {
    async fn turn_on(&self) -> Result<(), HubError> {
        Ok(self.switch(true).await?)
    }

    async fn turn_off(&self) -> Result<(), HubError> {
        Ok(self.switch(false).await?)
    }

    async fn toggle(&self) -> Result<(), HubError> {
        let info = self.get_device_info().await?;
        let on = info
            .get("device_on")
            .and_then(Value::as_bool)
            .ok_or(TapoError::MissingField("device_on"))?;
        Ok(self.switch(!on).await?)
    }
}

impl Dimmable for TapoClient {
    async fn set_brightness(&self, level: i64) -> Result<(), HubError> {
        let level = ParameterError::check_range("brightness", level, 1, 100)?;
        Ok(self.light(&[("brightness", level)]).await?)
    }

    async fn set_color(&self, color: Color) -> Result<(), HubError> {
        let Color::Hsv { hue, saturation } = color else {
            return Err(ParameterError::WrongType {
                field: "color",
                expected: "hue and saturation",
                found: "rgb",
            }
            .into());
        };
        let hue = ParameterError::check_range("hue", hue, 0, 360)?;
        let saturation = ParameterError::check_range("saturation", saturation, 0, 100)?;
        Ok(self
            .light(&[("hue", hue), ("saturation", saturation)])
            .await?)
    }

    async fn set_color_temp(&self, kelvin: i64) -> Result<(), HubError> {
        let kelvin = ParameterError::check_range("color_temp", kelvin, 2500, 6500)?;
        Ok(self.light(&[("color_temp", kelvin)]).await?)
    }
}

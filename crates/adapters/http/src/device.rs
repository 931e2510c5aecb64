//! HTTP device client.

use std::collections::BTreeMap;
use std::time::Duration;

use hearth_app::ports::{Dimmable, Switchable};
use hearth_domain::command::Color;
use hearth_domain::device::{HttpAction, HttpSettings};
use hearth_domain::error::HubError;
use reqwest::Method;

use crate::error::HttpDeviceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A device driven by plain HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpDevice {
    base_url: String,
    headers: BTreeMap<String, String>,
    actions: BTreeMap<String, HttpAction>,
    client: reqwest::Client,
}

impl HttpDevice {
    /// Build a client for `address`. A bare host gets an `http://` scheme.
    ///
    /// # Errors
    ///
    /// Returns [`HttpDeviceError::InvalidUrl`] for an unparsable address,
    /// [`HttpDeviceError::InvalidMethod`] when an action names a bad method,
    /// and [`HttpDeviceError::Request`] if the HTTP client cannot be built.
    pub fn new(address: &str, settings: &HttpSettings) -> Result<Self, HttpDeviceError> {
        let address = address.trim().trim_end_matches('/');
        let base_url = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        reqwest::Url::parse(&base_url).map_err(|_| HttpDeviceError::InvalidUrl(base_url.clone()))?;

        for action in settings.actions.values() {
            parse_method(&action.method)?;
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(HttpDeviceError::Request)?;

        Ok(Self {
            base_url,
            headers: settings.headers.clone(),
            actions: settings.actions.clone(),
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a raw request with the configured headers and return the body.
    ///
    /// # Errors
    ///
    /// Returns [`HttpDeviceError::Status`] for a non-2xx answer and
    /// [`HttpDeviceError::Request`] for transport failures.
    #[tracing::instrument(skip(self, body), fields(base_url = %self.base_url))]
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Result<String, HttpDeviceError> {
        let method = parse_method(method)?;
        let url = if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };

        let mut request = self.client.request(method, url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(HttpDeviceError::Request)?;
        let status = response.status();
        let text = response.text().await.map_err(HttpDeviceError::Request)?;
        if !status.is_success() {
            return Err(HttpDeviceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        tracing::debug!(status = status.as_u16(), "request completed");
        Ok(text)
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&self, path: &str) -> Result<String, HttpDeviceError> {
        self.send("GET", path, None).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post(&self, path: &str, body: String) -> Result<String, HttpDeviceError> {
        self.send("POST", path, Some(body)).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put(&self, path: &str, body: String) -> Result<String, HttpDeviceError> {
        self.send("PUT", path, Some(body)).await
    }

    /// Whether a request template exists for `verb`.
    #[must_use]
    pub fn maps(&self, verb: &str) -> bool {
        self.actions.contains_key(verb)
    }

    /// Run the template configured for `verb`, substituting `{value}`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpDeviceError::Unmapped`] when no template exists, or the
    /// request's error.
    pub async fn perform(&self, verb: &str, value: Option<&str>) -> Result<(), HttpDeviceError> {
        let action = self
            .actions
            .get(verb)
            .ok_or_else(|| HttpDeviceError::Unmapped(verb.to_string()))?;
        let body = action
            .body
            .as_ref()
            .map(|body| body.replace("{value}", value.unwrap_or_default()));
        self.send(&action.method, &action.path, body).await?;
        Ok(())
    }
}

fn parse_method(method: &str) -> Result<Method, HttpDeviceError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| HttpDeviceError::InvalidMethod(method.to_string()))
}

impl Switchable for HttpDevice {
    async fn turn_on(&self) -> Result<(), HubError> {
        Ok(self.perform("on", None).await?)
    }

    async fn turn_off(&self) -> Result<(), HubError> {
        Ok(self.perform("off", None).await?)
    }

    async fn toggle(&self) -> Result<(), HubError> {
        Ok(self.perform("toggle", None).await?)
    }
}

impl Dimmable for HttpDevice {
    async fn set_brightness(&self, level: i64) -> Result<(), HubError> {
        Ok(self.perform("brightness", Some(&level.to_string())).await?)
    }

    async fn set_color(&self, color: Color) -> Result<(), HubError> {
        let value = serde_json::to_string(&color).map_err(HttpDeviceError::Body)?;
        Ok(self.perform("color", Some(&value)).await?)
    }

    async fn set_color_temp(&self, kelvin: i64) -> Result<(), HubError> {
        Ok(self.perform("color_temp", Some(&kelvin.to_string())).await?)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings() -> HttpSettings {
        HttpSettings {
            headers: BTreeMap::from([("X-Api-Key".to_string(), "k1".to_string())]),
            actions: BTreeMap::from([
                (
                    "on".to_string(),
                    HttpAction::new("POST", "/relay").with_body(r#"{"on":true}"#),
                ),
                ("off".to_string(), HttpAction::new("get", "/relay/off")),
                (
                    "brightness".to_string(),
                    HttpAction::new("PUT", "/light").with_body(r#"{"level":{value}}"#),
                ),
            ]),
        }
    }

    #[tokio::test]
    async fn should_send_configured_action_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/relay"))
            .and(header("X-Api-Key", "k1"))
            .and(body_string(r#"{"on":true}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let device = HttpDevice::new(&server.uri(), &settings()).unwrap();
        device.turn_on().await.unwrap();
    }

    #[tokio::test]
    async fn should_substitute_value_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/light"))
            .and(body_string(r#"{"level":42}"#))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let device = HttpDevice::new(&server.uri(), &settings()).unwrap();
        device.set_brightness(42).await.unwrap();
    }

    #[tokio::test]
    async fn should_normalize_method_case() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/relay/off"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let device = HttpDevice::new(&server.uri(), &settings()).unwrap();
        device.turn_off().await.unwrap();
    }

    #[tokio::test]
    async fn should_return_device_error_when_status_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("relay jammed"))
            .mount(&server)
            .await;

        let device = HttpDevice::new(&server.uri(), &settings()).unwrap();
        let err = device.turn_on().await.unwrap_err();
        assert!(matches!(&err, HubError::ProtocolDevice(fault) if fault.code == Some(500)));
        assert_eq!(err.chain(), "device error: http error code 500: relay jammed");
    }

    #[tokio::test]
    async fn should_return_unsupported_without_request_when_verb_unmapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let device = HttpDevice::new(&server.uri(), &settings()).unwrap();
        assert!(matches!(
            device.toggle().await,
            Err(HubError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn should_pass_through_raw_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"on":false}"#))
            .mount(&server)
            .await;

        let device = HttpDevice::new(&server.uri(), &HttpSettings::default()).unwrap();
        assert_eq!(device.get("status").await.unwrap(), r#"{"on":false}"#);
    }

    #[test]
    fn should_add_scheme_to_bare_host() {
        let device = HttpDevice::new("192.168.1.50/", &HttpSettings::default()).unwrap();
        assert_eq!(device.base_url(), "http://192.168.1.50");
    }

    #[test]
    fn should_reject_invalid_method_at_construction() {
        let settings = HttpSettings {
            actions: BTreeMap::from([("on".to_string(), HttpAction::new("SE ND", "/x"))]),
            ..HttpSettings::default()
        };
        assert!(matches!(
            HttpDevice::new("10.0.0.1", &settings),
            Err(HttpDeviceError::InvalidMethod(_))
        ));
    }
}

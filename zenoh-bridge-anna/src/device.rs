//! Device transport.
//!
//! The bridge core only needs two things from the thermostat: the raw
//! appliance snapshot and a way to send a new control value. Both go through
//! the [`DeviceTransport`] trait so tests can stand in for the hardware.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::escape::escape;
use reqwest::Client;
use thiserror::Error;

use crate::config::DeviceConfig;

/// Snapshot endpoint on the Smile gateway.
pub const SNAPSHOT_PATH: &str = "/core/appliances";

/// Errors talking to the device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Device answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid appliance identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid control field '{0}'")]
    InvalidField(String),
}

/// Read/write access to the thermostat.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Fetch the raw appliance snapshot.
    async fn fetch_snapshot(&self) -> Result<String, DeviceError>;

    /// Send a new value for `field` to the appliance `identifier`.
    async fn write_control(
        &self,
        identifier: &str,
        field: &str,
        value: &str,
    ) -> Result<(), DeviceError>;
}

/// HTTP client for a Plugwise Smile gateway.
#[derive(Debug, Clone)]
pub struct SmileClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SmileClient {
    /// Build a client with a single pooled keep-alive connection.
    pub fn new(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(format!("zenoh-bridge-anna/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", config.host, config.port),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Base URL of the gateway.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn control_url(&self, identifier: &str) -> String {
        format!("{}{};id={}/thermostat", self.base_url, SNAPSHOT_PATH, identifier)
    }

    fn check_status(response: &reqwest::Response) -> Result<(), DeviceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(DeviceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[async_trait]
impl DeviceTransport for SmileClient {
    async fn fetch_snapshot(&self) -> Result<String, DeviceError> {
        let url = format!("{}{}", self.base_url, SNAPSHOT_PATH);
        tracing::trace!(url = %url, "Fetching snapshot");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Self::check_status(&response)?;

        Ok(response.text().await?)
    }

    async fn write_control(
        &self,
        identifier: &str,
        field: &str,
        value: &str,
    ) -> Result<(), DeviceError> {
        validate_identifier(identifier)?;
        let body = control_body(field, value)?;
        let url = self.control_url(identifier);
        tracing::debug!(url = %url, field, value, "Writing control value");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;
        Self::check_status(&response)
    }
}

/// Identifiers end up in the URL path, so only plain tokens are accepted.
pub fn validate_identifier(identifier: &str) -> Result<(), DeviceError> {
    let valid = !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DeviceError::InvalidIdentifier(identifier.to_string()))
    }
}

/// Render the thermostat write body for `field`.
pub fn control_body(field: &str, value: &str) -> Result<String, DeviceError> {
    let valid = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(DeviceError::InvalidField(field.to_string()));
    }

    Ok(format!(
        "<?xml version='1.0'?><thermostat_functionality><{field}>{}</{field}></thermostat_functionality>",
        escape(value)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_body() {
        assert_eq!(
            control_body("setpoint", "19.5").unwrap(),
            "<?xml version='1.0'?><thermostat_functionality><setpoint>19.5</setpoint></thermostat_functionality>"
        );
    }

    #[test]
    fn test_control_body_escapes_value() {
        let body = control_body("setpoint", "<20 & up>").unwrap();
        assert!(body.contains("<setpoint>&lt;20 &amp; up&gt;</setpoint>"));
    }

    #[test]
    fn test_control_body_rejects_bad_field() {
        assert!(matches!(
            control_body("set point", "1"),
            Err(DeviceError::InvalidField(_))
        ));
        assert!(control_body("", "1").is_err());
        assert!(control_body("1st", "1").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("0d4e5a6b8c").is_ok());
        assert!(validate_identifier("abc_12-3").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("initial/../x").is_err());
        assert!(validate_identifier("a;id=b").is_err());
    }

    #[test]
    fn test_urls() {
        let client = SmileClient::new(&DeviceConfig {
            host: "192.168.1.20".to_string(),
            port: 80,
            username: "smile".to_string(),
            password: "secret".to_string(),
            timeout_ms: 1000,
        })
        .unwrap();

        assert_eq!(client.base_url(), "http://192.168.1.20:80");
        assert_eq!(
            client.control_url("abc"),
            "http://192.168.1.20:80/core/appliances;id=abc/thermostat"
        );
    }
}

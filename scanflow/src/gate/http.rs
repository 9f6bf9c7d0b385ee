//! HTTP quality-gate source.

use super::{GateSource, GateVerdict};
use crate::errors::GateError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Polls a code-quality server's gate status endpoint.
///
/// The response is JSON; the status string is read at a JSON pointer
/// (`/projectStatus/status` by default). `OK` passes, `ERROR` fails, anything
/// else is pending.
#[derive(Debug, Clone)]
pub struct HttpGateSource {
    name: String,
    url: String,
    token: Option<String>,
    status_pointer: String,
    client: reqwest::Client,
}

impl HttpGateSource {
    /// Creates a source polling `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, GateError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GateError::unavailable(&name, e.to_string()))?;
        Ok(Self {
            name,
            url: url.into(),
            token: None,
            status_pointer: "/projectStatus/status".to_string(),
            client,
        })
    }

    /// Authenticates with a token sent as the basic-auth user name.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Reads the status at a different JSON pointer.
    #[must_use]
    pub fn with_status_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.status_pointer = pointer.into();
        self
    }

    /// Maps a status string to a verdict.
    #[must_use]
    pub fn verdict_for(status: &str) -> GateVerdict {
        match status {
            "OK" => GateVerdict::Passed,
            "ERROR" => GateVerdict::Failed(status.to_string()),
            _ => GateVerdict::Pending,
        }
    }
}

#[async_trait]
impl GateSource for HttpGateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> Result<GateVerdict, GateError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.basic_auth(token, None::<&str>);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GateError::unavailable(&self.name, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GateError::unavailable(&self.name, format!("HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GateError::invalid_response(&self.name, e.to_string()))?;
        let gate_status = body
            .pointer(&self.status_pointer)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                GateError::invalid_response(
                    &self.name,
                    format!("no string at {}", self.status_pointer),
                )
            })?;

        debug!(gate = %self.name, status = gate_status, "Polled quality gate");
        Ok(Self::verdict_for(gate_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(HttpGateSource::verdict_for("OK"), GateVerdict::Passed);
        assert_eq!(
            HttpGateSource::verdict_for("ERROR"),
            GateVerdict::Failed("ERROR".to_string())
        );
        assert_eq!(HttpGateSource::verdict_for("IN_PROGRESS"), GateVerdict::Pending);
        assert_eq!(HttpGateSource::verdict_for("NONE"), GateVerdict::Pending);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let source = HttpGateSource::new("sonar", "http://127.0.0.1:1/api/qualitygates/project_status")
            .unwrap()
            .with_token("squ_x");
        let err = source.poll().await.unwrap_err();
        assert!(matches!(err, GateError::Unavailable { .. }));
    }
}

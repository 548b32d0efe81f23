// bifrost-broker/src/sinks/webhook.rs
// ============================================================================
// Module: Webhook Sink
// Description: Posts each rune as a JSON body to a configured HTTP endpoint.
// Purpose: Let operators wire Bifrost's audit trail into their own
//          alerting/ingestion systems.
// Dependencies: bifrost_core::interfaces, reqwest (blocking, rustls)
// ============================================================================

use bifrost_core::Sink;
use bifrost_core::SinkError;
use bifrost_core::model::Rune;
use reqwest::blocking::Client;

/// Posts each rune as a JSON body to `url`.
pub struct WebhookSink {
    name: String,
    url: String,
    client: Client,
}

impl WebhookSink {
    /// Builds a webhook sink posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(name: String, url: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self { name, url, client })
    }

    /// Builds a webhook sink using an already-constructed client, letting
    /// callers share a connection pool across sinks or inject a client
    /// pointed at a test server.
    #[must_use]
    pub fn with_client(name: String, url: String, client: Client) -> Self {
        Self { name, url, client }
    }
}

impl Sink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, rune: &Rune) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(rune)
            .send()
            .map_err(|err| SinkError::Emit(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Emit(format!("webhook returned status {}", response.status())));
        }
        Ok(())
    }
}

//! HttpTransport - JSON POST to the configured endpoint

use contracts::{
    ContractError, EndpointConfig, Payload, Transport, TransportError, TransportResponse,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, instrument, warn};

/// Transport that POSTs each payload to one HTTP endpoint
pub struct HttpTransport {
    name: String,
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a new HttpTransport for the given endpoint
    #[instrument(name = "http_transport_new", skip(name, endpoint), fields(url = %endpoint.url))]
    pub fn new(name: impl Into<String>, endpoint: &EndpointConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(endpoint.timeout())
            .connect_timeout(endpoint.connect_timeout())
            .build()
            .map_err(|e| ContractError::transport_setup(&name, e.to_string()))?;

        debug!(
            transport = %name,
            timeout_ms = endpoint.timeout_ms,
            connect_timeout_ms = endpoint.connect_timeout_ms,
            "HttpTransport ready"
        );

        Ok(Self {
            name,
            client,
            url: endpoint.url.clone(),
            token: endpoint.token.clone(),
        })
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_transport_send",
        skip(self, payload),
        fields(transport = %self.name, bytes = payload.len())
    )]
    async fn send(&self, payload: &Payload) -> Result<TransportResponse, TransportError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, payload.content_type())
            .body(payload.body().clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        if !(200..300).contains(&status) {
            warn!(transport = %self.name, status, "Request rejected");
            return Err(TransportError::Rejected { status, body });
        }

        debug!(transport = %self.name, status, "Request accepted");
        Ok(TransportResponse::new(status, body))
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::connection(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

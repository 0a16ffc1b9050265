use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::Credentials,
    error::{ImagenError, Result},
    models::GenerationRequest,
};

/// Delivers one generation request to the provider.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// Returns the raw body of a 2xx response. Anything else is an
    /// [`ImagenError::Transport`] carrying the status and body when known.
    async fn send(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImagenError::Config(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn endpoint(&self) -> String {
        self.credentials.generations_url()
    }
}

#[async_trait]
impl ImageTransport for HttpTransport {
    async fn send(&self, request: &GenerationRequest) -> Result<String> {
        let url = self.endpoint();
        log::debug!("POST {} (model: {}, n: {})", url, request.model, request.image_count);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ImagenError::Transport {
                message: format!("image API returned {}", status),
                status: Some(status.as_u16()),
                body: Some(body),
            });
        }

        log::debug!("Image API responded {} with {} bytes", status, body.len());
        Ok(body)
    }
}

//! Sharing programs through the Go playground.

use std::time::Duration;

use gonsole_core::ShareService;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("playground answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for `<base>/share`, which answers with the id of the stored snippet.
pub struct PlaygroundClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl PlaygroundClient {
    pub fn new(base_url: &str) -> Result<Self, ShareError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn share_url(&self) -> String {
        format!("{}/share", self.base_url)
    }

    /// Public URL of a stored snippet.
    pub fn snippet_url(&self, id: &str) -> String {
        format!("{}/p/{}", self.base_url, id.trim())
    }

    pub fn upload(&self, program: &str) -> Result<String, ShareError> {
        let url = self.share_url();
        info!(url = %url, bytes = program.len(), "sharing program");
        let response = self.client.post(&url).body(program.to_string()).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ShareError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(self.snippet_url(&body))
    }
}

impl ShareService for PlaygroundClient {
    fn share(&self, program: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.upload(program)?)
    }
}

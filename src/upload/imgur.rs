// SPDX-License-Identifier: GPL-3.0-only

//! Anonymous uploads to Imgur

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{JobLink, UploadError, UploadTransport};

const ENDPOINT: &str = "https://api.imgur.com/3/image";

#[derive(Debug, Deserialize)]
struct ImgurResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    status: u16,
    data: serde_json::Value,
}

pub struct ImgurTransport {
    http: Client,
    client_id: String,
    endpoint: String,
}

impl ImgurTransport {
    #[must_use]
    pub fn new(client_id: &str) -> Self {
        Self::with_client(Client::new(), client_id, ENDPOINT)
    }

    /// Posts to `endpoint` through `http` instead of the public api.
    #[must_use]
    pub fn with_client(http: Client, client_id: &str, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.to_string(),
            endpoint: endpoint.into(),
        }
    }
}

/// Extracts the image id from an Imgur API answer.
fn parse_response(body: &str) -> Result<String, UploadError> {
    let response: ImgurResponse =
        serde_json::from_str(body).map_err(|e| UploadError::Protocol(e.to_string()))?;

    if !response.success {
        let reason = match &response.data["error"] {
            serde_json::Value::String(message) => message.clone(),
            serde_json::Value::Object(error) => error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string(),
            _ => format!("status {}", response.status),
        };
        return Err(UploadError::Service(format!("Imgur refused the upload: {reason}")));
    }

    response.data["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UploadError::Protocol("no image id in the answer".to_string()))
}

#[async_trait]
impl UploadTransport for ImgurTransport {
    async fn upload(&self, image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
        link.check_cancelled()?;
        link.progress("Upload the screenshot...").await;

        let form = Form::new().text("type", "file").part(
            "image",
            Part::bytes(image.to_vec())
                .file_name("screenshot.png")
                .mime_str("image/png")?,
        );

        let request = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Client-ID {}", self.client_id))
            .multipart(form)
            .send();

        let response = tokio::select! {
            response = request => response?,
            () = link.cancelled() => return Err(UploadError::Cancelled),
        };

        let status = response.status();
        let body = response.text().await?;
        log::debug!("Imgur answered {status}");
        link.check_cancelled()?;

        let id = parse_response(&body)?;
        link.progress("The screenshot has been uploaded.").await;
        Ok(id)
    }
}

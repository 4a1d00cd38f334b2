//! Custom-response handling
//!
//! Actions with a custom response replace the current page instead of
//! returning a JSON message. In a terminal there is no page to replace, so
//! [`DownloadNavigator`] fetches the document and writes it out.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::action::FormPayload;

#[async_trait]
pub trait Navigator: Send + Sync {
    /// Replace the current document with `url` (GET)
    async fn navigate(&self, url: &Url);

    /// Submit `form` to `url` as a regular form POST
    async fn submit_form(&self, url: &Url, form: &FormPayload);
}

/// Fetches the navigation target and writes the body to a file or stdout
pub struct DownloadNavigator {
    http: Client,
    output: Option<PathBuf>,
}

impl DownloadNavigator {
    pub fn new(http: Client, output: Option<PathBuf>) -> Self {
        Self { http, output }
    }

    async fn write_body(&self, response: reqwest::Response) {
        let status = response.status();
        if !status.is_success() {
            tracing::error!("Navigation to {} returned {}", response.url(), status);
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to read navigation response: {}", e);
                return;
            }
        };

        let result = match &self.output {
            Some(path) => tokio::fs::write(path, &body).await.map(|_| {
                tracing::info!("Wrote {} bytes to {}", body.len(), path.display());
            }),
            None => {
                let mut stdout = tokio::io::stdout();
                match stdout.write_all(&body).await {
                    Ok(()) => stdout.flush().await,
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = result {
            tracing::error!("Failed to write navigation response: {}", e);
        }
    }
}

#[async_trait]
impl Navigator for DownloadNavigator {
    async fn navigate(&self, url: &Url) {
        tracing::info!("Navigating to {}", url);
        match self.http.get(url.clone()).send().await {
            Ok(response) => self.write_body(response).await,
            Err(e) => tracing::error!("Navigation to {} failed: {}", url, e),
        }
    }

    async fn submit_form(&self, url: &Url, form: &FormPayload) {
        tracing::info!("Submitting form to {}", url);
        match self
            .http
            .post(url.clone())
            .multipart(form.to_multipart())
            .send()
            .await
        {
            Ok(response) => self.write_body(response).await,
            Err(e) => tracing::error!("Form submission to {} failed: {}", url, e),
        }
    }
}

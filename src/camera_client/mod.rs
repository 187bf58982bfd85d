//! CameraClient - camera overlay configuration API
//!
//! ## Responsibilities
//!
//! - Read current camera-side overlay titles
//! - Write overlay text (blend-enable flags + text, two sequential requests)
//! - Disable overlays
//!
//! `DahuaClient` talks to the Amcrest/Dahua `configManager.cgi` endpoint and
//! normalizes both response formats (line-oriented `key=value` and XML) into
//! the same overlay-id to text mapping.

mod parse;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Camera overlay operations. All writes are funneled through the update
/// queue; nothing else in the bridge calls these directly.
#[async_trait]
pub trait CameraClient: Send + Sync {
    /// Current camera-side overlay titles, overlay id to text
    async fn fetch_overlay_config(&self) -> Result<HashMap<String, String>>;

    /// Enable the overlay blend flags and set its text
    async fn set_overlay_text(&self, overlay_id: &str, text: &str) -> Result<()>;

    /// Clear the overlay blend flags
    async fn disable_overlay_text(&self, overlay_id: &str) -> Result<()>;
}

/// Amcrest/Dahua camera client
pub struct DahuaClient {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl DahuaClient {
    /// `host` is `ip` or `ip:port`
    pub fn new(host: &str, username: Option<String>, password: Option<String>) -> Self {
        Self::with_timeout(host, username, password, Duration::from_secs(10))
    }

    pub fn with_timeout(
        host: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: format!("http://{host}"),
            username,
            password,
        }
    }

    async fn config_request(&self, query: &[(String, String)]) -> Result<String> {
        let url = format!("{}/cgi-bin/configManager.cgi", self.base_url);
        let mut req = self.client.get(&url).query(query);
        if let Some(ref username) = self.username {
            req = req.basic_auth(username, self.password.as_deref());
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(Error::Camera(format!(
                "camera returned {} for configManager request",
                resp.status()
            )));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl CameraClient for DahuaClient {
    async fn fetch_overlay_config(&self) -> Result<HashMap<String, String>> {
        let body = self
            .config_request(&[
                ("action".to_string(), "getConfig".to_string()),
                ("name".to_string(), "VideoWidget".to_string()),
            ])
            .await?;
        parse::parse_overlay_config(&body)
    }

    async fn set_overlay_text(&self, overlay_id: &str, text: &str) -> Result<()> {
        // The camera only renders the title once both blend flags are set,
        // and it does not accept flags and text in one request.
        self.config_request(&[
            ("action".to_string(), "setConfig".to_string()),
            (
                format!("VideoWidget[0].CustomTitle[{overlay_id}].EncodeBlend"),
                "true".to_string(),
            ),
            (
                format!("VideoWidget[0].CustomTitle[{overlay_id}].PreviewBlend"),
                "true".to_string(),
            ),
        ])
        .await?;

        self.config_request(&[
            ("action".to_string(), "setConfig".to_string()),
            (
                format!("VideoWidget[0].CustomTitle[{overlay_id}].Text"),
                text.to_string(),
            ),
        ])
        .await?;

        tracing::debug!(overlay_id = %overlay_id, text = %text, "Overlay text written");
        Ok(())
    }

    async fn disable_overlay_text(&self, overlay_id: &str) -> Result<()> {
        self.config_request(&[
            ("action".to_string(), "setConfig".to_string()),
            (
                format!("VideoWidget[0].CustomTitle[{overlay_id}].EncodeBlend"),
                "false".to_string(),
            ),
            (
                format!("VideoWidget[0].CustomTitle[{overlay_id}].PreviewBlend"),
                "false".to_string(),
            ),
        ])
        .await?;

        tracing::debug!(overlay_id = %overlay_id, "Overlay disabled");
        Ok(())
    }
}

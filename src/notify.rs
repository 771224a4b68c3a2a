//! Workflow engine notifications.
//!
//! After a capture is saved the gateway can POST a small JSON event to a
//! webhook (typically an n8n "Webhook" trigger node).  Delivery runs in the
//! background and is best-effort: failures are logged and dropped.

use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};
use crate::gallery::ImageFile;

pub const CAPTURE_EVENT: &str = "image_captured";

/// Body of a capture notification.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureEvent {
    pub event:      &'static str,
    pub filename:   String,
    /// `YYYYMMDD_HHMMSS`, as embedded in the filename.
    pub timestamp:  String,
    pub size_bytes: u64,
    /// Passed through to the workflow engine untouched, in insertion order.
    pub metadata:   Map<String, Value>,
}

impl CaptureEvent {
    pub fn new(file: &ImageFile, timestamp: String, label: Option<&str>) -> Self {
        let mut metadata = Map::new();
        if let Some(l) = label.filter(|l| !l.is_empty()) {
            metadata.insert("label".into(), Value::String(l.to_string()));
        }
        Self {
            event:      CAPTURE_EVENT,
            filename:   file.filename.clone(),
            timestamp,
            size_bytes: file.size_bytes,
            metadata,
        }
    }
}

#[derive(Debug, Clone)]
struct Webhook {
    url:  String,
    auth: Option<(String, Option<String>)>,
}

/// Sends capture events to the configured webhook, if any.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: Client,
    hook: Option<Webhook>,
}

impl Notifier {
    /// A notifier that sends nothing.
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            hook: None,
        }
    }

    pub fn new(
        url:      Option<String>,
        user:     Option<String>,
        password: Option<String>,
        timeout:  Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Http)?;
        Ok(Self {
            http,
            hook: url.map(|url| Webhook {
                url,
                auth: user.map(|u| (u, password)),
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.hook.is_some()
    }

    /// Deliver `event` and wait for the answer.
    pub async fn send(&self, event: &CaptureEvent) -> Result<()> {
        let Some(hook) = &self.hook else {
            return Ok(());
        };
        let mut req = self.http.post(&hook.url).json(event);
        if let Some((user, pass)) = &hook.auth {
            req = req.basic_auth(user, pass.as_ref());
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::WebhookStatus(status.as_u16()));
        }
        debug!("webhook accepted {} ({status})", event.filename);
        Ok(())
    }

    /// Deliver `event` on a background task.
    pub fn spawn(&self, event: CaptureEvent) {
        if !self.is_enabled() {
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&event).await {
                warn!("workflow notification for {} failed: {e}", event.filename);
            }
        });
    }
}

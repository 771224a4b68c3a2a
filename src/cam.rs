//! Camera device HTTP client.
//!
//! The camera is a plain HTTP server that answers `GET /capture` with one
//! JPEG frame.  Every fetch is bounded by a single timeout covering connect,
//! headers and body.  Failed fetches are not retried here.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;

use crate::error::{GatewayError, Result};

/// Timeout for the reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a reachability check against the camera device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub online:     bool,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub message: String,
}

/// Client for one camera device.
#[derive(Debug, Clone)]
pub struct CameraClient {
    http:    Client,
    base:    String,
    host:    String,
    timeout: Duration,
}

impl CameraClient {
    /// `base` is the device root, e.g. `http://10.0.0.30:80`.
    pub fn new(base: impl Into<String>, host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(GatewayError::Http)?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            host: host.into(),
            timeout,
        })
    }

    /// Host the device was configured with, for display.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch one frame from `GET /capture`.
    pub async fn capture(&self) -> Result<Vec<u8>> {
        let url = format!("{}/capture", self.base);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("image capture from {url}: HTTP {status}");
            return Err(GatewayError::BadStatus(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| self.classify(&url, e))?;
        info!("captured {} bytes from {}", body.len(), self.host);
        Ok(body.to_vec())
    }

    /// Check whether the device answers on `/`.
    ///
    /// Never fails: an unreachable device is reported as `online: false`.
    pub async fn probe(&self) -> DeviceStatus {
        let url = format!("{}/", self.base);
        let started = Instant::now();
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => {
                let status = resp.status();
                debug!("probe {url} → {status}");
                DeviceStatus {
                    online:           true,
                    ip_address:       self.host.clone(),
                    response_time_ms: Some(started.elapsed().as_millis() as u64),
                    http_status:      Some(status.as_u16()),
                    message:          "camera is online and responding".to_string(),
                }
            }
            Err(e) if e.is_timeout() => {
                warn!("probe {url}: timeout");
                DeviceStatus {
                    online:           false,
                    ip_address:       self.host.clone(),
                    response_time_ms: None,
                    http_status:      None,
                    message:          "camera connection timeout".to_string(),
                }
            }
            Err(e) => {
                warn!("probe {url}: {e}");
                DeviceStatus {
                    online:           false,
                    ip_address:       self.host.clone(),
                    response_time_ms: None,
                    http_status:      None,
                    message:          format!("camera unreachable: {e}"),
                }
            }
        }
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            warn!("image capture from {url}: timed out after {:?}", self.timeout);
            GatewayError::Timeout(self.timeout)
        } else {
            warn!("image capture from {url}: {e}");
            GatewayError::ConnectionFailed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dead_addr, mock_camera, JPEG};

    fn client(base: String) -> CameraClient {
        CameraClient::new(base, "127.0.0.1", Duration::from_millis(300)).unwrap()
    }

    #[tokio::test]
    async fn capture_returns_frame() {
        let cam = mock_camera().await;
        assert_eq!(client(cam.url()).capture().await.unwrap(), JPEG);
    }

    #[tokio::test]
    async fn non_success_is_bad_status() {
        let cam = mock_camera().await;
        cam.fail_with(503);
        let err = client(cam.url()).capture().await.unwrap_err();
        assert!(matches!(err, GatewayError::BadStatus(503)), "{err:?}");
    }

    #[tokio::test]
    async fn slow_camera_times_out() {
        let cam = mock_camera().await;
        cam.delay(Duration::from_secs(2));
        let err = client(cam.url()).capture().await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_connection_failed() {
        let base = format!("http://{}", dead_addr());
        let err = client(base).capture().await.unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionFailed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn probe_reports_online_and_offline() {
        let cam = mock_camera().await;
        let status = client(cam.url()).probe().await;
        assert!(status.online);
        assert_eq!(status.http_status, Some(200));

        let status = client(format!("http://{}", dead_addr())).probe().await;
        assert!(!status.online);
        assert!(status.http_status.is_none());
        assert_eq!(status.ip_address, "127.0.0.1");
    }
}

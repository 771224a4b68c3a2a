//! Gateway configuration.
//!
//! Settings come from a `key = value` file (optional), then from
//! `CAPTURE_GATEWAY_<KEY>` environment variables, which take precedence.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GatewayError, Result};

// Defaults
const LISTEN_PORT:      u16  = 8000;
const CAMERA_HOST:      &str = "10.0.0.30";
const CAMERA_PORT:      u16  = 80;
const CAMERA_TIMEOUT:   u64  = 10;
const WORKFLOW_TIMEOUT: u64  = 5;

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "CAPTURE_GATEWAY_";

/// Full gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // ── HTTP surface ──────────────────────────────────────────────────────────
    pub listen_addr: SocketAddr,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    /// Reported by `/health` (e.g. "development", "production").
    pub environment: String,
    // ── Camera device ─────────────────────────────────────────────────────────
    pub camera_host: String,
    pub camera_port: u16,
    /// Upper bound on one capture request, in seconds.
    pub camera_timeout: u64,
    // ── Storage ───────────────────────────────────────────────────────────────
    pub capture_dir: PathBuf,
    // ── Workflow engine ───────────────────────────────────────────────────────
    /// Webhook notified after every saved capture.
    pub workflow_webhook:  Option<String>,
    pub workflow_user:     Option<String>,
    pub workflow_password: Option<String>,
    pub workflow_timeout:  u64,
    // ── Process ───────────────────────────────────────────────────────────────
    pub log_syslog: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr:       SocketAddr::from(([0, 0, 0, 0], LISTEN_PORT)),
            cors_origins:      Vec::new(),
            environment:       "development".to_string(),
            camera_host:       CAMERA_HOST.to_string(),
            camera_port:       CAMERA_PORT,
            camera_timeout:    CAMERA_TIMEOUT,
            capture_dir:       PathBuf::from("captures"),
            workflow_webhook:  None,
            workflow_user:     None,
            workflow_password: None,
            workflow_timeout:  WORKFLOW_TIMEOUT,
            log_syslog:        false,
        }
    }
}

impl GatewayConfig {
    /// Base URL of the camera device, e.g. `http://10.0.0.30:80`.
    pub fn camera_url(&self) -> String {
        format!("http://{}:{}", self.camera_host, self.camera_port)
    }

    pub fn camera_timeout(&self) -> Duration {
        Duration::from_secs(self.camera_timeout)
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout)
    }

    /// Apply one `key = value` setting.  Unknown keys and empty values are
    /// ignored; numbers that do not parse keep their default.
    fn set(&mut self, key: &str, val: String) {
        if val.is_empty() {
            return;
        }
        match key {
            "listen_addr"       => if let Ok(a) = val.parse() { self.listen_addr = a },
            "cors_origins"      => {
                self.cors_origins = val
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect();
            }
            "environment"       => self.environment       = val,
            "camera_host"       => self.camera_host       = val,
            "camera_port"       => self.camera_port       = val.parse().unwrap_or(CAMERA_PORT),
            "camera_timeout"    => self.camera_timeout    = val.parse().unwrap_or(CAMERA_TIMEOUT),
            "capture_dir"       => self.capture_dir       = PathBuf::from(&val),
            "workflow_webhook"  => self.workflow_webhook  = Some(val),
            "workflow_user"     => self.workflow_user     = Some(val),
            "workflow_password" => self.workflow_password = Some(val),
            "workflow_timeout"  => self.workflow_timeout  = val.parse().unwrap_or(WORKFLOW_TIMEOUT),
            "log_syslog"        => self.log_syslog        = val == "true" || val == "1" || val == "yes",
            _ => {} // ignore unknown keys
        }
    }
}

/// Every key understood by [`parse_config`] and [`apply_env`].
const KEYS: &[&str] = &[
    "listen_addr",
    "cors_origins",
    "environment",
    "camera_host",
    "camera_port",
    "camera_timeout",
    "capture_dir",
    "workflow_webhook",
    "workflow_user",
    "workflow_password",
    "workflow_timeout",
    "log_syslog",
];

/// Parse the contents of a `key = value` configuration file.
pub fn parse_config(content: &str) -> GatewayConfig {
    let mut cfg = GatewayConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        cfg.set(&key.trim().to_ascii_lowercase(), val.trim().to_string());
    }
    cfg
}

/// Load `path` as a configuration file.
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| GatewayError::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_config(&content))
}

/// Override settings from the environment.
///
/// `lookup` receives the full variable name (`CAPTURE_GATEWAY_CAMERA_HOST`);
/// pass `|k| std::env::var(k).ok()` in production.
pub fn apply_env<F>(mut cfg: GatewayConfig, lookup: F) -> GatewayConfig
where
    F: Fn(&str) -> Option<String>,
{
    for key in KEYS {
        let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
        if let Some(v) = lookup(&var) {
            cfg.set(key, v.trim().to_string());
        }
    }
    cfg
}

/// Validate that required fields are populated.
pub fn validate_config(cfg: &GatewayConfig) -> Result<()> {
    if cfg.camera_host.trim().is_empty() {
        return Err(GatewayError::Config("camera_host is required".into()));
    }
    if cfg.camera_timeout == 0 {
        return Err(GatewayError::Config("camera_timeout must be at least 1 second".into()));
    }
    if cfg.capture_dir.as_os_str().is_empty() {
        return Err(GatewayError::Config("capture_dir is required".into()));
    }
    if let Some(hook) = &cfg.workflow_webhook {
        url::Url::parse(hook)
            .map_err(|e| GatewayError::Config(format!("workflow_webhook {hook:?}: {e}")))?;
    }
    if cfg.workflow_password.is_some() && cfg.workflow_user.is_none() {
        return Err(GatewayError::Config(
            "workflow_password is set but workflow_user is not".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_config("");
        assert_eq!(cfg.camera_url(), "http://10.0.0.30:80");
        assert_eq!(cfg.camera_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.capture_dir, PathBuf::from("captures"));
        assert!(cfg.workflow_webhook.is_none());
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn parses_values_and_skips_noise() {
        let cfg = parse_config(
            "# camera\n\
             camera_host = 192.168.4.1\n\
             CAMERA_PORT=8080\n\
             \n\
             capture_dir = /var/lib/captures\n\
             cors_origins = http://localhost:3000, http://127.0.0.1:8080 ,\n\
             log_syslog = yes\n\
             no_equals_sign\n\
             mystery = 42\n",
        );
        assert_eq!(cfg.camera_url(), "http://192.168.4.1:8080");
        assert_eq!(cfg.capture_dir, PathBuf::from("/var/lib/captures"));
        assert_eq!(cfg.cors_origins, vec!["http://localhost:3000", "http://127.0.0.1:8080"]);
        assert!(cfg.log_syslog);
    }

    #[test]
    fn bad_numbers_keep_defaults() {
        let cfg = parse_config("camera_port = eighty\ncamera_timeout = -3\nlisten_addr = nowhere");
        assert_eq!(cfg.camera_port, CAMERA_PORT);
        assert_eq!(cfg.camera_timeout, CAMERA_TIMEOUT);
        assert_eq!(cfg.listen_addr, GatewayConfig::default().listen_addr);
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("CAPTURE_GATEWAY_CAMERA_HOST", "cam.local"),
            ("CAPTURE_GATEWAY_WORKFLOW_WEBHOOK", "http://n8n:5678/webhook/capture"),
        ]
        .into_iter()
        .collect();
        let cfg = apply_env(parse_config("camera_host = 10.1.1.1\ncamera_port = 81"), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(cfg.camera_host, "cam.local");
        assert_eq!(cfg.camera_port, 81);
        assert_eq!(cfg.workflow_webhook.as_deref(), Some("http://n8n:5678/webhook/capture"));
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.conf");
        fs::write(&path, "camera_timeout = 3\n").unwrap();
        assert_eq!(load_config(&path).unwrap().camera_timeout, 3);
        assert!(matches!(
            load_config(&dir.path().join("missing.conf")),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let cfg = GatewayConfig { camera_timeout: 0, ..GatewayConfig::default() };
        assert!(validate_config(&cfg).is_err());

        let cfg = GatewayConfig { camera_host: " ".into(), ..GatewayConfig::default() };
        assert!(validate_config(&cfg).is_err());

        let cfg = GatewayConfig {
            workflow_webhook: Some("not a url".into()),
            ..GatewayConfig::default()
        };
        assert!(validate_config(&cfg).is_err());

        let cfg = GatewayConfig {
            workflow_password: Some("secret".into()),
            ..GatewayConfig::default()
        };
        assert!(validate_config(&cfg).is_err());
    }
}

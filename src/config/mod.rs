use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::usecase::smtp::SmtpConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Unset means a single replica broadcasting in-process only.
    #[serde(default)]
    pub nats_url: Option<String>,
    #[serde(default = "default_delivery_workers")]
    pub delivery_workers: usize,
    #[serde(default = "default_delivery_queue_capacity")]
    pub delivery_queue_capacity: usize,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,
    #[serde(default = "default_smtp_use_tls")]
    pub smtp_use_tls: bool,
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default)]
    pub internal_token: Option<String>,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_delivery_workers() -> usize {
    4
}

fn default_delivery_queue_capacity() -> usize {
    1024
}

fn default_delivery_timeout_secs() -> u64 {
    10
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "SAMS <no-reply@sams.local>".to_string()
}

fn default_smtp_use_tls() -> bool {
    true
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_telemetry_service_name() -> String {
    "sams-notifications".to_string()
}

fn default_telemetry_service_version() -> String {
    "1.0.0".to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://otel-collector.observability.svc.cluster.local:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("database_max_connections", 5)?
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    /// Link placed in account mails.
    pub fn login_url(&self) -> String {
        format!("{}/login", self.app_url.trim_end_matches('/'))
    }

    /// `None` when mail delivery is disabled.
    pub fn smtp(&self) -> Option<SmtpConfig> {
        if self.smtp_host.trim().is_empty() {
            return None;
        }
        Some(SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone().filter(|u| !u.is_empty()),
            password: self.smtp_password.clone(),
            from: self.smtp_from.clone(),
            use_tls: self.smtp_use_tls,
            timeout: self.delivery_timeout(),
        })
    }
}

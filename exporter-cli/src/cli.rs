use std::time::Duration;

use clap::{Parser, ValueEnum};
use fritzbox_cable::RouterConfig;
use fritzbox_cable::config::{DEFAULT_BASE_URL, DEFAULT_USERNAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "fritzcable-exporter",
    version,
    about = "Prometheus exporter for FRITZ!Box Cable DOCSIS statistics",
    long_about = "Logs in to a FRITZ!Box Cable router on every scrape, reads the DOCSIS \
                  channel information and exposes it in the Prometheus text format."
)]
pub struct Args {
    /// Address to listen on; a bare `:port` listens on all interfaces
    #[arg(
        long = "web.listen-address",
        env = "FRITZCABLE_LISTEN_ADDRESS",
        default_value = ":9623"
    )]
    pub listen_address: String,

    /// Path under which metrics are exposed
    #[arg(
        long = "web.telemetry-path",
        env = "FRITZCABLE_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    pub telemetry_path: String,

    /// Base URI of the router's web interface
    #[arg(long = "client.scrape-uri", env = "FRITZCABLE_SCRAPE_URI", default_value = DEFAULT_BASE_URL)]
    pub scrape_uri: String,

    #[arg(long = "client.username", env = "FRITZCABLE_USERNAME", default_value = DEFAULT_USERNAME)]
    pub username: String,

    #[arg(long = "client.password", env = "FRITZCABLE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Timeout of every single router request, e.g. `50s`, `1500ms`, `1m`
    #[arg(
        long = "client.timeout",
        env = "FRITZCABLE_TIMEOUT",
        default_value = "50s",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Duration,

    /// Accept invalid TLS certificates from the router
    #[arg(long = "client.disable-cert", env = "FRITZCABLE_DISABLE_CERT")]
    pub disable_cert: bool,

    /// Log filter, overridden by RUST_LOG
    #[arg(long = "log.level", env = "FRITZCABLE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long = "log.format",
        env = "FRITZCABLE_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

impl Args {
    /// Address handed to the listener.
    pub fn bind_address(&self) -> String {
        let address = self.listen_address.trim();
        if address.starts_with(':') {
            format!("0.0.0.0{address}")
        } else {
            address.to_string()
        }
    }

    pub fn telemetry_path(&self) -> String {
        let path = self.telemetry_path.trim();
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig::new(self.scrape_uri.as_str())
            .with_credentials(self.username.as_str(), self.password.as_str())
            .with_timeout(self.timeout)
            .with_danger_accept_invalid_certs(self.disable_cert)
    }
}

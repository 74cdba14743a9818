//! Server configuration from command-line flags and environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::state::RetryPolicy;

pub const APP_NAME: &str = "lab-orders-server";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug, Clone)]
#[command(name = "lab-orders-server")]
#[command(version)]
#[command(about = "HTTP API for patients, the lab test catalog and lab orders", long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// SQLite database file, created if missing
    #[arg(long, env = "DATABASE_PATH", default_value = "lab-orders.db")]
    pub database_path: PathBuf,

    /// Retries for transient store failures (busy/locked)
    #[arg(long, env = "STORE_RETRIES", default_value_t = 3)]
    pub store_retries: u32,

    /// Initial backoff between retries, doubled on each attempt
    #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = 50)]
    pub retry_backoff_ms: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.store_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "lab_orders_server=info,lab_orders_core=info,tower_http=info"
}

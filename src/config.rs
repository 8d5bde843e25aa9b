use anyhow::Context;
use clap::Args;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing::info;

use crate::{
    notifications::{IdentityError, VapidIdentity, WebPushTransport, transport::DEFAULT_TTL},
    storage::{DeviceStore, FileDeviceStore, InMemoryDeviceStore},
};

/// Everything `serve` needs, built once from flags and environment.
#[derive(Debug, Clone, Args)]
pub struct Config {
    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub transport: TransportArgs,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Debug, Clone, Args)]
pub struct IdentityArgs {
    /// Contact address of the sender, with or without `mailto:`
    #[arg(long, env = "WEBPUSH_MAILTO")]
    pub mailto: String,

    /// VAPID public key (base64url). Must be given together with --private-key
    #[arg(long, env = "VAPID_PUBLIC_KEY")]
    pub public_key: Option<String>,

    /// VAPID private key (base64url). Must be given together with --public-key
    #[arg(long, env = "VAPID_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,
}

impl IdentityArgs {
    pub fn identity(&self) -> Result<VapidIdentity, IdentityError> {
        VapidIdentity::create(
            &self.mailto,
            self.public_key.as_deref(),
            self.private_key.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Directory holding one JSON file per subscribed device
    #[arg(long, env = "DEVICES_DIR", default_value = "notification_clients")]
    pub devices_dir: PathBuf,

    /// Where device records live: `file` or `memory`
    #[arg(long, env = "STORAGE_BACKEND", default_value = "file")]
    pub storage_backend: String,
}

#[derive(Debug, Clone, Args)]
pub struct TransportArgs {
    /// Upper bound on a single push request
    #[arg(long, env = "PUSH_TIMEOUT_SECS", default_value_t = 30)]
    pub push_timeout_secs: u64,

    /// Seconds the push service keeps an undelivered message
    #[arg(long, env = "PUSH_TTL", default_value_t = DEFAULT_TTL)]
    pub ttl: u32,
}

impl TransportArgs {
    pub fn transport(&self) -> anyhow::Result<WebPushTransport> {
        WebPushTransport::new(Duration::from_secs(self.push_timeout_secs), self.ttl)
            .context("Failed to build push HTTP client")
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0")]
    pub listen_addr: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Pause between storing a subscription and sending its confirmation push
    #[arg(long, env = "TEST_PUSH_DELAY_MS", default_value_t = 1000)]
    pub test_push_delay_ms: u64,
}

impl ServerArgs {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.listen_addr, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.listen_addr, self.port))
    }

    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.test_push_delay_ms)
    }
}

pub fn storage_config(args: &StoreArgs) -> anyhow::Result<Arc<dyn DeviceStore>> {
    match args.storage_backend.to_lowercase().as_str() {
        "file" => {
            info!(dir = %args.devices_dir.display(), "Using file storage backend");
            Ok(Arc::new(FileDeviceStore::new(&args.devices_dir)))
        }
        "memory" => {
            info!("Using in-memory storage backend");
            Ok(Arc::new(InMemoryDeviceStore::new()))
        }
        _ => {
            anyhow::bail!(
                "Invalid STORAGE_BACKEND: '{}'. Valid options are 'file' and 'memory'",
                args.storage_backend
            )
        }
    }
}

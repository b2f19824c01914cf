use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration, CLI flag > environment variable > default, the
/// same precedence every subcommand gets from `clap`'s `env` attribute.
#[derive(Parser, Debug, Clone)]
#[command(name = "iothub-serve")]
#[command(about = "IoT hub daemon: ingress, rule engine, fan-out, client manager")]
pub struct Config {
    /// gRPC listen address (business logic only; not mounted over a live
    /// transport by default — see DESIGN.md)
    #[arg(long, env = "IOTHUB_GRPC_ADDR", default_value = "0.0.0.0:9090")]
    pub grpc_addr: SocketAddr,

    /// HTTP listen address for the read-only operator surface
    #[arg(long, env = "IOTHUB_HTTP_ADDR", default_value = "0.0.0.0:9091")]
    pub http_addr: SocketAddr,

    /// NATS URL the ingress handler and fan-out publish/subscribe against
    #[arg(long, env = "NATS_URL", default_value = "nats://localhost:4222")]
    pub nats_url: String,

    /// Data directory holding the redb file
    #[arg(long, env = "IOTHUB_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Id of the root node; created on first boot if the database is empty
    #[arg(long, env = "IOTHUB_ROOT_ID", default_value = "root")]
    pub root_id: String,

    /// How often the client manager rescans the tree for new/removed client nodes
    #[arg(long, env = "IOTHUB_RESCAN_INTERVAL", default_value = "60")]
    pub rescan_interval_secs: u64,

    /// Enable the NATS ingress/fan-out subsystem
    #[arg(long, env = "IOTHUB_NATS_ENABLED", default_value = "true")]
    pub nats_enabled: bool,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("hub.redb")
    }

    pub fn ensure_data_dir(&self) -> anyhow::Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.root_id.is_empty() {
            errors.push("root_id must not be empty".to_string());
        }
        if self.rescan_interval_secs == 0 {
            errors.push("rescan_interval_secs must be greater than zero".to_string());
        }
        errors
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grpc_addr: "0.0.0.0:9090".parse().unwrap(),
            http_addr: "0.0.0.0:9091".parse().unwrap(),
            nats_url: "nats://localhost:4222".to_string(),
            data_dir: PathBuf::from("./data"),
            root_id: "root".to_string(),
            rescan_interval_secs: 60,
            nats_enabled: true,
        }
    }
}

pub mod doctor;
pub mod edge;
pub mod node;
pub mod stats;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "iothub")]
#[command(version, about = "IoT hub: node/edge/point tree over NATS")]
pub struct Cli {
    /// Path to the data directory (overrides IOTHUB_DATA_DIR)
    #[arg(long, global = true, env = "IOTHUB_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Hub gRPC address for remote client commands
    #[arg(long, global = true, env = "IOTHUB_ADDR", default_value = "http://localhost:9090")]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemon (NATS ingress, rule engine, client manager, HTTP surface)
    Serve,
    /// Node operations
    #[command(subcommand)]
    Node(NodeCommands),
    /// Edge operations
    #[command(subcommand)]
    Edge(EdgeCommands),
    /// Tree statistics
    Stats,
    /// Diagnose database issues
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    Get(NodeGetArgs),
    List(NodeListArgs),
    Create(NodeCreateArgs),
    Delete(NodeDeleteArgs),
}

#[derive(Subcommand, Debug)]
pub enum EdgeCommands {
    List(EdgeListArgs),
    Create(EdgeCreateArgs),
}

#[derive(Args, Debug)]
pub struct NodeGetArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct NodeListArgs {
    #[arg(long)]
    pub r#type: Option<String>,
    #[arg(long, default_value = "50")]
    pub limit: u32,
}

#[derive(Args, Debug)]
pub struct NodeCreateArgs {
    #[arg(long)]
    pub r#type: String,
}

#[derive(Args, Debug)]
pub struct NodeDeleteArgs {
    pub id: String,
    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct EdgeListArgs {
    pub node: String,
}

#[derive(Args, Debug)]
pub struct EdgeCreateArgs {
    #[arg(long)]
    pub up: String,
    #[arg(long)]
    pub down: String,
}

pub async fn grpc_connect(server: &str) -> anyhow::Result<iothub_client::HubClient> {
    iothub_client::HubClient::connect(server.to_string())
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to hub at {server}: {e}\nIs `iothub serve` running?"))
}

pub fn print_node_table(nodes: &[iothub_proto::Node]) {
    if nodes.is_empty() {
        println!("(no results)");
        return;
    }
    println!("{:<40}  {:<12}  POINTS", "ID", "TYPE");
    println!("{}", "─".repeat(70));
    for n in nodes {
        println!("{:<40}  {:<12}  {}", n.id, n.r#type, n.points.len());
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max - 1).collect::<String>())
    }
}

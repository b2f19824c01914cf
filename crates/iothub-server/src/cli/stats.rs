use crate::cli::grpc_connect;
use anyhow::Result;

pub async fn run(server: &str) -> Result<()> {
    let mut client = grpc_connect(server).await?;
    let resp = client.stats().await?;

    println!();
    println!("Hub Tree Overview");
    println!("{}", "─".repeat(40));
    println!("Nodes: {:>8}", resp.node_count);
    println!("Edges: {:>8}", resp.edge_count);
    println!("{}", "─".repeat(40));
    println!();

    Ok(())
}

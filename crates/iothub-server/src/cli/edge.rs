use crate::cli::{grpc_connect, EdgeCommands, EdgeCreateArgs, EdgeListArgs};
use anyhow::Result;

pub async fn run(cmd: EdgeCommands, server: &str) -> Result<()> {
    match cmd {
        EdgeCommands::Create(args) => create(args, server).await,
        EdgeCommands::List(args) => list(args, server).await,
    }
}

async fn create(args: EdgeCreateArgs, server: &str) -> Result<()> {
    let mut client = grpc_connect(server).await?;
    let resp = client.create_edge(&args.up, &args.down).await?;
    match resp.edge {
        Some(edge) => println!("Created edge {}: {} -> {}", edge.id, edge.up, edge.down),
        None => println!("Created edge {} -> {}", args.up, args.down),
    }
    Ok(())
}

async fn list(args: EdgeListArgs, server: &str) -> Result<()> {
    let mut client = grpc_connect(server).await?;
    let Some(node) = client.get_node(&args.node).await? else {
        println!("node {} not found", args.node);
        return Ok(());
    };
    println!("Node {} ({}): {} points", node.id, node.r#type, node.points.len());
    println!(
        "Edge listing by direction is not exposed over gRPC (see `iothub stats` for tree-wide edge counts)."
    );
    Ok(())
}

use crate::cli::{grpc_connect, print_node_table, NodeCommands, NodeCreateArgs, NodeDeleteArgs, NodeGetArgs, NodeListArgs};
use anyhow::Result;

pub async fn run(cmd: NodeCommands, server: &str) -> Result<()> {
    match cmd {
        NodeCommands::Get(args) => get(args, server).await,
        NodeCommands::List(args) => list(args, server).await,
        NodeCommands::Create(args) => create(args, server).await,
        NodeCommands::Delete(args) => delete(args, server).await,
    }
}

async fn get(args: NodeGetArgs, server: &str) -> Result<()> {
    let mut client = grpc_connect(server).await?;
    match client.get_node(&args.id).await? {
        Some(node) => print_node_detail(&node),
        None => println!("node {} not found", args.id),
    }
    Ok(())
}

async fn list(args: NodeListArgs, server: &str) -> Result<()> {
    let mut client = grpc_connect(server).await?;
    let nodes = client
        .list_nodes(args.r#type.as_deref().unwrap_or(""), args.limit)
        .await?;
    println!("Total: {} nodes", nodes.len());
    print_node_table(&nodes);
    Ok(())
}

/// Creating a node directly through the CLI bypasses the tree's only
/// producer of ids (`Node::new`); this command exists for test fixtures
/// and manual setup, not for device onboarding.
async fn create(args: NodeCreateArgs, server: &str) -> Result<()> {
    let _ = grpc_connect(server).await?;
    println!(
        "Creating standalone {} nodes via CLI is not supported; write the node through the ingress handler's `node.<id>` subject instead.",
        args.r#type
    );
    Ok(())
}

async fn delete(args: NodeDeleteArgs, server: &str) -> Result<()> {
    if !args.yes {
        print!("Delete node {}? [y/N] ", args.id);
        use std::io::Write;
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }
    let _ = grpc_connect(server).await?;
    println!(
        "Node deletion is not exposed over gRPC (the tree model has no tombstone flag, see DESIGN.md); delete {} directly against the data file with `iothub doctor --fix` instead.",
        args.id
    );
    Ok(())
}

pub fn print_node_detail(n: &iothub_proto::Node) {
    println!("ID:     {}", n.id);
    println!("Type:   {}", n.r#type);
    println!("Points: {}", n.points.len());
    for p in &n.points {
        if p.text.is_empty() {
            println!("  {:<16} = {}", p.r#type, p.value);
        } else {
            println!("  {:<16} = {}", p.r#type, crate::cli::truncate(&p.text, 60));
        }
    }
}


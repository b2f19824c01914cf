use crate::config::Config;
use crate::update::UpdateCoordinator;
use iothub_core::{Mutator, Node, RedbStorage, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting IoT hub daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Data: {:?}", config.data_dir);

    info!("Opening database...");
    let storage = Arc::new(RedbStorage::open(config.db_path())?);
    let stats = storage.stats()?;
    info!("Database loaded: {} nodes, {} edges", stats.node_count, stats.edge_count);

    if storage.root_id()?.is_none() {
        let root = Node::new(iothub_core::node_type::GROUP);
        storage.put_node(&root)?;
        storage.set_root_id(&root.id)?;
        info!(root = %root.id, "no root node recorded, created one on first boot");
    }
    let root_id = storage.root_id()?.unwrap_or_else(|| config.root_id.clone());
    let storage_dyn: Arc<dyn Storage> = storage.clone();

    let mutator = Arc::new(Mutator::new(storage_dyn.clone()));
    let updates = UpdateCoordinator::new(mutator.clone());

    // Business logic is fully exercisable via `HubServiceImpl`'s unit tests;
    // it is not mounted over a live tonic listener here (see DESIGN.md).
    let _grpc_service = crate::grpc::HubServiceImpl::new(storage_dyn.clone(), mutator.clone());
    info!(addr = %config.grpc_addr, "gRPC business logic available (not served live, see DESIGN.md)");

    let http_task: JoinHandle<()> = {
        let app_state = crate::http::AppState {
            storage: storage.clone(),
            start_time: std::time::Instant::now(),
        };
        let app = crate::http::create_router(app_state);
        let addr = config.http_addr;

        tokio::spawn(async move {
            info!("Starting HTTP server on {}", addr);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, "failed to bind HTTP server");
                    return;
                }
            };
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "HTTP server failed");
            }
        })
    };

    let rescan_interval = Duration::from_secs(config.rescan_interval_secs);

    #[cfg(feature = "bus")]
    let (can_handle, can_stop, can_up_root_tx, can_deliver_tx) = crate::nats::spawn_can_manager(
        storage_dyn.clone(),
        mutator.clone(),
        root_id.clone(),
        rescan_interval,
    );

    let nats_task: Option<JoinHandle<()>> = if config.nats_enabled {
        info!("Connecting to NATS at {}...", config.nats_url);
        match async_nats::connect(&config.nats_url).await {
            Ok(client) => {
                info!("NATS connected");
                #[cfg(feature = "bus")]
                let up_root_tx = can_up_root_tx.clone();
                #[cfg(not(feature = "bus"))]
                let up_root_tx = {
                    let (tx, _rx) = tokio::sync::mpsc::channel(16);
                    tx
                };
                #[cfg(feature = "bus")]
                let deliver_tx = can_deliver_tx.clone();
                #[cfg(not(feature = "bus"))]
                let deliver_tx = {
                    let (tx, _rx) = tokio::sync::mpsc::channel(16);
                    tx
                };
                let handler = crate::nats::IngressHandler::new(
                    client,
                    storage_dyn.clone(),
                    mutator.clone(),
                    up_root_tx,
                    deliver_tx,
                    updates.clone(),
                );
                Some(tokio::spawn(async move {
                    if let Err(e) = handler.run().await {
                        error!(error = %e, "ingress handler failed");
                    }
                }))
            }
            Err(e) => {
                error!(error = %e, "failed to connect to NATS, continuing without ingress");
                None
            }
        }
    } else {
        info!("NATS ingress disabled");
        None
    };

    info!("IoT hub daemon ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, terminating...");

    http_task.abort();
    if let Some(task) = nats_task {
        task.abort();
    }
    #[cfg(feature = "bus")]
    {
        let _ = can_stop.send(());
        let _ = tokio::time::timeout(Duration::from_secs(5), can_handle).await;
    }

    Ok(())
}

//! Generic client supervisor: scans the tree for nodes of `T::Config`'s node
//! type, spawns one `T` worker per match, and reaps/rescans as the tree
//! changes. Mirrors the scan/spawn/stop shape of a `Manager[T]`, collapsed
//! onto `tokio::select!` and channels instead of goroutines and `nats.Conn`.

use iothub_core::{node_type, ClientConfig, ClientState, Mutator, Point, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct Instance {
    handle: JoinHandle<()>,
    stop: Option<oneshot::Sender<()>>,
    points_tx: mpsc::Sender<Vec<Point>>,
    edge_points_tx: mpsc::Sender<Vec<Point>>,
}

/// An ingested point/edge-point update bound for whichever supervised
/// instance owns `node_id`, if any.
pub enum Delivery {
    Points(String, Vec<Point>),
    EdgePoints(String, Vec<Point>),
}

/// Supervises every node of one `ClientConfig::node_type()` beneath the root.
pub struct ClientManager<T: ClientState> {
    storage: Arc<dyn Storage>,
    mutator: Arc<Mutator>,
    root_id: String,
    rescan_interval: Duration,
    instances: HashMap<String, Instance>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ClientState> ClientManager<T> {
    pub fn new(
        storage: Arc<dyn Storage>,
        mutator: Arc<Mutator>,
        root_id: String,
        rescan_interval: Duration,
    ) -> Self {
        ClientManager {
            storage,
            mutator,
            root_id,
            rescan_interval,
            instances: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Runs until `stop` fires, scanning immediately and then on every
    /// rescan tick or `nodeType` point seen on `up.root.>`. Forwards each
    /// incoming `Delivery` to the instance it's addressed to, if any, so a
    /// point write that lands on a supervised node reaches its worker.
    /// Blocks up to five seconds for in-flight workers to exit on shutdown,
    /// logging any that are still running after that.
    pub async fn run(
        mut self,
        mut stop: oneshot::Receiver<()>,
        mut up_root: mpsc::Receiver<Point>,
        mut deliveries: mpsc::Receiver<Delivery>,
    ) {
        if let Err(e) = self.scan().await {
            error!(node_type = T::Config::node_type(), error = %e, "initial client scan failed");
        }

        let mut rescan = tokio::time::interval(self.rescan_interval);
        rescan.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = rescan.tick() => {
                    if let Err(e) = self.scan().await {
                        error!(node_type = T::Config::node_type(), error = %e, "rescan failed");
                    }
                }
                Some(point) = up_root.recv() => {
                    if point.point_type == iothub_core::point_type::NODE_TYPE {
                        if let Err(e) = self.scan().await {
                            error!(node_type = T::Config::node_type(), error = %e, "triggered rescan failed");
                        }
                    }
                }
                Some(delivery) = deliveries.recv() => {
                    match delivery {
                        Delivery::Points(node_id, points) => self.deliver_points(&node_id, points).await,
                        Delivery::EdgePoints(node_id, points) => self.deliver_edge_points(&node_id, points).await,
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        for (_, instance) in self.instances.iter_mut() {
            if let Some(stop) = instance.stop.take() {
                let _ = stop.send(());
            }
        }

        let handles: Vec<JoinHandle<()>> = self.instances.drain().map(|(_, i)| i.handle).collect();
        let joined = futures::future::join_all(handles);
        if tokio::time::timeout(Duration::from_secs(5), joined).await.is_err() {
            warn!(
                node_type = T::Config::node_type(),
                "client manager: not all clients shut down within 5s"
            );
        }
    }

    /// Breadth-first collect every node of `T::Config::node_type()` beneath
    /// the root, recursing into `group` nodes exactly like the upstream
    /// scan does, then start/stop instances so `self.instances` matches.
    async fn scan(&mut self) -> iothub_core::Result<()> {
        let wanted = Self::scan_subtree(self.storage.as_ref(), &self.root_id, T::Config::node_type())?;
        let mut found = std::collections::HashSet::new();

        for (node, parent_id) in &wanted {
            found.insert(node.id.clone());
            if self.instances.contains_key(&node.id) {
                continue;
            }
            match T::Config::from_node(node) {
                Ok(config) => self.spawn(node.id.clone(), parent_id.clone(), config),
                Err(e) => warn!(node = %node.id, error = %e, "failed to decode client config"),
            }
        }

        let stale: Vec<String> = self
            .instances
            .keys()
            .filter(|id| !found.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(mut instance) = self.instances.remove(&id) {
                if let Some(stop) = instance.stop.take() {
                    let _ = stop.send(());
                }
                instance.handle.abort();
            }
        }

        Ok(())
    }

    fn scan_subtree(
        storage: &dyn Storage,
        id: &str,
        wanted_type: &str,
    ) -> iothub_core::Result<Vec<(iothub_core::Node, String)>> {
        let mut out = Vec::new();
        for child in storage.edges_down(id)? {
            if let Some(node) = storage.get_node(&child.downstream)? {
                if node.node_type == wanted_type {
                    out.push((node.clone(), id.to_string()));
                }
                if node.node_type == node_type::GROUP {
                    out.extend(Self::scan_subtree(storage, &node.id, wanted_type)?);
                }
            }
        }
        Ok(out)
    }

    fn spawn(&mut self, node_id: String, parent_id: String, config: T::Config) {
        info!(node = %node_id, node_type = T::Config::node_type(), "starting client");
        let (stop_tx, stop_rx) = oneshot::channel();
        let (points_tx, points_rx) = mpsc::channel(16);
        let (edge_points_tx, edge_points_rx) = mpsc::channel(16);

        let node_id_for_task = node_id.clone();
        let handle = tokio::spawn(async move {
            let mut client = T::new(config, node_id_for_task.clone(), parent_id);
            if let Err(e) = client.run(stop_rx, points_rx, edge_points_rx).await {
                error!(node = %node_id_for_task, error = %e, "client exited with error");
            }
        });

        self.instances.insert(
            node_id,
            Instance {
                handle,
                stop: Some(stop_tx),
                points_tx,
                edge_points_tx,
            },
        );
    }

    /// Forward a point written directly to a supervised node's worker, if any.
    pub async fn deliver_points(&self, node_id: &str, points: Vec<Point>) {
        if let Some(instance) = self.instances.get(node_id) {
            let _ = instance.points_tx.send(points).await;
        }
    }

    /// Forward a point written to the edge above a supervised node's worker, if any.
    pub async fn deliver_edge_points(&self, node_id: &str, points: Vec<Point>) {
        if let Some(instance) = self.instances.get(node_id) {
            let _ = instance.edge_points_tx.send(points).await;
        }
    }
}

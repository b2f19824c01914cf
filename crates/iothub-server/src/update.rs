//! Software update subsystem: downloads a file over HTTP to a device node,
//! reporting progress as points so clients can watch `swUpdatePercentDone`
//! without polling. One update per node id at a time.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use iothub_core::{point_type, HubError, Mutator, Point, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[derive(Clone)]
pub struct UpdateCoordinator {
    mutator: Arc<Mutator>,
    http: reqwest::Client,
    in_flight: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl UpdateCoordinator {
    pub fn new(mutator: Arc<Mutator>) -> Self {
        UpdateCoordinator {
            mutator,
            http: reqwest::Client::new(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Begin a download for `node_id`, reporting progress on that node's
    /// points. Returns immediately; the transfer runs on a spawned task.
    /// Rejects a second update for a node that already has one running.
    pub fn start_update(&self, node_id: String, url: String) -> Result<()> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if in_flight.contains_key(&node_id) {
                return Err(HubError::UpdateInProgress(node_id));
            }
            in_flight.insert(node_id.clone(), Utc::now());
        }

        self.set_state(&node_id, true, 0, None);

        let coordinator = self.clone();
        tokio::spawn(async move {
            let result = coordinator.download(&node_id, &url).await;
            coordinator.in_flight.lock().unwrap().remove(&node_id);
            match result {
                Ok(()) => coordinator.set_state(&node_id, false, 100, None),
                Err(e) => {
                    error!(node = %node_id, error = %e, "software update failed");
                    coordinator.set_state(&node_id, false, 0, Some("error updating software".into()));
                }
            }
        });

        Ok(())
    }

    async fn download(&self, node_id: &str, url: &str) -> Result<()> {
        info!(node = %node_id, %url, "starting software update download");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| HubError::Transport(e.to_string()))?;
            received += chunk.len() as u64;
            if let Some(total) = total {
                if total > 0 {
                    let percent = ((received as f64 / total as f64) * 100.0) as i64;
                    self.set_state(node_id, true, percent, None);
                }
            }
        }
        Ok(())
    }

    fn set_state(&self, node_id: &str, running: bool, percent: i64, error: Option<String>) {
        let points = vec![
            Point::new(point_type::SW_UPDATE_RUNNING, if running { 1.0 } else { 0.0 }),
            Point::new(point_type::SW_UPDATE_PERCENT, percent as f64),
            Point::new_text(point_type::SW_UPDATE_ERROR, error.unwrap_or_default()),
        ];
        if let Err(e) = self.mutator.write_points(node_id, &points) {
            error!(node = %node_id, error = %e, "failed to write software update state points");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iothub_core::{Node, RedbStorage, Storage};
    use tempfile::TempDir;

    fn harness() -> (UpdateCoordinator, iothub_core::Node, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(RedbStorage::open(dir.path().join("hub.redb")).unwrap());
        let node = Node::new("device");
        storage.put_node(&node).unwrap();
        let mutator = Arc::new(Mutator::new(storage));
        (UpdateCoordinator::new(mutator), node, dir)
    }

    #[test]
    fn second_update_for_same_node_conflicts() {
        let (coordinator, node, _dir) = harness();
        coordinator
            .in_flight
            .lock()
            .unwrap()
            .insert(node.id.clone(), Utc::now());
        let err = coordinator
            .start_update(node.id.clone(), "http://localhost/fw.bin".into())
            .unwrap_err();
        assert_eq!(err.kind(), iothub_core::ErrorKind::Conflict);
    }
}

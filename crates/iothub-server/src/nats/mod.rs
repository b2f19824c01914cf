//! NATS ingress: subscribes to the four hub subjects and dispatches each
//! message to the mutator, rule engine, and fan-out paths.

use crate::manager::Delivery;
#[cfg(feature = "bus")]
use crate::manager::ClientManager;
use crate::sms;
use bincode;
#[cfg(feature = "bus")]
use bus_adapter::CanClient;
use futures::StreamExt;
use iothub_core::{
    fanout, node_type, point_type, rules, subjects, ActionType, HubError, Message, Mutator,
    Notification, Point, Result, Rule, Storage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

/// Rule cache keyed by rule node id, decoded lazily and kept in sync as
/// points arrive for a rule's conditions.
type RuleCache = RwLock<HashMap<String, Rule>>;

pub struct IngressHandler {
    client: async_nats::Client,
    storage: Arc<dyn Storage>,
    mutator: Arc<Mutator>,
    rules: Arc<RuleCache>,
    up_root_tx: mpsc::Sender<Point>,
    deliver_tx: mpsc::Sender<Delivery>,
    updates: crate::update::UpdateCoordinator,
}

impl IngressHandler {
    pub fn new(
        client: async_nats::Client,
        storage: Arc<dyn Storage>,
        mutator: Arc<Mutator>,
        up_root_tx: mpsc::Sender<Point>,
        deliver_tx: mpsc::Sender<Delivery>,
        updates: crate::update::UpdateCoordinator,
    ) -> Self {
        IngressHandler {
            client,
            storage,
            mutator,
            rules: Arc::new(RwLock::new(HashMap::new())),
            up_root_tx,
            deliver_tx,
            updates,
        }
    }

    /// Subscribe to `p.>`, `node.*`, `not.*`, `msg.*`, and `update.*` and
    /// process messages until the client disconnects or the task is aborted.
    pub async fn run(self) -> Result<()> {
        let mut points_sub = self
            .client
            .subscribe("p.>")
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        let mut node_sub = self
            .client
            .subscribe("node.*")
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        let mut not_sub = self
            .client
            .subscribe("not.*")
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        let mut msg_sub = self
            .client
            .subscribe("msg.*")
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        let mut update_sub = self
            .client
            .subscribe("update.*")
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;

        loop {
            tokio::select! {
                Some(msg) = points_sub.next() => self.handle_points(msg).await,
                Some(msg) = node_sub.next() => self.handle_node(msg).await,
                Some(msg) = not_sub.next() => self.handle_notification(msg).await,
                Some(msg) = msg_sub.next() => self.handle_message(msg).await,
                Some(msg) = update_sub.next() => self.handle_update(msg).await,
                else => break,
            }
        }
        Ok(())
    }

    async fn reply(&self, msg: &async_nats::Message, result: Result<Vec<u8>>) {
        let Some(reply) = msg.reply.clone() else { return };
        let payload = match result {
            Ok(bytes) => bytes,
            Err(e) => e.kind().as_str().as_bytes().to_vec(),
        };
        if let Err(e) = self.client.publish(reply, payload.into()).await {
            warn!(error = %e, "failed to publish reply");
        }
    }

    async fn handle_points(&self, msg: async_nats::Message) {
        // Subject shape: `p.<node_id>` or `p.<node_id>.<parent_id>` for edge points.
        let parts: Vec<&str> = msg.subject.as_str().splitn(3, '.').collect();
        let Some(&node_id) = parts.get(1) else { return };
        let parent_id = parts.get(2).copied();

        let points: Vec<Point> = match bincode::deserialize(&msg.payload) {
            Ok(p) => p,
            Err(e) => {
                self.reply(&msg, Err(HubError::Encode(e))).await;
                return;
            }
        };

        let write_result = match parent_id {
            Some(parent) => points
                .iter()
                .try_for_each(|p| self.mutator.write_edge_point(node_id, parent, p.clone())),
            None => self.mutator.write_points(node_id, &points),
        };

        if let Err(e) = write_result {
            error!(node = %node_id, error = %e, "failed to write points");
            self.reply(&msg, Err(e)).await;
            return;
        }

        let delivery = match parent_id {
            Some(_) => Delivery::EdgePoints(node_id.to_string(), points.clone()),
            None => Delivery::Points(node_id.to_string(), points.clone()),
        };
        let _ = self.deliver_tx.send(delivery).await;

        if let Err(e) = self.process_points_upstream(node_id, &points).await {
            error!(node = %node_id, error = %e, "failed to process points upstream");
        }

        if node_id == "root" || parent_id.is_none() {
            for point in &points {
                if point.point_type == iothub_core::point_type::NODE_TYPE {
                    let _ = self.up_root_tx.send(point.clone()).await;
                }
            }
        }

        self.reply(&msg, Ok(Vec::new())).await;
    }

    /// Walk from `node_id` up through its ancestors, and at each level
    /// evaluate that level's rule descendants against `points` and forward
    /// `points` to that level's `db` descendants, exactly as the upstream
    /// point-processing recursion does.
    async fn process_points_upstream(&self, node_id: &str, points: &[Point]) -> Result<()> {
        let mut current = node_id.to_string();
        loop {
            self.apply_rules_at(&current, node_id, points).await;
            self.write_to_db_descendants(&current, node_id, points).await;

            let parent = self
                .storage
                .edges_up(&current)?
                .into_iter()
                .find(|e| !e.is_root())
                .map(|e| e.upstream);
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        Ok(())
    }

    async fn apply_rules_at(&self, ancestor_id: &str, trigger_node_id: &str, points: &[Point]) {
        let rule_nodes = match self.storage.node_descendants(ancestor_id, Some(node_type::RULE), false) {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(node = %ancestor_id, error = %e, "failed to list rule descendants");
                return;
            }
        };

        for rule_node in rule_nodes {
            let rule_id = rule_node.id.clone();
            let mut rules = self.rules.write().await;
            let storage = self.storage.as_ref();
            let rule = rules
                .entry(rule_node.id.clone())
                .or_insert_with(|| rules::decode_rule(storage, &rule_node));

            if !rule.conditions.iter().any(|c| c.node_id.is_empty() || c.node_id == trigger_node_id) {
                continue;
            }

            // Conditions match against the node that produced the point, so
            // stamp it here rather than trusting publishers to set `key`.
            let keyed_points: Vec<Point> = points
                .iter()
                .cloned()
                .map(|mut p| {
                    p.key = trigger_node_id.to_string();
                    p
                })
                .collect();
            let became_active = rules::process_points(rule, &keyed_points);
            let actions: Vec<_> = rules::actions_to_run(rule, became_active).into_iter().cloned().collect();
            let description = rule.description.clone();
            for action in &actions {
                if let ActionType::Notification = &action.action_type {
                    let trigger_desc = self
                        .storage
                        .get_node(trigger_node_id)
                        .ok()
                        .flatten()
                        .and_then(|n| n.point_text(point_type::DESCRIPTION).map(str::to_string))
                        .unwrap_or_default();
                    let text = format!("{description} fired at {trigger_desc}");
                    if let Err(e) = self.publish_notification(&rule_id, &action.node_id, &text).await {
                        warn!(node = %action.node_id, error = %e, "failed to publish rule notification");
                    }
                } else if let Some(point) = rules::action_point(action) {
                    if let Err(e) = self.mutator.write_point(&action.node_id, point) {
                        warn!(node = %action.node_id, error = %e, "failed to apply rule action");
                    }
                }
            }
        }
    }

    async fn write_to_db_descendants(&self, ancestor_id: &str, trigger_node_id: &str, points: &[Point]) {
        let db_nodes = match self.storage.node_descendants(ancestor_id, Some(node_type::DB), false) {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(node = %ancestor_id, error = %e, "failed to list db descendants");
                return;
            }
        };

        use crate::timeseries::TimeSeriesSink;
        for db_node in db_nodes {
            let Some(config) = crate::timeseries::InfluxConfig::from_node(&db_node) else {
                continue;
            };
            let sink = crate::timeseries::InfluxLineProtocolSink::new(config);
            for point in points {
                if let Err(e) = sink.write_point(trigger_node_id, point).await {
                    warn!(db = %db_node.id, error = %e, "failed to write point to time-series db");
                }
            }
        }
    }

    /// Publish a notification on `not.<subject_id>` (the rule id that fired
    /// it), with `source_node` set to the action's target node, per the
    /// rule-engine action semantics.
    async fn publish_notification(&self, subject_id: &str, source_node: &str, text: &str) -> Result<()> {
        let notification = Notification {
            id: uuid::Uuid::now_v7().to_string(),
            parent: String::new(),
            source_node: source_node.to_string(),
            time: chrono::Utc::now(),
            subject: String::new(),
            message: text.to_string(),
        };
        let payload = bincode::serialize(&notification).map_err(HubError::from)?;
        self.client
            .publish(subjects::notification(subject_id), payload.into())
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }

    async fn handle_node(&self, msg: async_nats::Message) {
        let Some(node_id) = msg.subject.as_str().strip_prefix("node.") else { return };
        let result = self.storage.get_node(node_id).and_then(|n| {
            bincode::serialize(&n).map_err(HubError::from)
        });
        self.reply(&msg, result).await;
    }

    /// Resolve a notification for `node_id`'s recipient users and publish a
    /// `Message` to `node.<userID>.msg` for each recipient with a non-empty
    /// email or phone.
    async fn handle_notification(&self, msg: async_nats::Message) {
        let Some(node_id) = msg.subject.as_str().strip_prefix("not.") else { return };
        let notification: Notification = match bincode::deserialize(&msg.payload) {
            Ok(n) => n,
            Err(e) => {
                error!(node = %node_id, error = %e, "failed to decode notification payload");
                return;
            }
        };

        let targets = match fanout::notification_targets(self.storage.as_ref(), node_id) {
            Ok(targets) => targets,
            Err(e) => {
                error!(source = %node_id, error = %e, "notification fan-out failed");
                return;
            }
        };

        for user in &targets {
            let email = user.point_text(point_type::EMAIL).unwrap_or_default().to_string();
            let phone = user.point_text(point_type::PHONE).unwrap_or_default().to_string();
            if email.is_empty() && phone.is_empty() {
                continue;
            }

            let parent_id = self
                .first_parent(&user.id)
                .unwrap_or_else(|| notification.parent.clone());

            let message = Message {
                id: uuid::Uuid::now_v7().to_string(),
                user_id: user.id.clone(),
                parent_id,
                notification_id: notification.id.clone(),
                source_node: node_id.to_string(),
                time: chrono::Utc::now(),
                email,
                subject: notification.subject.clone(),
                message: notification.message.clone(),
                phone,
            };

            let payload = match bincode::serialize(&message) {
                Ok(p) => p,
                Err(e) => {
                    error!(user = %user.id, error = %e, "failed to encode message");
                    continue;
                }
            };
            if let Err(e) = self.client.publish(subjects::message(&user.id), payload.into()).await {
                warn!(user = %user.id, error = %e, "failed to publish message");
            }
        }

        info!(source = %node_id, recipients = targets.len(), "notification fanned out");
    }

    /// The id of the first non-root upstream parent of `node_id`, if any.
    fn first_parent(&self, node_id: &str) -> Option<String> {
        self.storage
            .edges_up(node_id)
            .ok()?
            .into_iter()
            .find(|e| !e.is_root())
            .map(|e| e.upstream)
    }

    /// Subject shape: `update.<node_id>`, payload is the firmware URL as
    /// UTF-8 bytes. Replies with the error kind if one is already running.
    async fn handle_update(&self, msg: async_nats::Message) {
        let Some(node_id) = msg.subject.as_str().strip_prefix("update.") else { return };
        let url = String::from_utf8_lossy(&msg.payload).into_owned();
        let result = self.updates.start_update(node_id.to_string(), url).map(|_| Vec::new());
        self.reply(&msg, result).await;
    }

    /// Resolve a user message's `msgService` targets and dispatch it through
    /// each service's configured provider (e.g. an SMS gateway).
    async fn handle_message(&self, msg: async_nats::Message) {
        let Some(node_id) = msg.subject.as_str().strip_prefix("msg.") else { return };
        let message: Message = match bincode::deserialize(&msg.payload) {
            Ok(m) => m,
            Err(e) => {
                error!(node = %node_id, error = %e, "failed to decode message payload");
                return;
            }
        };

        let targets = match fanout::message_targets(self.storage.as_ref(), node_id, &message.parent_id) {
            Ok(targets) => targets,
            Err(e) => {
                error!(source = %node_id, error = %e, "message fan-out failed");
                return;
            }
        };

        for service in &targets {
            if message.phone.is_empty() {
                continue;
            }
            if service.point_text(point_type::PROVIDER) != Some("twilio") {
                continue;
            }
            let provider = sms::provider_for_node(service);
            if let Err(e) = provider.send(&message.phone, &message.message).await {
                warn!(service = %service.id, error = %e, "failed to send SMS");
            }
        }

        info!(source = %node_id, services = targets.len(), "message fanned out to message services");
    }
}

/// Starts the CAN-bus client manager as a background task, if the `bus`
/// feature is enabled. Returns its supervisor join handle, its stop
/// channel, its `up.root.>` feed, and a `Delivery` sender the ingress
/// handler uses to forward ingested points to whichever supervised worker
/// owns them.
#[cfg(feature = "bus")]
pub fn spawn_can_manager(
    storage: Arc<dyn Storage>,
    mutator: Arc<Mutator>,
    root_id: String,
    rescan: std::time::Duration,
) -> (
    tokio::task::JoinHandle<()>,
    tokio::sync::oneshot::Sender<()>,
    mpsc::Sender<Point>,
    mpsc::Sender<Delivery>,
) {
    let manager: ClientManager<CanClient> = ClientManager::new(storage, mutator, root_id, rescan);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
    let (up_root_tx, up_root_rx) = mpsc::channel(16);
    let (deliver_tx, deliver_rx) = mpsc::channel(64);
    let handle = tokio::spawn(async move {
        manager.run(stop_rx, up_root_rx, deliver_rx).await;
    });
    (handle, stop_tx, up_root_tx, deliver_tx)
}

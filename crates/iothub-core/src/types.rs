use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root's upstream id: there is no edge above the root node.
pub const ROOT_UPSTREAM: &str = "none";

/// Well-known node type tags. The set is open — unrecognized tags flow
/// through the tree untouched, so this is a convention, not a closed enum.
pub mod node_type {
    pub const DEVICE: &str = "device";
    pub const USER: &str = "user";
    pub const GROUP: &str = "group";
    pub const RULE: &str = "rule";
    pub const CONDITION: &str = "condition";
    pub const ACTION: &str = "action";
    pub const DB: &str = "db";
    pub const MSG_SERVICE: &str = "msgService";
    pub const CAN_SOCKET: &str = "canSocket";
}

/// Well-known point type tags.
pub mod point_type {
    pub const DESCRIPTION: &str = "description";
    pub const VALUE: &str = "value";
    pub const VALUE_SET: &str = "valueSet";
    pub const ACTIVE: &str = "active";
    pub const TRIGGER: &str = "trigger";
    pub const NODE_TYPE: &str = "nodeType";
    pub const PORT: &str = "port";
    pub const BAUD: &str = "baud";
    pub const DISABLE: &str = "disable";
    pub const SW_UPDATE_RUNNING: &str = "swUpdateRunning";
    pub const SW_UPDATE_PERCENT: &str = "swUpdatePercentDone";
    pub const SW_UPDATE_ERROR: &str = "swUpdateError";

    // Condition/action node configuration. Conditions and actions live as
    // child nodes under a rule node rather than as fields on the rule
    // itself, same as every other configurable thing in the tree.
    pub const CONDITION_TYPE: &str = "conditionType";
    pub const ACTION_TYPE: &str = "actionType";
    pub const OPERATOR: &str = "operator";
    pub const REF_NODE_ID: &str = "nodeID";
    pub const REF_POINT_TYPE: &str = "pointType";
    pub const POINT_INDEX: &str = "pointIndex";
    pub const VALUE_TEXT: &str = "valueText";

    // `db` node configuration (time-series adapter endpoint).
    pub const DB_URL: &str = "url";
    pub const DB_ORG: &str = "org";
    pub const DB_BUCKET: &str = "bucket";
    pub const DB_TOKEN: &str = "token";

    // `user` node configuration (notification/message recipient).
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";

    // `msgService` node configuration (messaging adapter endpoint).
    pub const PROVIDER: &str = "provider";
    pub const SID: &str = "sid";
    pub const AUTH_TOKEN: &str = "authToken";
    pub const FROM: &str = "from";
}

/// A timestamped key/value sample produced by a device or derived by the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// What this point represents, e.g. "value", "description", "active".
    #[serde(rename = "type")]
    pub point_type: String,

    /// Optional discriminator for array-valued point sets. Empty when unused.
    #[serde(default)]
    pub id: String,

    /// Array index. -1 means unset/scalar.
    #[serde(default = "default_index")]
    pub index: i32,

    /// When the sample was taken.
    pub time: DateTime<Utc>,

    /// Numeric value.
    #[serde(default)]
    pub value: f64,

    /// Text value, used by point types whose payload isn't numeric.
    #[serde(default)]
    pub text: String,

    /// Free-form key, used by some adapters to carry an origin tag.
    #[serde(default)]
    pub key: String,
}

fn default_index() -> i32 {
    -1
}

impl Point {
    pub fn new(point_type: impl Into<String>, value: f64) -> Self {
        Point {
            point_type: point_type.into(),
            id: String::new(),
            index: -1,
            time: Utc::now(),
            value,
            text: String::new(),
            key: String::new(),
        }
    }

    pub fn new_text(point_type: impl Into<String>, text: impl Into<String>) -> Self {
        Point {
            point_type: point_type.into(),
            id: String::new(),
            index: -1,
            time: Utc::now(),
            value: 0.0,
            text: text.into(),
            key: String::new(),
        }
    }

    /// The (type, id, index) triple that point merge treats as the identity
    /// of a point within a point list.
    pub fn merge_key(&self) -> (&str, &str, i32) {
        (&self.point_type, &self.id, self.index)
    }
}

/// A node in the tree: a device, user, rule, condition, action, or any other
/// typed entity. Nodes are addressed by id everywhere else in the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: String,

    pub points: Vec<Point>,

    /// Deterministic function of this node's points and the hashes of the
    /// edges directly below it (to its children). Recomputed by the mutator
    /// on every write that touches this node or any node beneath it.
    #[serde(default)]
    pub hash: [u8; 32],
}

impl Node {
    pub fn new(node_type: impl Into<String>) -> Self {
        Node {
            id: Uuid::now_v7().to_string(),
            node_type: node_type.into(),
            points: Vec::new(),
            hash: [0u8; 32],
        }
    }

    pub fn point(&self, point_type: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.point_type == point_type)
    }

    pub fn point_value(&self, point_type: &str) -> Option<f64> {
        self.point(point_type).map(|p| p.value)
    }

    pub fn point_text(&self, point_type: &str) -> Option<&str> {
        self.point(point_type).map(|p| p.text.as_str())
    }
}

/// A directed link between two nodes. The upstream id of `""`/`"none"`
/// marks the root edge (no parent above it).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: String,

    #[serde(rename = "up")]
    pub upstream: String,

    #[serde(rename = "down")]
    pub downstream: String,

    pub points: Vec<Point>,

    #[serde(default)]
    pub hash: [u8; 32],
}

impl Edge {
    pub fn new(upstream: impl Into<String>, downstream: impl Into<String>) -> Self {
        Edge {
            id: Uuid::now_v7().to_string(),
            upstream: upstream.into(),
            downstream: downstream.into(),
            points: Vec::new(),
            hash: [0u8; 32],
        }
    }

    pub fn is_root(&self) -> bool {
        self.upstream.is_empty() || self.upstream == ROOT_UPSTREAM
    }
}

/// Condition comparison operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionType {
    PointValue,
    PointValueText,
    Schedule,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operator {
    GreaterThan,
    LessThan,
    Equal,
    NotEqual,
    Contains,
}

/// A single condition attached to a rule node, evaluated against a subset
/// of incoming points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub id: String,
    pub condition_type: ConditionType,
    pub operator: Operator,

    /// Which node/point this condition watches. Empty means "any".
    pub node_id: String,
    pub point_type: String,
    pub point_index: i32,

    pub value: f64,
    pub value_text: String,

    /// Whether this condition currently holds. Mutated in place as points
    /// are processed within a batch.
    pub active: bool,
}

/// Action kinds a rule can trigger once all of its conditions are active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ActionType {
    SetValue { point_type: String, value: f64 },
    SetValueText { point_type: String, text: String },

    /// Fires a `Notification` whose source is this action's target node and
    /// whose message is built at fire time from the rule's description and
    /// the triggering node's description — it carries no static config.
    Notification,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub id: String,
    pub node_id: String,
    pub action_type: ActionType,

    /// Re-trigger every evaluation pass instead of only on the
    /// inactive-to-active transition.
    pub trigger: bool,
}

/// A rule node's decoded conditions and actions, as cached by the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,

    /// Read from the rule node's own `description` point. Folded into the
    /// text of any notification the rule fires.
    pub description: String,

    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,

    /// Whether the rule as a whole is currently active (all conditions active).
    pub active: bool,
}

impl Rule {
    pub fn all_conditions_active(&self) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.active)
    }
}

/// A user-facing alert raised by a rule or device, routed to subscribed users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,

    /// The node the notification was addressed through (its immediate
    /// parent at the time it was raised). Carried onto any `Message`
    /// synthesised from this notification.
    #[serde(default)]
    pub parent: String,

    pub source_node: String,
    pub time: DateTime<Utc>,

    #[serde(default)]
    pub subject: String,

    pub message: String,
}

/// A message routed to an external message service (e.g. SMS) on behalf of
/// one recipient user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,

    /// The recipient user's node id.
    #[serde(default)]
    pub user_id: String,

    /// The user's parent at the time the originating notification fired.
    #[serde(default)]
    pub parent_id: String,

    /// The `Notification.id` this message was synthesised from.
    #[serde(default)]
    pub notification_id: String,

    pub source_node: String,
    pub time: DateTime<Utc>,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub subject: String,

    pub message: String,
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_edge_detection() {
        let e = Edge::new("", "dev1");
        assert!(e.is_root());
        let e = Edge::new(ROOT_UPSTREAM, "dev1");
        assert!(e.is_root());
        let e = Edge::new("parent", "dev1");
        assert!(!e.is_root());
    }

    #[test]
    fn point_merge_key_distinguishes_index() {
        let mut p1 = Point::new("value", 1.0);
        p1.id = "a".into();
        p1.index = 0;
        let mut p2 = p1.clone();
        p2.index = 1;
        assert_ne!(p1.merge_key(), p2.merge_key());
    }
}

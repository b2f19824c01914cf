use iothub_core::{
    fanout, node_type, point_type, rules, Edge, Mutator, Node, Point, RedbStorage, Rule, Storage,
};
use std::sync::Arc;
use tempfile::tempdir;

fn open(dir: &tempfile::TempDir) -> Arc<RedbStorage> {
    Arc::new(RedbStorage::open(dir.path().join("hub.redb")).unwrap())
}

// ── Storage persistence ──────────────────────────────────────────────────

#[test]
fn node_and_edge_survive_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hub.redb");

    let (device_id, parent_id) = {
        let storage = Arc::new(RedbStorage::open(&db_path).unwrap());
        let group = Node::new(node_type::GROUP);
        let device = Node::new(node_type::DEVICE);
        storage.put_node(&group).unwrap();
        storage.put_node(&device).unwrap();
        let mutator = Mutator::new(storage.clone());
        mutator.add_edge(Edge::new(group.id.clone(), device.id.clone())).unwrap();
        (device.id, group.id)
    };

    let storage = RedbStorage::open(&db_path).unwrap();
    let device = storage.get_node(&device_id).unwrap();
    assert!(device.is_some());
    let up = storage.edges_up(&device_id).unwrap();
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].upstream, parent_id);
}

// ── Cache-coherent mutator ────────────────────────────────────────────────

#[test]
fn write_point_propagates_hash_to_ancestor() {
    let dir = tempdir().unwrap();
    let storage = open(&dir);

    let root = Node::new(node_type::GROUP);
    let device = Node::new(node_type::DEVICE);
    storage.put_node(&root).unwrap();
    storage.put_node(&device).unwrap();

    let mutator = Mutator::new(storage.clone());
    let edge = mutator.add_edge(Edge::new(root.id.clone(), device.id.clone())).unwrap();
    let root_hash_before = storage.get_node(&root.id).unwrap().unwrap().hash;

    mutator.write_point(&device.id, Point::new(point_type::VALUE, 42.0)).unwrap();

    let root_hash_after = storage.get_node(&root.id).unwrap().unwrap().hash;
    assert_ne!(root_hash_before, root_hash_after, "a leaf write must change every ancestor's hash");

    let device_after = storage.get_node(&device.id).unwrap().unwrap();
    assert_eq!(device_after.points.iter().find(|p| p.point_type == point_type::VALUE).unwrap().value, 42.0);
    assert_eq!(edge.upstream, root.id);
}

// ── Rule engine: decode from tree, evaluate, run actions ─────────────────

#[test]
fn rule_fires_action_when_condition_crosses_threshold() {
    let dir = tempdir().unwrap();
    let storage = open(&dir);
    let mutator = Mutator::new(storage.clone());

    let sensor = Node::new(node_type::DEVICE);
    let target = Node::new(node_type::DEVICE);
    let rule_node = Node::new(node_type::RULE);
    storage.put_node(&sensor).unwrap();
    storage.put_node(&target).unwrap();
    storage.put_node(&rule_node).unwrap();

    let mut condition = Node::new(node_type::CONDITION);
    condition.points.push(Point::new_text(point_type::REF_NODE_ID, sensor.id.clone()));
    condition.points.push(Point::new_text(point_type::REF_POINT_TYPE, point_type::VALUE));
    condition.points.push(Point::new_text(point_type::OPERATOR, "greaterThan"));
    condition.points.push(Point::new(point_type::VALUE, 50.0));
    storage.put_node(&condition).unwrap();

    let mut action = Node::new(node_type::ACTION);
    action.points.push(Point::new_text(point_type::ACTION_TYPE, "setValue"));
    action.points.push(Point::new_text(point_type::REF_NODE_ID, target.id.clone()));
    action.points.push(Point::new_text(point_type::REF_POINT_TYPE, point_type::ACTIVE));
    action.points.push(Point::new(point_type::VALUE, 1.0));
    storage.put_node(&action).unwrap();

    mutator.add_edge(Edge::new(rule_node.id.clone(), condition.id.clone())).unwrap();
    mutator.add_edge(Edge::new(rule_node.id.clone(), action.id.clone())).unwrap();

    let mut rule: Rule = rules::decode_rule(storage.as_ref(), &rule_node);
    assert_eq!(rule.conditions.len(), 1);
    assert_eq!(rule.actions.len(), 1);

    let mut incoming = Point::new(point_type::VALUE, 75.0);
    incoming.key = sensor.id.clone();
    let became_active = rules::process_points(&mut rule, &[incoming]);
    assert!(became_active);
    assert!(rule.active);

    let actions: Vec<_> = rules::actions_to_run(&rule, became_active).into_iter().cloned().collect();
    assert_eq!(actions.len(), 1);
    let point = rules::action_point(&actions[0]).expect("setValue action always yields a point");
    mutator.write_point(&actions[0].node_id, point).unwrap();

    let target_after = storage.get_node(&target.id).unwrap().unwrap();
    assert_eq!(target_after.points.iter().find(|p| p.point_type == point_type::ACTIVE).unwrap().value, 1.0);
}

#[test]
fn decode_rule_reads_its_own_description_point() {
    let dir = tempdir().unwrap();
    let storage = open(&dir);

    let mut rule_node = Node::new(node_type::RULE);
    rule_node.points.push(Point::new_text(point_type::DESCRIPTION, "freezer too warm"));
    storage.put_node(&rule_node).unwrap();

    let rule = rules::decode_rule(storage.as_ref(), &rule_node);
    assert_eq!(rule.description, "freezer too warm");
}

#[test]
fn condition_with_no_matching_node_id_stays_inactive() {
    let dir = tempdir().unwrap();
    let storage = open(&dir);

    let rule_node = Node::new(node_type::RULE);
    storage.put_node(&rule_node).unwrap();
    let mut condition = Node::new(node_type::CONDITION);
    condition.points.push(Point::new_text(point_type::REF_NODE_ID, "some-other-node"));
    condition.points.push(Point::new(point_type::VALUE, 10.0));
    storage.put_node(&condition).unwrap();
    let mutator = Mutator::new(storage.clone());
    mutator.add_edge(Edge::new(rule_node.id.clone(), condition.id.clone())).unwrap();

    let mut rule = rules::decode_rule(storage.as_ref(), &rule_node);
    rules::process_points(&mut rule, &[Point::new(point_type::VALUE, 999.0)]);
    assert!(!rule.active, "a point from an unrelated node must not flip the condition");
}

// ── Notification / message fan-out ───────────────────────────────────────

#[test]
fn notification_reaches_users_in_ancestor_groups() {
    let dir = tempdir().unwrap();
    let storage = open(&dir);
    let mutator = Mutator::new(storage.clone());

    let group = Node::new(node_type::GROUP);
    let user = Node::new(node_type::USER);
    let device = Node::new(node_type::DEVICE);
    storage.put_node(&group).unwrap();
    storage.put_node(&user).unwrap();
    storage.put_node(&device).unwrap();

    mutator.add_edge(Edge::new(group.id.clone(), user.id.clone())).unwrap();
    mutator.add_edge(Edge::new(group.id.clone(), device.id.clone())).unwrap();

    let targets = fanout::notification_targets(storage.as_ref(), &device.id).unwrap();
    assert!(targets.iter().any(|n| n.id == user.id));
}

#[test]
fn message_fanout_is_scoped_to_first_level_parent() {
    let dir = tempdir().unwrap();
    let storage = open(&dir);
    let mutator = Mutator::new(storage.clone());

    let group_a = Node::new(node_type::GROUP);
    let group_b = Node::new(node_type::GROUP);
    let svc_a = Node::new(node_type::MSG_SERVICE);
    let svc_b = Node::new(node_type::MSG_SERVICE);
    let device = Node::new(node_type::DEVICE);

    for n in [&group_a, &group_b, &svc_a, &svc_b, &device] {
        storage.put_node(n).unwrap();
    }
    mutator.add_edge(Edge::new(group_a.id.clone(), svc_a.id.clone())).unwrap();
    mutator.add_edge(Edge::new(group_b.id.clone(), svc_b.id.clone())).unwrap();
    mutator.add_edge(Edge::new(group_a.id.clone(), device.id.clone())).unwrap();

    let targets = fanout::message_targets(storage.as_ref(), &device.id, &group_a.id).unwrap();
    assert!(targets.iter().any(|n| n.id == svc_a.id));
    assert!(!targets.iter().any(|n| n.id == svc_b.id), "a service under a sibling group must not receive the message");
}

use crate::error::Result;
use crate::storage::Storage;
use crate::types::{node_type, Node};
use std::collections::HashSet;

/// Resolve which user nodes a notification raised at `source_node_id`
/// should be delivered to.
///
/// If the source node is itself a user, the notification goes only to
/// that user — it does not walk the tree. Otherwise every ancestor of the
/// source is visited and each ancestor's user-typed descendants are
/// collected; a user reachable through more than one path may appear more
/// than once, matching the upstream behaviour of never deduplicating
/// notification recipients (unlike message-service recipients, see
/// [`message_targets`]).
pub fn notification_targets(storage: &dyn Storage, source_node_id: &str) -> Result<Vec<Node>> {
    let source = match storage.get_node(source_node_id)? {
        Some(n) => n,
        None => return Ok(Vec::new()),
    };

    if source.node_type == node_type::USER {
        return Ok(vec![source]);
    }

    let mut users = Vec::new();
    find_users(storage, source_node_id, &mut users)?;
    Ok(users)
}

fn find_users(storage: &dyn Storage, id: &str, out: &mut Vec<Node>) -> Result<()> {
    out.extend(storage.node_descendants(id, Some(node_type::USER), false)?);
    for edge in storage.edges_up(id)? {
        if edge.is_root() {
            continue;
        }
        find_users(storage, &edge.upstream, out)?;
    }
    Ok(())
}

/// Resolve which message-service nodes a message raised at `source_node_id`
/// (with the given immediate parent, `parent_id`, of the message's
/// originating user) should be delivered to.
///
/// The first level of the upward walk only follows `parent_id` — the
/// single parent the message was addressed through — rather than every
/// upstream edge of the source node. This avoids sending duplicate
/// messages through services attached to alternate groups a user also
/// belongs to. Every level above that walks all upstream edges. Results
/// are deduplicated by node id.
pub fn message_targets(
    storage: &dyn Storage,
    source_node_id: &str,
    parent_id: &str,
) -> Result<Vec<Node>> {
    let mut services = Vec::new();
    find_services(storage, source_node_id, Some(parent_id), &mut services)?;

    let mut seen = HashSet::new();
    services.retain(|n: &Node| seen.insert(n.id.clone()));
    Ok(services)
}

fn find_services(
    storage: &dyn Storage,
    id: &str,
    first_level_parent: Option<&str>,
    out: &mut Vec<Node>,
) -> Result<()> {
    out.extend(storage.node_descendants(id, Some(node_type::MSG_SERVICE), false)?);

    let up_ids: Vec<String> = match first_level_parent {
        Some(parent) => vec![parent.to_string()],
        None => storage
            .edges_up(id)?
            .into_iter()
            .filter(|e| !e.is_root())
            .map(|e| e.upstream)
            .collect(),
    };

    for up_id in up_ids {
        find_services(storage, &up_id, None, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Mutator;
    use crate::storage::RedbStorage;
    use crate::types::Edge;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn harness() -> (Arc<RedbStorage>, Mutator, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(RedbStorage::open(dir.path().join("hub.redb")).unwrap());
        let mutator = Mutator::new(storage.clone());
        (storage, mutator, dir)
    }

    #[test]
    fn notification_from_user_node_targets_only_that_user() {
        let (storage, _mutator, _dir) = harness();
        let user = Node::new(node_type::USER);
        storage.put_node(&user).unwrap();

        let targets = notification_targets(storage.as_ref(), &user.id).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, user.id);
    }

    #[test]
    fn notification_from_device_walks_up_to_group_users() {
        let (storage, mutator, _dir) = harness();
        let group = Node::new(node_type::GROUP);
        let user = Node::new(node_type::USER);
        let device = Node::new(node_type::DEVICE);
        storage.put_node(&group).unwrap();
        storage.put_node(&user).unwrap();
        storage.put_node(&device).unwrap();
        mutator.add_edge(Edge::new("", group.id.clone())).unwrap();
        mutator.add_edge(Edge::new(group.id.clone(), user.id.clone())).unwrap();
        mutator.add_edge(Edge::new(group.id.clone(), device.id.clone())).unwrap();

        let targets = notification_targets(storage.as_ref(), &device.id).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, user.id);
    }

    #[test]
    fn message_targets_first_level_uses_only_named_parent() {
        let (storage, mutator, _dir) = harness();
        let group_a = Node::new(node_type::GROUP);
        let group_b = Node::new(node_type::GROUP);
        let user = Node::new(node_type::USER);
        let svc_a = Node::new(node_type::MSG_SERVICE);
        let svc_b = Node::new(node_type::MSG_SERVICE);
        for n in [&group_a, &group_b, &user, &svc_a, &svc_b] {
            storage.put_node(n).unwrap();
        }
        mutator.add_edge(Edge::new("", group_a.id.clone())).unwrap();
        mutator.add_edge(Edge::new("", group_b.id.clone())).unwrap();
        mutator.add_edge(Edge::new(group_a.id.clone(), user.id.clone())).unwrap();
        mutator.add_edge(Edge::new(group_b.id.clone(), user.id.clone())).unwrap();
        mutator.add_edge(Edge::new(group_a.id.clone(), svc_a.id.clone())).unwrap();
        mutator.add_edge(Edge::new(group_b.id.clone(), svc_b.id.clone())).unwrap();

        let targets = message_targets(storage.as_ref(), &user.id, &group_a.id).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, svc_a.id);
    }
}

//! NATS subject helpers. Centralized so the ingress handler, client
//! manager, and fan-out all format subjects identically.

pub fn node_points(node_id: &str) -> String {
    format!("p.{node_id}")
}

pub fn edge_points(node_id: &str, parent_id: &str) -> String {
    format!("p.{node_id}.{parent_id}")
}

pub fn node(node_id: &str) -> String {
    format!("node.{node_id}")
}

pub fn node_children(node_id: &str) -> String {
    format!("node.{node_id}.*")
}

pub fn notification(node_id: &str) -> String {
    format!("not.{node_id}")
}

pub fn message(node_id: &str) -> String {
    format!("msg.{node_id}")
}

pub fn up_root() -> &'static str {
    "up.root.>"
}

pub fn software_update(node_id: &str) -> String {
    format!("update.{node_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_expected_subjects() {
        assert_eq!(node_points("n1"), "p.n1");
        assert_eq!(edge_points("n1", "p1"), "p.n1.p1");
        assert_eq!(node("n1"), "node.n1");
        assert_eq!(notification("n1"), "not.n1");
        assert_eq!(message("n1"), "msg.n1");
        assert_eq!(up_root(), "up.root.>");
        assert_eq!(software_update("n1"), "update.n1");
    }
}

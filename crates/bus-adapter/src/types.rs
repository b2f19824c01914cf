use iothub_core::{node_type, ClientConfig, HubError, Node, Result};

/// Configuration decoded from a `canSocket` node's points.
#[derive(Debug, Clone, PartialEq)]
pub struct CanSocketConfig {
    pub description: String,
    pub interface: String,
    pub bus_speed: u32,
    pub tx_queue_len: u32,
    pub disabled: bool,
}

impl Default for CanSocketConfig {
    fn default() -> Self {
        CanSocketConfig {
            description: String::new(),
            interface: "can0".to_string(),
            bus_speed: 500_000,
            tx_queue_len: 128,
            disabled: false,
        }
    }
}

impl ClientConfig for CanSocketConfig {
    fn node_type() -> &'static str {
        node_type::CAN_SOCKET
    }

    fn from_node(node: &Node) -> Result<Self> {
        if node.node_type != node_type::CAN_SOCKET {
            return Err(HubError::Invariant(format!(
                "node {} is not a {} node",
                node.id,
                node_type::CAN_SOCKET
            )));
        }

        let mut config = CanSocketConfig::default();
        for point in &node.points {
            match point.point_type.as_str() {
                t if t == iothub_core::point_type::DESCRIPTION => {
                    config.description = point.text.clone();
                }
                "interface" => config.interface = point.text.clone(),
                "busSpeed" => config.bus_speed = point.value as u32,
                "txQueueLen" => config.tx_queue_len = point.value as u32,
                t if t == iothub_core::point_type::DISABLE => {
                    config.disabled = point.value != 0.0;
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iothub_core::Point;

    #[test]
    fn decodes_known_points() {
        let mut node = Node::new(node_type::CAN_SOCKET);
        node.points.push(Point::new_text("interface", "can1"));
        node.points.push(Point::new("busSpeed", 250_000.0));
        let config = CanSocketConfig::from_node(&node).unwrap();
        assert_eq!(config.interface, "can1");
        assert_eq!(config.bus_speed, 250_000);
    }

    #[test]
    fn rejects_wrong_node_type() {
        let node = Node::new(node_type::DEVICE);
        assert!(CanSocketConfig::from_node(&node).is_err());
    }
}

//! Time-series adapter for `db` nodes: the external time-series database
//! the ingress handler forwards ancestor-node points to, kept behind a
//! trait so the handler doesn't care whether it's InfluxDB or nothing.

use async_trait::async_trait;
use iothub_core::{point_type, HubError, Node, Point, Result};

#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    async fn write_point(&self, node_id: &str, point: &Point) -> Result<()>;
}

/// Used where no `db` node is configured, and in tests.
pub struct NullSink;

#[async_trait]
impl TimeSeriesSink for NullSink {
    async fn write_point(&self, _node_id: &str, _point: &Point) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
}

impl InfluxConfig {
    /// Decode a `db` node's points into an Influx endpoint config. Returns
    /// `None` if the node has no `url` point — not a fully configured sink.
    pub fn from_node(node: &Node) -> Option<Self> {
        let url = text_point(node, point_type::DB_URL)?;
        Some(InfluxConfig {
            url,
            org: text_point(node, point_type::DB_ORG).unwrap_or_default(),
            bucket: text_point(node, point_type::DB_BUCKET).unwrap_or_default(),
            token: text_point(node, point_type::DB_TOKEN).unwrap_or_default(),
        })
    }
}

fn text_point(node: &Node, point_type: &str) -> Option<String> {
    node.points
        .iter()
        .find(|p| p.point_type == point_type)
        .map(|p| p.text.clone())
        .filter(|t| !t.is_empty())
}

/// Writes points as InfluxDB v2 line protocol over HTTP.
pub struct InfluxLineProtocolSink {
    http: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxLineProtocolSink {
    pub fn new(config: InfluxConfig) -> Self {
        InfluxLineProtocolSink { http: reqwest::Client::new(), config }
    }
}

#[async_trait]
impl TimeSeriesSink for InfluxLineProtocolSink {
    async fn write_point(&self, node_id: &str, point: &Point) -> Result<()> {
        let line = to_line_protocol(node_id, point);
        let url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=us",
            self.config.url.trim_end_matches('/'),
            self.config.org,
            self.config.bucket
        );
        self.http
            .post(&url)
            .bearer_auth(&self.config.token)
            .body(line)
            .send()
            .await
            .map_err(|e| HubError::Adapter(e.to_string()))?
            .error_for_status()
            .map_err(|e| HubError::Adapter(e.to_string()))?;
        Ok(())
    }
}

fn to_line_protocol(node_id: &str, point: &Point) -> String {
    format!(
        "{measurement},node={node} value={value} {time}",
        measurement = escape_tag(&point.point_type),
        node = escape_tag(node_id),
        value = point.value,
        time = point.time.timestamp_micros(),
    )
}

fn escape_tag(s: &str) -> String {
    s.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_config_from_node_points() {
        let mut node = Node::new("db");
        node.points.push(Point::new_text(point_type::DB_URL, "http://localhost:8086"));
        node.points.push(Point::new_text(point_type::DB_ORG, "hub"));
        node.points.push(Point::new_text(point_type::DB_BUCKET, "points"));
        let config = InfluxConfig::from_node(&node).unwrap();
        assert_eq!(config.url, "http://localhost:8086");
        assert_eq!(config.bucket, "points");
    }

    #[test]
    fn missing_url_yields_no_config() {
        let node = Node::new("db");
        assert!(InfluxConfig::from_node(&node).is_none());
    }

    #[test]
    fn line_protocol_escapes_spaces_and_commas() {
        let p = Point::new("room, a b", 1.0);
        let line = to_line_protocol("n1", &p);
        assert!(line.contains("room,\\ a\\ b"));
    }
}

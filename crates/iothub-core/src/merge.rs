use crate::types::Point;

/// Merge `incoming` points into `existing` in place.
///
/// A point's identity within the list is the triple (type, id, index).
/// A point whose identity already exists overwrites that entry; an unknown
/// identity is appended. This is idempotent: merging the same point twice
/// produces the same list as merging it once.
pub fn merge_points(existing: &mut Vec<Point>, incoming: &[Point]) {
    for point in incoming {
        let key = point.merge_key();
        if let Some(slot) = existing.iter_mut().find(|p| p.merge_key() == key) {
            *slot = point.clone();
        } else {
            existing.push(point.clone());
        }
    }
}

/// Same merge rule, named separately because edge points are merged against
/// an edge's point list rather than a node's — kept distinct so callers at
/// the ingress layer can route each point to the right target without
/// inspecting list provenance.
pub fn merge_edge_points(existing: &mut Vec<Point>, incoming: &[Point]) {
    merge_points(existing, incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn point(t: &str, id: &str, index: i32, value: f64) -> Point {
        Point {
            point_type: t.to_string(),
            id: id.to_string(),
            index,
            time: Utc::now(),
            value,
            text: String::new(),
            key: String::new(),
        }
    }

    #[test]
    fn merge_overwrites_same_identity() {
        let mut existing = vec![point("value", "", -1, 1.0)];
        merge_points(&mut existing, &[point("value", "", -1, 2.0)]);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].value, 2.0);
    }

    #[test]
    fn merge_appends_unknown_identity() {
        let mut existing = vec![point("value", "", -1, 1.0)];
        merge_points(&mut existing, &[point("description", "", -1, 0.0)]);
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn merge_distinguishes_by_index() {
        let mut existing = vec![point("value", "a", 0, 1.0)];
        merge_points(&mut existing, &[point("value", "a", 1, 9.0)]);
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut existing = vec![point("value", "", -1, 1.0)];
        let incoming = vec![point("value", "", -1, 5.0)];
        merge_points(&mut existing, &incoming);
        merge_points(&mut existing, &incoming);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].value, 5.0);
    }
}

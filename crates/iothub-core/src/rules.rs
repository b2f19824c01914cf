use crate::storage::Storage;
use crate::types::{node_type, point_type, Action, ActionType, Condition, ConditionType, Node, Operator, Point, Rule};
use tracing::warn;

/// Walk a rule node's `condition`/`action` children and decode them into a
/// `Rule`. A child that fails to decode is skipped and logged rather than
/// aborting the whole rule, matching the engine's log-and-skip policy
/// toward the rest of the ancestor walk.
pub fn decode_rule(storage: &dyn Storage, node: &Node) -> Rule {
    let mut conditions = Vec::new();
    let mut actions = Vec::new();

    let description = text_point(node, point_type::DESCRIPTION).unwrap_or_default();

    let children = match storage.edges_down(&node.id) {
        Ok(c) => c,
        Err(e) => {
            warn!(rule = %node.id, error = %e, "failed to list rule children");
            return Rule { id: node.id.clone(), description, conditions, actions, active: false };
        }
    };

    for edge in children {
        let child = match storage.get_node(&edge.downstream) {
            Ok(Some(n)) => n,
            Ok(None) => continue,
            Err(e) => {
                warn!(rule = %node.id, child = %edge.downstream, error = %e, "failed to load rule child");
                continue;
            }
        };

        match child.node_type.as_str() {
            node_type::CONDITION => conditions.push(decode_condition(&child)),
            node_type::ACTION => match decode_action(&child) {
                Some(a) => actions.push(a),
                None => warn!(rule = %node.id, action = %child.id, "action node missing actionType, skipped"),
            },
            _ => {}
        }
    }

    Rule { id: node.id.clone(), description, conditions, actions, active: false }
}

fn decode_condition(node: &Node) -> Condition {
    let condition_type = match text_point(node, point_type::CONDITION_TYPE).as_deref() {
        Some("pointValueText") => ConditionType::PointValueText,
        Some("schedule") => ConditionType::Schedule,
        _ => ConditionType::PointValue,
    };
    let operator = match text_point(node, point_type::OPERATOR).as_deref() {
        Some("lessThan") => Operator::LessThan,
        Some("equal") => Operator::Equal,
        Some("notEqual") => Operator::NotEqual,
        Some("contains") => Operator::Contains,
        _ => Operator::GreaterThan,
    };

    Condition {
        id: node.id.clone(),
        condition_type,
        operator,
        node_id: text_point(node, point_type::REF_NODE_ID).unwrap_or_default(),
        point_type: text_point(node, point_type::REF_POINT_TYPE).unwrap_or_default(),
        point_index: number_point(node, point_type::POINT_INDEX).map(|v| v as i32).unwrap_or(-1),
        value: number_point(node, point_type::VALUE).unwrap_or(0.0),
        value_text: text_point(node, point_type::VALUE_TEXT).unwrap_or_default(),
        active: number_point(node, point_type::ACTIVE).map(|v| v != 0.0).unwrap_or(false),
    }
}

fn decode_action(node: &Node) -> Option<Action> {
    let node_id = text_point(node, point_type::REF_NODE_ID).unwrap_or_default();
    let point_type_name = text_point(node, point_type::REF_POINT_TYPE).unwrap_or_default();
    let value = number_point(node, point_type::VALUE).unwrap_or(0.0);
    let text = text_point(node, point_type::VALUE_TEXT).unwrap_or_default();

    let action_type = match text_point(node, point_type::ACTION_TYPE).as_deref() {
        Some("setValue") => ActionType::SetValue { point_type: point_type_name, value },
        Some("setValueText") => ActionType::SetValueText { point_type: point_type_name, text },
        Some("notify") | Some("notification") => ActionType::Notification,
        _ => return None,
    };

    Some(Action {
        id: node.id.clone(),
        node_id,
        action_type,
        trigger: number_point(node, point_type::TRIGGER).map(|v| v != 0.0).unwrap_or(false),
    })
}

fn text_point(node: &Node, point_type: &str) -> Option<String> {
    node.points.iter().find(|p| p.point_type == point_type).map(|p| p.text.clone()).filter(|t| !t.is_empty())
}

fn number_point(node: &Node, point_type: &str) -> Option<f64> {
    node.points.iter().find(|p| p.point_type == point_type).map(|p| p.value)
}

/// Evaluate `point` against `condition`, mutating `condition.active` in
/// place. Conditions that don't apply to this point (node/type/index
/// mismatch) are left unchanged — a rule's active state reflects the last
/// point that touched each of its conditions, not just the current batch.
///
/// Mutating in place (rather than returning a new snapshot) means a second
/// point in the same ingest batch that touches the same rule sees the
/// latest condition state, matching the behaviour needed when a batch
/// contains more than one point against a single rule.
pub fn evaluate_condition(condition: &mut Condition, point: &Point) {
    if !condition.node_id.is_empty() && condition.node_id != point.key {
        return;
    }
    if !condition.point_type.is_empty() && condition.point_type != point.point_type {
        return;
    }
    if condition.point_index >= 0 && condition.point_index != point.index {
        return;
    }

    condition.active = match condition.condition_type {
        ConditionType::PointValue => match condition.operator {
            Operator::GreaterThan => point.value > condition.value,
            Operator::LessThan => point.value < condition.value,
            Operator::Equal => (point.value - condition.value).abs() < f64::EPSILON,
            Operator::NotEqual => (point.value - condition.value).abs() >= f64::EPSILON,
            Operator::Contains => {
                warn!(condition = %condition.id, "contains operator is not meaningful for numeric points");
                false
            }
        },
        ConditionType::PointValueText => {
            // Declared but unimplemented upstream: text-valued point
            // comparisons never flip a condition active. Logged once per
            // hit so a misconfigured rule is visible rather than silently
            // inert.
            warn!(
                condition = %condition.id,
                operator = ?condition.operator,
                "text-valued condition operators are not evaluated; condition stays inactive"
            );
            false
        }
        ConditionType::Schedule => condition.active,
    };
}

/// Evaluate every point in a batch against every condition of `rule`, in
/// point order, each point seeing the condition state left by the
/// previous one. Returns whether the rule's overall active state changed.
pub fn process_points(rule: &mut Rule, points: &[Point]) -> bool {
    let was_active = rule.all_conditions_active();
    for point in points {
        for condition in &mut rule.conditions {
            evaluate_condition(condition, point);
        }
    }
    let is_active = rule.all_conditions_active();
    rule.active = is_active;
    was_active != is_active
}

/// Actions to run given a rule's active-state transition. An action with
/// `trigger = true` fires on every evaluation pass; otherwise it only
/// fires on the inactive-to-active edge.
pub fn actions_to_run(rule: &Rule, became_active: bool) -> Vec<&Action> {
    if !rule.active {
        return Vec::new();
    }
    rule.actions
        .iter()
        .filter(|a| a.trigger || became_active)
        .collect()
}

/// Render a `setValue`/`setValueText` action into the point it writes, for
/// the caller to dispatch to the target node via the mutator. `notify`
/// actions don't write a point at all — the caller handles them by
/// publishing a `Notification` instead; see [`ActionType::Notification`].
pub fn action_point(action: &Action) -> Option<Point> {
    match &action.action_type {
        ActionType::SetValue { point_type, value } => Some(Point::new(point_type.clone(), *value)),
        ActionType::SetValueText { point_type, text } => {
            Some(Point::new_text(point_type.clone(), text.clone()))
        }
        ActionType::Notification => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn condition(op: Operator, value: f64) -> Condition {
        Condition {
            id: "c1".into(),
            condition_type: ConditionType::PointValue,
            operator: op,
            node_id: String::new(),
            point_type: "value".into(),
            point_index: -1,
            value,
            value_text: String::new(),
            active: false,
        }
    }

    fn point(value: f64) -> Point {
        Point {
            point_type: "value".into(),
            id: String::new(),
            index: -1,
            time: Utc::now(),
            value,
            text: String::new(),
            key: String::new(),
        }
    }

    #[test]
    fn greater_than_activates() {
        let mut c = condition(Operator::GreaterThan, 10.0);
        evaluate_condition(&mut c, &point(15.0));
        assert!(c.active);
        evaluate_condition(&mut c, &point(5.0));
        assert!(!c.active);
    }

    #[test]
    fn mismatched_point_type_leaves_condition_unchanged() {
        let mut c = condition(Operator::GreaterThan, 10.0);
        c.active = true;
        let mut other = point(999.0);
        other.point_type = "description".into();
        evaluate_condition(&mut c, &other);
        assert!(c.active);
    }

    #[test]
    fn text_operator_never_activates() {
        let mut c = condition(Operator::Equal, 0.0);
        c.condition_type = ConditionType::PointValueText;
        c.value_text = "open".into();
        let mut p = point(0.0);
        p.text = "open".into();
        evaluate_condition(&mut c, &p);
        assert!(!c.active);
    }

    #[test]
    fn rule_goes_active_only_when_all_conditions_active() {
        let mut rule = Rule {
            id: "r1".into(),
            description: String::new(),
            conditions: vec![condition(Operator::GreaterThan, 10.0), condition(Operator::LessThan, 100.0)],
            actions: vec![],
            active: false,
        };
        let changed = process_points(&mut rule, &[point(15.0)]);
        assert!(!rule.active);
        assert!(!changed);

        let changed = process_points(&mut rule, &[point(15.0)]);
        // second condition was never touched by a matching point with
        // point_type "value" above 10 and below 100 — it shares the same
        // point_type, so this point also satisfies condition 2.
        assert!(rule.active);
        assert!(changed);
    }

    #[test]
    fn second_point_in_batch_sees_first_points_update() {
        let mut rule = Rule {
            id: "r1".into(),
            description: String::new(),
            conditions: vec![condition(Operator::GreaterThan, 10.0)],
            actions: vec![],
            active: false,
        };
        process_points(&mut rule, &[point(1.0), point(20.0)]);
        assert!(rule.active);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// How a rule group's conditions combine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Logic {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// Comparison value as authored in the rule builder.
///
/// The builder sends free text, so numeric fields must accept `"1000"` as
/// well as `1000`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
}

impl RuleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RuleValue::Number(n) => Some(*n),
            RuleValue::Text(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RuleValue::Number(n) => n.to_string(),
            RuleValue::Text(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, RuleValue::Text(s) if s.trim().is_empty())
    }
}

impl From<f64> for RuleValue {
    fn from(n: f64) -> Self {
        RuleValue::Number(n)
    }
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        RuleValue::Text(s.to_string())
    }
}

/// A single `field operator value` condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Option<RuleValue>,
}

impl Condition {
    pub fn new(field: &str, operator: &str, value: impl Into<RuleValue>) -> Self {
        Self {
            field: field.to_string(),
            operator: operator.to_string(),
            value: Some(value.into()),
        }
    }

    /// Field, operator and value are all present.
    pub fn is_complete(&self) -> bool {
        !self.field.trim().is_empty()
            && !self.operator.trim().is_empty()
            && self.value.as_ref().is_some_and(|v| !v.is_blank())
    }
}

/// An ordered list of conditions tagged with a combinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleGroup {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl RuleGroup {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            logic: Logic::And,
            conditions,
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            logic: Logic::Or,
            conditions,
        }
    }
}

/// A named, persisted rule tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub rules: Vec<RuleGroup>,
    /// Snapshot taken when the segment was saved, not kept live
    pub audience_size: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Document for Segment {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_group_deserialization() {
        let json = r#"{
            "logic": "OR",
            "conditions": [
                {"field": "totalSpend", "operator": ">", "value": 1000},
                {"field": "visits", "operator": "<", "value": "3"}
            ]
        }"#;

        let group: RuleGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.logic, Logic::Or);
        assert_eq!(group.conditions[0].value, Some(RuleValue::Number(1000.0)));
        assert_eq!(group.conditions[1].value, Some(RuleValue::Text("3".into())));
    }

    #[test]
    fn test_logic_defaults_to_and() {
        let group: RuleGroup = serde_json::from_str(r#"{"conditions": []}"#).unwrap();
        assert_eq!(group.logic, Logic::And);
    }

    #[test]
    fn test_condition_completeness() {
        assert!(Condition::new("visits", ">", 2.0).is_complete());
        assert!(!Condition::new("", ">", 2.0).is_complete());
        assert!(!Condition::new("visits", "", 2.0).is_complete());
        assert!(!Condition::new("visits", ">", "  ").is_complete());

        let missing: Condition =
            serde_json::from_str(r#"{"field": "visits", "operator": ">"}"#).unwrap();
        assert!(!missing.is_complete());
    }

    #[test]
    fn test_rule_value_coercion() {
        assert_eq!(RuleValue::from("1000").as_f64(), Some(1000.0));
        assert_eq!(RuleValue::from(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(RuleValue::from("lots").as_f64(), None);
        assert_eq!(RuleValue::from(7.0).as_text(), "7");
    }
}

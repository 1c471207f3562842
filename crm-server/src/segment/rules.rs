//! Rule tree compilation.
//!
//! Rule groups as authored in the builder are compiled into a [`RuleExpr`]
//! tree of typed predicates. Evaluation lives in `evaluator`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Condition, Logic, RuleGroup, RuleValue};

/// How group combinators are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinatorPolicy {
    /// Every condition of every group is ANDed; `logic` is stored but has
    /// no effect. This is how the hosted CRM has always evaluated segments.
    #[default]
    Legacy,
    /// Each group combines its conditions with its own `logic`; groups are
    /// ANDed together.
    Honor,
}

impl FromStr for CombinatorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "and" => Ok(CombinatorPolicy::Legacy),
            "honor" | "honour" => Ok(CombinatorPolicy::Honor),
            other => Err(format!("unknown combinator policy '{}'", other)),
        }
    }
}

impl fmt::Display for CombinatorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinatorPolicy::Legacy => f.write_str("legacy"),
            CombinatorPolicy::Honor => f.write_str("honor"),
        }
    }
}

/// Customer attribute a condition refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    TotalSpend,
    Visits,
    LastActivity,
    Name,
    Email,
    Unknown(String),
}

impl Field {
    pub fn parse(name: &str) -> Field {
        match name.trim() {
            "totalSpend" => Field::TotalSpend,
            "visits" => Field::Visits,
            "lastActivity" => Field::LastActivity,
            "name" => Field::Name,
            "email" => Field::Email,
            other => Field::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
    Equal,
}

/// Comparison operand, already coerced to the field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Time(DateTime<Utc>),
    Text(String),
}

/// A leaf test against one customer.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: Field,
        op: Comparison,
        operand: Operand,
    },
    /// `lastActivity` strictly older than `days` before evaluation time
    InactiveFor { days: f64 },
    /// Field or value the store could never match, e.g. an unknown field
    Never,
}

/// Boolean expression over customer predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleExpr {
    AllOf(Vec<RuleExpr>),
    AnyOf(Vec<RuleExpr>),
    Condition(Predicate),
}

impl RuleExpr {
    /// Compile rule groups under `policy`.
    ///
    /// Conditions with an unknown operator are dropped. A group left with no
    /// conditions contributes nothing, so an all-ignored rule set matches
    /// every customer.
    pub fn compile(groups: &[RuleGroup], policy: CombinatorPolicy) -> RuleExpr {
        match policy {
            CombinatorPolicy::Legacy => RuleExpr::AllOf(
                groups
                    .iter()
                    .flat_map(|g| g.conditions.iter())
                    .filter_map(compile_condition)
                    .map(RuleExpr::Condition)
                    .collect(),
            ),
            CombinatorPolicy::Honor => RuleExpr::AllOf(
                groups
                    .iter()
                    .filter_map(|group| {
                        let leaves: Vec<RuleExpr> = group
                            .conditions
                            .iter()
                            .filter_map(compile_condition)
                            .map(RuleExpr::Condition)
                            .collect();
                        if leaves.is_empty() {
                            return None;
                        }
                        Some(match group.logic {
                            Logic::And => RuleExpr::AllOf(leaves),
                            Logic::Or => RuleExpr::AnyOf(leaves),
                        })
                    })
                    .collect(),
            ),
        }
    }

    /// Number of leaf predicates in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            RuleExpr::AllOf(children) | RuleExpr::AnyOf(children) => {
                children.iter().map(RuleExpr::leaf_count).sum()
            }
            RuleExpr::Condition(_) => 1,
        }
    }
}

/// Whether any group asks for OR semantics.
pub fn uses_or(groups: &[RuleGroup]) -> bool {
    groups.iter().any(|g| g.logic == Logic::Or)
}

fn compile_condition(condition: &Condition) -> Option<Predicate> {
    let Some(value) = condition.value.as_ref() else {
        debug!(field = %condition.field, "rule_condition_without_value");
        return Some(Predicate::Never);
    };

    let op = match condition.operator.trim() {
        ">" => Comparison::GreaterThan,
        "<" => Comparison::LessThan,
        "=" => Comparison::Equal,
        "inactive_for_days" => {
            return Some(match value.as_f64() {
                Some(days) if days.is_finite() => Predicate::InactiveFor { days },
                _ => Predicate::Never,
            });
        }
        other => {
            debug!(operator = %other, field = %condition.field, "rule_operator_ignored");
            return None;
        }
    };

    let field = Field::parse(&condition.field);
    let operand = match &field {
        Field::TotalSpend | Field::Visits => value.as_f64().map(Operand::Number),
        Field::LastActivity => parse_time(value).map(Operand::Time),
        Field::Name | Field::Email => Some(Operand::Text(value.as_text())),
        Field::Unknown(_) => None,
    };

    Some(match operand {
        Some(operand) => Predicate::Compare { field, op, operand },
        None => Predicate::Never,
    })
}

/// Accepts RFC 3339 text or epoch milliseconds.
fn parse_time(value: &RuleValue) -> Option<DateTime<Utc>> {
    match value {
        RuleValue::Number(ms) => Utc.timestamp_millis_opt(*ms as i64).single(),
        RuleValue::Text(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            }),
    }
}

/// Cutoff for `inactive_for_days`; fractional days are honoured.
///
/// `None` when the cutoff falls outside the representable time range.
pub fn inactivity_cutoff(now: DateTime<Utc>, days: f64) -> Option<DateTime<Utc>> {
    let millis = days * 86_400_000.0;
    // i64::MAX as f64 rounds up, so the bound is exclusive
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    now.checked_sub_signed(Duration::try_milliseconds(millis as i64)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(field: &str, op: &str, value: impl Into<RuleValue>) -> Condition {
        Condition::new(field, op, value)
    }

    #[test]
    fn test_legacy_flattens_all_groups() {
        let groups = vec![
            RuleGroup::any(vec![cond("totalSpend", ">", 100.0), cond("visits", ">", 2.0)]),
            RuleGroup::all(vec![cond("visits", "<", 10.0)]),
        ];

        let expr = RuleExpr::compile(&groups, CombinatorPolicy::Legacy);
        match &expr {
            RuleExpr::AllOf(children) => {
                assert_eq!(children.len(), 3);
                assert!(children.iter().all(|c| matches!(c, RuleExpr::Condition(_))));
            }
            other => panic!("expected AllOf, got {:?}", other),
        }
    }

    #[test]
    fn test_honor_builds_any_of_for_or_groups() {
        let groups = vec![
            RuleGroup::any(vec![cond("totalSpend", ">", 100.0), cond("visits", ">", 2.0)]),
            RuleGroup::all(vec![cond("visits", "<", 10.0)]),
        ];

        let expr = RuleExpr::compile(&groups, CombinatorPolicy::Honor);
        let RuleExpr::AllOf(children) = expr else {
            panic!("expected AllOf root");
        };
        assert!(matches!(&children[0], RuleExpr::AnyOf(leaves) if leaves.len() == 2));
        assert!(matches!(&children[1], RuleExpr::AllOf(leaves) if leaves.len() == 1));
    }

    #[test]
    fn test_unknown_operator_is_dropped() {
        let groups = vec![RuleGroup::all(vec![
            cond("totalSpend", "between", 100.0),
            cond("visits", ">", 1.0),
        ])];
        assert_eq!(
            RuleExpr::compile(&groups, CombinatorPolicy::Legacy).leaf_count(),
            1
        );

        let only_unknown = vec![RuleGroup::any(vec![cond("visits", "~", 1.0)])];
        assert_eq!(
            RuleExpr::compile(&only_unknown, CombinatorPolicy::Honor),
            RuleExpr::AllOf(vec![])
        );
    }

    #[test]
    fn test_unknown_field_never_matches() {
        assert_eq!(
            compile_condition(&cond("loyaltyTier", "=", "gold")),
            Some(Predicate::Never)
        );
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        assert_eq!(
            compile_condition(&cond("totalSpend", ">", "1000")),
            Some(Predicate::Compare {
                field: Field::TotalSpend,
                op: Comparison::GreaterThan,
                operand: Operand::Number(1000.0),
            })
        );
        assert_eq!(
            compile_condition(&cond("visits", ">", "often")),
            Some(Predicate::Never)
        );
    }

    #[test]
    fn test_inactive_for_days_ignores_field() {
        assert_eq!(
            compile_condition(&cond("visits", "inactive_for_days", "30")),
            Some(Predicate::InactiveFor { days: 30.0 })
        );
    }

    #[test]
    fn test_last_activity_operand_formats() {
        let rfc = compile_condition(&cond("lastActivity", "<", "2024-01-01T00:00:00Z"));
        let millis = compile_condition(&cond("lastActivity", "<", 1_704_067_200_000.0));
        assert_eq!(rfc, millis);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("Honor".parse(), Ok(CombinatorPolicy::Honor));
        assert_eq!("legacy".parse(), Ok(CombinatorPolicy::Legacy));
        assert!("sometimes".parse::<CombinatorPolicy>().is_err());
    }

    #[test]
    fn test_uses_or() {
        assert!(!uses_or(&[RuleGroup::all(vec![])]));
        assert!(uses_or(&[RuleGroup::all(vec![]), RuleGroup::any(vec![])]));
    }
}

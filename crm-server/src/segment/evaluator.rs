//! Rule evaluation against customers.

use chrono::{DateTime, Utc};

use crate::model::Customer;

use super::rules::{inactivity_cutoff, Comparison, Field, Operand, Predicate, RuleExpr};

impl RuleExpr {
    /// Whether `customer` satisfies the expression at time `now`.
    ///
    /// An empty `AllOf` is true. An empty `AnyOf` is false, but compilation
    /// never produces one.
    pub fn matches(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        match self {
            RuleExpr::AllOf(children) => children.iter().all(|c| c.matches(customer, now)),
            RuleExpr::AnyOf(children) => children.iter().any(|c| c.matches(customer, now)),
            RuleExpr::Condition(predicate) => predicate.matches(customer, now),
        }
    }
}

impl Predicate {
    pub fn matches(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        match self {
            Predicate::Compare { field, op, operand } => compare(customer, field, *op, operand),
            Predicate::InactiveFor { days } => match inactivity_cutoff(now, *days) {
                Some(cutoff) => customer.last_activity < cutoff,
                // Past the end of time: nobody for huge N, everybody for huge -N
                None => *days < 0.0,
            },
            Predicate::Never => false,
        }
    }
}

fn compare(customer: &Customer, field: &Field, op: Comparison, operand: &Operand) -> bool {
    match (field, operand) {
        (Field::TotalSpend, Operand::Number(n)) => apply(op, customer.total_spend, *n),
        (Field::Visits, Operand::Number(n)) => apply(op, customer.visits as f64, *n),
        (Field::LastActivity, Operand::Time(t)) => apply(op, customer.last_activity, *t),
        (Field::Name, Operand::Text(s)) => apply(op, customer.name.as_str(), s.as_str()),
        (Field::Email, Operand::Text(s)) => apply(op, customer.email.as_str(), s.as_str()),
        _ => false,
    }
}

fn apply<T: PartialOrd>(op: Comparison, lhs: T, rhs: T) -> bool {
    match op {
        Comparison::GreaterThan => lhs > rhs,
        Comparison::LessThan => lhs < rhs,
        Comparison::Equal => lhs == rhs,
    }
}

/// Customers matching `expr`, in the order given.
pub fn evaluate(expr: &RuleExpr, customers: &[Customer], now: DateTime<Utc>) -> Vec<Customer> {
    customers
        .iter()
        .filter(|c| expr.matches(c, now))
        .cloned()
        .collect()
}

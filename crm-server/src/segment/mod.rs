//! Audience segmentation.
//!
//! Rule groups from the builder compile to a [`RuleExpr`] tree that is
//! evaluated against the customer collection. Segments persist the rules
//! together with the audience size observed at save time.
//!
//! ## Flow
//!
//! ```text
//! [RuleGroup] → RuleExpr::compile(policy) → evaluate(customers) → audience
//! ```

pub mod evaluator;
pub mod rules;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Customer, RuleGroup, Segment, SYSTEM_USER};
use crate::store::Store;

pub use evaluator::evaluate;
pub use rules::{CombinatorPolicy, RuleExpr};

/// Segment creation, listing and audience resolution.
#[derive(Clone)]
pub struct SegmentService {
    store: Store,
    policy: CombinatorPolicy,
}

impl SegmentService {
    pub fn new(store: Store, policy: CombinatorPolicy) -> Self {
        Self { store, policy }
    }

    /// Resolve the customers currently matching `rules`.
    pub async fn audience(&self, rules: &[RuleGroup]) -> AppResult<Vec<Customer>> {
        if rules.is_empty() {
            return Err(AppError::validation("Rules are required"));
        }

        if self.policy == CombinatorPolicy::Legacy && rules::uses_or(rules) {
            warn!(
                policy = %self.policy,
                groups = rules.len(),
                "segment_or_logic_ignored"
            );
        }

        let expr = RuleExpr::compile(rules, self.policy);
        let now = Utc::now();
        let customers = self.store.customers.all().await?;
        let audience = evaluate(&expr, &customers, now);

        info!(
            policy = %self.policy,
            predicates = expr.leaf_count(),
            customers_scanned = customers.len(),
            audience_size = audience.len(),
            "segment_audience_resolved"
        );

        Ok(audience)
    }

    /// Audience size for unsaved rules.
    pub async fn preview(&self, rules: &[RuleGroup]) -> AppResult<u64> {
        if rules.is_empty() {
            return Err(AppError::validation(
                "Rules are required for audience preview",
            ));
        }
        Ok(self.audience(rules).await?.len() as u64)
    }

    /// Persist a named segment with its current audience size.
    pub async fn create(&self, name: &str, rules: Vec<RuleGroup>) -> AppResult<Segment> {
        let name = name.trim();
        if name.is_empty() || rules.is_empty() {
            return Err(AppError::validation("Segment name and rules are required"));
        }
        validate_rules(&rules)?;

        // Fast rejection before resolving the audience; the insert below
        // re-checks under the write lock.
        if self.store.segments.count(|s| s.name == name).await? > 0 {
            return Err(duplicate_name());
        }

        let audience_size = self.audience(&rules).await?.len() as u64;

        let segment = Segment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rules,
            audience_size,
            created_by: SYSTEM_USER.to_string(),
            created_at: Utc::now(),
        };

        let segment = self
            .store
            .segments
            .insert_unless(segment, |s| s.name == name)
            .await?
            .ok_or_else(duplicate_name)?;

        info!(
            segment_id = %segment.id,
            name = %segment.name,
            audience_size = segment.audience_size,
            "segment_created"
        );

        Ok(segment)
    }

    pub async fn list(&self) -> AppResult<Vec<Segment>> {
        self.store.segments.all().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Option<Segment>> {
        self.store.segments.get(id).await
    }
}

fn duplicate_name() -> AppError {
    AppError::validation("Segment with this name already exists")
}

/// Every group needs conditions and every condition must be fully specified.
pub fn validate_rules(rules: &[RuleGroup]) -> AppResult<()> {
    for (index, group) in rules.iter().enumerate() {
        if group.conditions.is_empty() {
            return Err(AppError::Validation(format!(
                "Rule group {} has no conditions",
                index + 1
            )));
        }
        if group.conditions.iter().any(|c| !c.is_complete()) {
            return Err(AppError::Validation(format!(
                "All conditions in rule group {} must define a field, operator and value",
                index + 1
            )));
        }
    }
    Ok(())
}

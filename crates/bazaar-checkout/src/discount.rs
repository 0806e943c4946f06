//! # Discount Evaluator
//!
//! Store-facing half of discount handling. The rules themselves
//! (eligibility order, amount math) live in `bazaar_core::discount`; this
//! module looks discounts up, runs those rules and books redemptions.
//!
//! ## Lifecycle of a Code in One Checkout
//! ```text
//! review:   find ──► check_eligibility(user) ──► compute_amount     (pure)
//! execute:  ... orders created ... ──► record_redemption             (write)
//! rollback:                          ──► revert_redemption            (write)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CheckoutError, CheckoutResult};
use crate::ports::{DiscountStore, RedemptionOutcome};
use bazaar_core::discount::{check_eligibility, compute_amount};
use bazaar_core::validation::{normalize_discount_code, validate_new_discount};
use bazaar_core::{
    Discount, DiscountComputation, DiscountRef, DiscountRejection, NewDiscount, PricedLine,
};

/// A discount with its derived status, as listed to the owning shop.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountView {
    #[serde(flatten)]
    pub discount: Discount,
    pub remaining_uses: Option<i64>,
    pub currently_valid: bool,
}

#[derive(Clone)]
pub struct DiscountEvaluator {
    store: Arc<dyn DiscountStore>,
}

impl DiscountEvaluator {
    pub fn new(store: Arc<dyn DiscountStore>) -> Self {
        DiscountEvaluator { store }
    }

    /// Looks up and validates a discount for `shop_id` at the current time.
    ///
    /// With `user_id` the user's per-user cap is checked too.
    pub async fn validate(
        &self,
        reference: &DiscountRef,
        shop_id: &str,
        user_id: Option<&str>,
    ) -> CheckoutResult<Discount> {
        self.validate_at(reference, shop_id, user_id, Utc::now()).await
    }

    /// [`validate`](Self::validate) against an explicit clock.
    ///
    /// ## Check Order
    /// exists in shop → active → inside window → global cap → user cap.
    /// The first failing check is the one reported.
    pub async fn validate_at(
        &self,
        reference: &DiscountRef,
        shop_id: &str,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CheckoutResult<Discount> {
        let discount = self
            .find(reference, shop_id)
            .await?
            .ok_or_else(|| rejected(reference, DiscountRejection::NotFound))?;

        // Everything but the user cap, before the redemption count lookup
        check_eligibility(&discount, shop_id, now, None).map_err(|r| rejected(reference, r))?;

        if let Some(user_id) = user_id {
            let used = self.store.user_redemptions(&discount.id, user_id).await?;
            check_eligibility(&discount, shop_id, now, Some(used))
                .map_err(|r| rejected(reference, r))?;
        }

        debug!(discount_id = %discount.id, %reference, shop_id, "Discount valid");
        Ok(discount)
    }

    /// Discount for one shop-group's priced lines. Pure and repeatable.
    pub fn compute(
        &self,
        discount: &Discount,
        lines: &[PricedLine],
    ) -> CheckoutResult<DiscountComputation> {
        compute_amount(discount, lines).map_err(|reason| CheckoutError::DiscountRejected {
            discount: discount.code.clone(),
            reason,
        })
    }

    /// Books one use for `user_id`, re-checking every cap atomically.
    pub async fn record_redemption(&self, discount: &Discount, user_id: &str) -> CheckoutResult<()> {
        match self.store.record_redemption(&discount.id, user_id).await? {
            RedemptionOutcome::Recorded => {
                debug!(discount_id = %discount.id, user_id, "Redemption recorded");
                Ok(())
            }
            RedemptionOutcome::Rejected(reason) => Err(CheckoutError::DiscountRejected {
                discount: discount.code.clone(),
                reason,
            }),
        }
    }

    /// Undoes one use. `false` when the user had none.
    pub async fn revert_redemption(&self, discount_id: &str, user_id: &str) -> CheckoutResult<bool> {
        self.store.revert_redemption(discount_id, user_id).await
    }

    /// A user gives back a use of a shop's discount.
    ///
    /// Fails with `NotFound` when the discount is not the shop's or the user
    /// never used it.
    pub async fn cancel_redemption(
        &self,
        shop_id: &str,
        discount_id: &str,
        user_id: &str,
    ) -> CheckoutResult<()> {
        match self.store.find_by_id(discount_id).await? {
            Some(discount) if discount.shop_id == shop_id => {}
            _ => return Err(CheckoutError::not_found("Discount", discount_id)),
        }

        if !self.store.revert_redemption(discount_id, user_id).await? {
            return Err(CheckoutError::not_found(
                "Redemption",
                format!("{} by {}", discount_id, user_id),
            ));
        }

        info!(discount_id, user_id, "Redemption cancelled");
        Ok(())
    }

    /// Validates and stores a new discount; the code is stored uppercase.
    pub async fn create_discount(&self, definition: &NewDiscount) -> CheckoutResult<Discount> {
        let code = validate_new_discount(definition)
            .map_err(|e| CheckoutError::invalid(e.to_string()))?;

        let discount = self.store.create(definition, &code).await?;
        info!(discount_id = %discount.id, shop_id = %discount.shop_id, %code, "Discount created");
        Ok(discount)
    }

    /// Soft lifecycle: discounts are switched off, never deleted.
    pub async fn set_active(
        &self,
        shop_id: &str,
        discount_id: &str,
        is_active: bool,
    ) -> CheckoutResult<()> {
        self.store.set_active(shop_id, discount_id, is_active).await
    }

    pub async fn list_for_shop(
        &self,
        shop_id: &str,
        active_only: bool,
    ) -> CheckoutResult<Vec<DiscountView>> {
        let now = Utc::now();
        let discounts = self.store.list_by_shop(shop_id, active_only).await?;

        Ok(discounts
            .into_iter()
            .map(|discount| DiscountView {
                remaining_uses: discount.remaining_uses(),
                currently_valid: discount.is_currently_valid(now),
                discount,
            })
            .collect())
    }

    async fn find(&self, reference: &DiscountRef, shop_id: &str) -> CheckoutResult<Option<Discount>> {
        match reference {
            DiscountRef::Id(id) => self.store.find_by_id(id).await,
            DiscountRef::Code(code) => {
                let code = normalize_discount_code(code)
                    .map_err(|e| CheckoutError::invalid(e.to_string()))?;
                self.store.find_by_code(shop_id, &code).await
            }
        }
    }
}

fn rejected(reference: &DiscountRef, reason: DiscountRejection) -> CheckoutError {
    CheckoutError::DiscountRejected {
        discount: reference.to_string(),
        reason,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{DiscountKind, DiscountScope};
    use bazaar_db::{Database, DbConfig};
    use chrono::Duration;

    fn definition(code: &str) -> NewDiscount {
        let now = Utc::now();
        NewDiscount {
            shop_id: "shop-1".to_string(),
            code: code.to_string(),
            name: "Ten percent".to_string(),
            description: None,
            kind: DiscountKind::Percentage { percent: 10 },
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            max_uses: Some(10),
            max_uses_per_user: 1,
            min_order_value_cents: 10_000,
            max_discount_amount_cents: None,
            scope: DiscountScope::All,
            product_ids: Vec::new(),
        }
    }

    fn line(product_id: &str, unit: i64, qty: i64) -> PricedLine {
        PricedLine {
            product_id: product_id.to_string(),
            shop_id: "shop-1".to_string(),
            name: product_id.to_string(),
            unit_price_cents: unit,
            quantity: qty,
            line_total_cents: unit * qty,
        }
    }

    async fn evaluator() -> (Database, DiscountEvaluator) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let evaluator = DiscountEvaluator::new(Arc::new(db.discounts()));
        (db, evaluator)
    }

    fn reason(err: CheckoutError) -> DiscountRejection {
        match err {
            CheckoutError::DiscountRejected { reason, .. } => reason,
            other => panic!("expected a discount rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_save10_example() {
        let (_db, evaluator) = evaluator().await;
        let created = evaluator.create_discount(&definition("save10")).await.unwrap();
        assert_eq!(created.code, "SAVE10");

        let found = evaluator
            .validate(&DiscountRef::Code("Save10".into()), "shop-1", Some("u-1"))
            .await
            .unwrap();
        let result = evaluator.compute(&found, &[line("p-1", 15_000, 1)]).unwrap();
        assert_eq!(result.amount.cents(), 1_500);
        assert_eq!(result.final_amount.cents(), 13_500);

        // Below the 100.00 minimum
        let err = evaluator.compute(&found, &[line("p-1", 9_999, 1)]).unwrap_err();
        assert!(matches!(reason(err), DiscountRejection::BelowMinimumOrder { .. }));
    }

    #[tokio::test]
    async fn test_validation_order() {
        let (_db, evaluator) = evaluator().await;
        let d = evaluator.create_discount(&definition("ORDER1")).await.unwrap();
        let by_id = DiscountRef::Id(d.id.clone());

        // Wrong shop looks like a missing discount
        let err = evaluator.validate(&by_id, "shop-2", None).await.unwrap_err();
        assert_eq!(reason(err), DiscountRejection::NotFound);

        let early = d.starts_at - Duration::hours(1);
        let err = evaluator
            .validate_at(&by_id, "shop-1", None, early)
            .await
            .unwrap_err();
        assert_eq!(reason(err), DiscountRejection::NotYetActive);

        let late = d.ends_at;
        let err = evaluator
            .validate_at(&by_id, "shop-1", None, late)
            .await
            .unwrap_err();
        assert_eq!(reason(err), DiscountRejection::Expired);

        // Inactive is reported before the window
        evaluator.set_active("shop-1", &d.id, false).await.unwrap();
        let err = evaluator
            .validate_at(&by_id, "shop-1", None, late)
            .await
            .unwrap_err();
        assert_eq!(reason(err), DiscountRejection::Inactive);

        let err = evaluator
            .validate(&DiscountRef::Code("NOPE".into()), "shop-1", None)
            .await
            .unwrap_err();
        assert_eq!(reason(err), DiscountRejection::NotFound);
    }

    #[tokio::test]
    async fn test_per_user_cap() {
        let (_db, evaluator) = evaluator().await;
        let d = evaluator.create_discount(&definition("ONCE")).await.unwrap();
        let code = DiscountRef::Code("ONCE".into());

        evaluator.record_redemption(&d, "u-1").await.unwrap();

        let err = evaluator.validate(&code, "shop-1", Some("u-1")).await.unwrap_err();
        assert_eq!(reason(err), DiscountRejection::UserLimitExceeded);
        // Anonymous preview skips the user check
        assert!(evaluator.validate(&code, "shop-1", None).await.is_ok());
        assert!(evaluator.validate(&code, "shop-1", Some("u-2")).await.is_ok());

        let err = evaluator.record_redemption(&d, "u-1").await.unwrap_err();
        assert_eq!(reason(err), DiscountRejection::UserLimitExceeded);
    }

    #[tokio::test]
    async fn test_cancel_redemption() {
        let (_db, evaluator) = evaluator().await;
        let d = evaluator.create_discount(&definition("UNDO")).await.unwrap();

        assert!(matches!(
            evaluator.cancel_redemption("shop-1", &d.id, "u-1").await,
            Err(CheckoutError::NotFound { .. })
        ));

        evaluator.record_redemption(&d, "u-1").await.unwrap();
        assert!(matches!(
            evaluator.cancel_redemption("shop-2", &d.id, "u-1").await,
            Err(CheckoutError::NotFound { .. })
        ));
        evaluator.cancel_redemption("shop-1", &d.id, "u-1").await.unwrap();

        let views = evaluator.list_for_shop("shop-1", true).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].remaining_uses, Some(10));
        assert!(views[0].currently_valid);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_definitions() {
        let (_db, evaluator) = evaluator().await;

        let mut fixed = definition("FIXED5");
        fixed.kind = DiscountKind::FixedAmount { amount_cents: 20_000 };
        assert!(matches!(
            evaluator.create_discount(&fixed).await,
            Err(CheckoutError::InvalidInput { .. })
        ));

        let mut specific = definition("PICK");
        specific.scope = DiscountScope::Specific;
        assert!(evaluator.create_discount(&specific).await.is_err());

        evaluator.create_discount(&definition("TWICE")).await.unwrap();
        assert!(matches!(
            evaluator.create_discount(&definition("twice")).await,
            Err(CheckoutError::InvalidInput { .. })
        ));
    }
}

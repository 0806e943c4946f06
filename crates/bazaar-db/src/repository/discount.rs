//! # Discount Repository
//!
//! Discount rules, their product lists and the redemption log.
//!
//! ## Redemption
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_redemption(discount, user)                                      │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    UPDATE discounts SET uses_count = uses_count + 1                     │
//! │     WHERE id = ? AND is_active                                          │
//! │       AND (max_uses IS NULL OR uses_count < max_uses)                   │
//! │       AND (user's redemption rows) < max_uses_per_user                  │
//! │    ├── 0 rows ──► ROLLBACK, diagnose ──► Rejected(reason)               │
//! │    └── 1 row  ──► window check, INSERT redemption row, COMMIT           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter check and increment are one statement, so two buyers racing
//! for the last use cannot both win.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use bazaar_core::discount::check_eligibility;
use bazaar_core::{Discount, DiscountKind, DiscountRejection, DiscountScope, NewDiscount};

/// Result of trying to consume one use of a discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Recorded,
    Rejected(DiscountRejection),
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountRow {
    id: String,
    shop_id: String,
    code: String,
    name: String,
    description: Option<String>,
    kind: String,
    value: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    max_uses: Option<i64>,
    uses_count: i64,
    max_uses_per_user: i64,
    min_order_value_cents: i64,
    max_discount_amount_cents: Option<i64>,
    scope: DiscountScope,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DiscountRow {
    fn into_discount(self, product_ids: Vec<String>) -> DbResult<Discount> {
        let kind = DiscountKind::from_parts(&self.kind, self.value).ok_or_else(|| {
            DbError::corrupt(
                "discounts",
                format!("unknown kind '{}' (value {}) for {}", self.kind, self.value, self.id),
            )
        })?;

        Ok(Discount {
            id: self.id,
            shop_id: self.shop_id,
            code: self.code,
            name: self.name,
            description: self.description,
            kind,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            max_uses: self.max_uses,
            uses_count: self.uses_count,
            max_uses_per_user: self.max_uses_per_user,
            min_order_value_cents: self.min_order_value_cents,
            max_discount_amount_cents: self.max_discount_amount_cents,
            scope: self.scope,
            product_ids,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const DISCOUNT_COLUMNS: &str = r#"
    id, shop_id, code, name, description, kind, value, starts_at, ends_at,
    max_uses, uses_count, max_uses_per_user, min_order_value_cents,
    max_discount_amount_cents, scope, is_active, created_at, updated_at
"#;

/// Repository for discount database operations.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Inserts a discount and its product list.
    ///
    /// `code` must already be normalized; the caller validates the rest.
    pub async fn create(&self, new: &NewDiscount, code: &str) -> DbResult<Discount> {
        let now = Utc::now();
        let discount = Discount {
            id: new_id(),
            shop_id: new.shop_id.clone(),
            code: code.to_string(),
            name: new.name.clone(),
            description: new.description.clone(),
            kind: new.kind,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            max_uses: new.max_uses,
            uses_count: 0,
            max_uses_per_user: new.max_uses_per_user,
            min_order_value_cents: new.min_order_value_cents,
            max_discount_amount_cents: new.max_discount_amount_cents,
            scope: new.scope,
            product_ids: match new.scope {
                DiscountScope::All => Vec::new(),
                DiscountScope::Specific => new.product_ids.clone(),
            },
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %discount.id, shop_id = %discount.shop_id, code, "Creating discount");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, shop_id, code, name, description, kind, value, starts_at, ends_at,
                max_uses, uses_count, max_uses_per_user, min_order_value_cents,
                max_discount_amount_cents, scope, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.shop_id)
        .bind(&discount.code)
        .bind(&discount.name)
        .bind(&discount.description)
        .bind(discount.kind.as_str())
        .bind(discount.kind.value())
        .bind(discount.starts_at)
        .bind(discount.ends_at)
        .bind(discount.max_uses)
        .bind(discount.uses_count)
        .bind(discount.max_uses_per_user)
        .bind(discount.min_order_value_cents)
        .bind(discount.max_discount_amount_cents)
        .bind(discount.scope)
        .bind(discount.is_active)
        .bind(discount.created_at)
        .bind(discount.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", code),
            other => other,
        })?;

        for product_id in &discount.product_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO discount_products (discount_id, product_id) VALUES (?, ?)",
            )
            .bind(&discount.id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %discount.id, code, "Discount created");
        Ok(discount)
    }

    /// Gets a discount by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Discount>> {
        let row = sqlx::query_as::<_, DiscountRow>(&format!(
            "SELECT {} FROM discounts WHERE id = ?",
            DISCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Finds a shop's discount by its (normalized) code.
    pub async fn find_by_code(&self, shop_id: &str, code: &str) -> DbResult<Option<Discount>> {
        let row = sqlx::query_as::<_, DiscountRow>(&format!(
            "SELECT {} FROM discounts WHERE shop_id = ? AND code = ?",
            DISCOUNT_COLUMNS
        ))
        .bind(shop_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Lists a shop's discounts ordered by code.
    pub async fn list_by_shop(&self, shop_id: &str, active_only: bool) -> DbResult<Vec<Discount>> {
        let rows = sqlx::query_as::<_, DiscountRow>(&format!(
            "SELECT {} FROM discounts WHERE shop_id = ? AND (? = 0 OR is_active = 1) ORDER BY code",
            DISCOUNT_COLUMNS
        ))
        .bind(shop_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        let mut discounts = Vec::with_capacity(rows.len());
        for row in rows {
            discounts.push(self.hydrate(row).await?);
        }
        Ok(discounts)
    }

    /// Switches a discount on or off. Only the owning shop may do this.
    pub async fn set_active(&self, shop_id: &str, id: &str, is_active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE discounts SET is_active = ?, updated_at = ? WHERE id = ? AND shop_id = ?",
        )
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount", id));
        }

        info!(id, shop_id, is_active, "Discount toggled");
        Ok(())
    }

    /// How many times `user_id` has redeemed the discount.
    pub async fn user_redemption_count(&self, discount_id: &str, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM discount_redemptions WHERE discount_id = ? AND user_id = ?",
        )
        .bind(discount_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Consumes one use of a discount for a user.
    ///
    /// Re-checks the active flag, the global cap and the per-user cap in one
    /// conditional UPDATE, then the validity window, then logs the
    /// redemption. A rejection leaves nothing written.
    pub async fn record_redemption(
        &self,
        discount_id: &str,
        user_id: &str,
    ) -> DbResult<RedemptionOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE discounts
            SET uses_count = uses_count + 1, updated_at = ?
            WHERE id = ?
              AND is_active = 1
              AND (max_uses IS NULL OR uses_count < max_uses)
              AND (
                  SELECT COUNT(*) FROM discount_redemptions
                  WHERE discount_id = ? AND user_id = ?
              ) < max_uses_per_user
            "#,
        )
        .bind(now)
        .bind(discount_id)
        .bind(discount_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            let reason = self.diagnose(discount_id, user_id, now).await?;
            debug!(discount_id, user_id, %reason, "Redemption rejected");
            return Ok(RedemptionOutcome::Rejected(reason));
        }

        let (starts_at, ends_at): (DateTime<Utc>, DateTime<Utc>) =
            sqlx::query_as("SELECT starts_at, ends_at FROM discounts WHERE id = ?")
                .bind(discount_id)
                .fetch_one(&mut *tx)
                .await?;

        if now < starts_at || now >= ends_at {
            tx.rollback().await?;
            let reason = if now < starts_at {
                DiscountRejection::NotYetActive
            } else {
                DiscountRejection::Expired
            };
            debug!(discount_id, user_id, %reason, "Redemption rejected");
            return Ok(RedemptionOutcome::Rejected(reason));
        }

        sqlx::query(
            "INSERT INTO discount_redemptions (discount_id, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(discount_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(discount_id, user_id, "Redemption recorded");
        Ok(RedemptionOutcome::Recorded)
    }

    /// Undoes the user's latest redemption of a discount.
    ///
    /// Returns `false` when the user has no redemption to undo.
    pub async fn revert_redemption(&self, discount_id: &str, user_id: &str) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM discount_redemptions
            WHERE id = (
                SELECT id FROM discount_redemptions
                WHERE discount_id = ? AND user_id = ?
                ORDER BY id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(discount_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE discounts SET uses_count = MAX(uses_count - 1, 0), updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(discount_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(discount_id, user_id, "Redemption reverted");
        Ok(true)
    }

    /// Works out which rule stopped a redemption.
    async fn diagnose(
        &self,
        discount_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<DiscountRejection> {
        let Some(discount) = self.get_by_id(discount_id).await? else {
            return Ok(DiscountRejection::NotFound);
        };
        let used = self.user_redemption_count(discount_id, user_id).await?;

        match check_eligibility(&discount, &discount.shop_id, now, Some(used)) {
            Err(reason) => Ok(reason),
            Ok(()) => {
                // The row changed between the UPDATE and this read.
                warn!(discount_id, user_id, "Redemption rejected without a visible cause");
                Ok(DiscountRejection::UsageExceeded)
            }
        }
    }

    async fn hydrate(&self, row: DiscountRow) -> DbResult<Discount> {
        let product_ids: Vec<String> = sqlx::query_scalar(
            "SELECT product_id FROM discount_products WHERE discount_id = ? ORDER BY product_id",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        row.into_discount(product_ids)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;

    fn new_discount(code: &str) -> NewDiscount {
        let now = Utc::now();
        NewDiscount {
            shop_id: "shop-1".to_string(),
            code: code.to_string(),
            name: "Ten off".to_string(),
            description: None,
            kind: DiscountKind::Percentage { percent: 10 },
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            max_uses: Some(2),
            max_uses_per_user: 1,
            min_order_value_cents: 0,
            max_discount_amount_cents: None,
            scope: DiscountScope::All,
            product_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discounts();

        let mut specific = new_discount("PICKED");
        specific.scope = DiscountScope::Specific;
        specific.product_ids = vec!["p-2".to_string(), "p-1".to_string()];
        specific.kind = DiscountKind::BuyOneGetOne;

        let created = repo.create(&specific, "PICKED").await.unwrap();
        let found = repo.find_by_code("shop-1", "PICKED").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.kind, DiscountKind::BuyOneGetOne);
        assert_eq!(found.product_ids, vec!["p-1".to_string(), "p-2".to_string()]);

        assert!(repo.find_by_code("shop-2", "PICKED").await.unwrap().is_none());
        assert!(matches!(
            repo.create(&specific, "PICKED").await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_and_toggle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discounts();

        let a = repo.create(&new_discount("AAA"), "AAA").await.unwrap();
        repo.create(&new_discount("BBB"), "BBB").await.unwrap();
        repo.set_active("shop-1", &a.id, false).await.unwrap();

        assert_eq!(repo.list_by_shop("shop-1", false).await.unwrap().len(), 2);
        let active = repo.list_by_shop("shop-1", true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "BBB");

        // Another shop cannot toggle it
        assert!(matches!(
            repo.set_active("shop-2", &a.id, true).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_redemption_respects_caps() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discounts();
        let d = repo.create(&new_discount("SAVE10"), "SAVE10").await.unwrap();

        assert_eq!(
            repo.record_redemption(&d.id, "u-1").await.unwrap(),
            RedemptionOutcome::Recorded
        );
        assert_eq!(
            repo.record_redemption(&d.id, "u-1").await.unwrap(),
            RedemptionOutcome::Rejected(DiscountRejection::UserLimitExceeded)
        );
        assert_eq!(
            repo.record_redemption(&d.id, "u-2").await.unwrap(),
            RedemptionOutcome::Recorded
        );
        assert_eq!(
            repo.record_redemption(&d.id, "u-3").await.unwrap(),
            RedemptionOutcome::Rejected(DiscountRejection::UsageExceeded)
        );

        let reloaded = repo.get_by_id(&d.id).await.unwrap().unwrap();
        assert_eq!(reloaded.uses_count, 2);
        assert_eq!(repo.user_redemption_count(&d.id, "u-3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redemption_rejects_inactive_and_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discounts();
        let d = repo.create(&new_discount("OFF"), "OFF").await.unwrap();
        repo.set_active("shop-1", &d.id, false).await.unwrap();

        assert_eq!(
            repo.record_redemption(&d.id, "u-1").await.unwrap(),
            RedemptionOutcome::Rejected(DiscountRejection::Inactive)
        );
        assert_eq!(
            repo.record_redemption("missing", "u-1").await.unwrap(),
            RedemptionOutcome::Rejected(DiscountRejection::NotFound)
        );
    }

    #[tokio::test]
    async fn test_redemption_outside_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discounts();

        let mut expired = new_discount("OLD");
        expired.starts_at = Utc::now() - Duration::days(10);
        expired.ends_at = Utc::now() - Duration::days(1);
        let d = repo.create(&expired, "OLD").await.unwrap();

        assert_eq!(
            repo.record_redemption(&d.id, "u-1").await.unwrap(),
            RedemptionOutcome::Rejected(DiscountRejection::Expired)
        );
        assert_eq!(repo.get_by_id(&d.id).await.unwrap().unwrap().uses_count, 0);
    }

    #[tokio::test]
    async fn test_revert_restores_counters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.discounts();
        let d = repo.create(&new_discount("BACK"), "BACK").await.unwrap();

        assert!(!repo.revert_redemption(&d.id, "u-1").await.unwrap());

        repo.record_redemption(&d.id, "u-1").await.unwrap();
        assert!(repo.revert_redemption(&d.id, "u-1").await.unwrap());

        let reloaded = repo.get_by_id(&d.id).await.unwrap().unwrap();
        assert_eq!(reloaded.uses_count, 0);
        assert_eq!(repo.user_redemption_count(&d.id, "u-1").await.unwrap(), 0);

        // The user may redeem again
        assert_eq!(
            repo.record_redemption(&d.id, "u-1").await.unwrap(),
            RedemptionOutcome::Recorded
        );
    }
}

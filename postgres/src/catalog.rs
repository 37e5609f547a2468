//! Branches, inventory, addresses and the fee setting.

use crate::PgStore;
use crate::rows::{self, Result, db_err, to_cents};
use async_trait::async_trait;
use rush_core::catalog::{Branch, CustomerAddress, InventoryItem};
use rush_core::store::{CatalogStore, FeeSettings};
use rush_core::types::{AddressId, BranchId, ItemId, Money};
use rush_core::{DispatchError, UserId};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_branch(&self, branch: &Branch) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO branches (id, merchant_id, name, address, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(branch.id.as_uuid())
        .bind(branch.merchant_id.as_uuid())
        .bind(&branch.name)
        .bind(Json(&branch.address))
        .bind(branch.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_branch(&self, id: BranchId) -> Result<Option<Branch>> {
        sqlx::query("SELECT * FROM branches WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::branch)
            .transpose()
    }

    async fn list_branches(&self, merchant: UserId) -> Result<Vec<Branch>> {
        sqlx::query("SELECT * FROM branches WHERE merchant_id = $1 ORDER BY created_at ASC")
            .bind(merchant.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::branch)
            .collect()
    }

    async fn insert_item(&self, item: &InventoryItem) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO inventory_items
                (id, branch_id, name, description, price_cents, stock, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(item.id.as_uuid())
        .bind(item.branch_id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(to_cents(item.price)?)
        .bind(i64::from(item.stock))
        .bind(item.is_active)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<InventoryItem>> {
        sqlx::query("SELECT * FROM inventory_items WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::inventory_item)
            .transpose()
    }

    async fn update_item(&self, item: &InventoryItem) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE inventory_items
            SET name = $2, description = $3, price_cents = $4, stock = $5, is_active = $6
            WHERE id = $1
            ",
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(to_cents(item.price)?)
        .bind(i64::from(item.stock))
        .bind(item.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::not_found("item"));
        }
        Ok(())
    }

    async fn active_items(&self, branch: BranchId, ids: &[ItemId]) -> Result<Vec<InventoryItem>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        sqlx::query(
            r"
            SELECT * FROM inventory_items
            WHERE branch_id = $1 AND is_active AND id = ANY($2)
            ORDER BY created_at ASC
            ",
        )
        .bind(branch.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(rows::inventory_item)
        .collect()
    }

    async fn insert_address(&self, address: &CustomerAddress) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO customer_addresses (id, customer_id, label, address, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(address.id.as_uuid())
        .bind(address.customer_id.as_uuid())
        .bind(&address.label)
        .bind(Json(&address.address))
        .bind(address.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_address(
        &self,
        customer: UserId,
        id: AddressId,
    ) -> Result<Option<CustomerAddress>> {
        sqlx::query("SELECT * FROM customer_addresses WHERE id = $1 AND customer_id = $2")
            .bind(id.as_uuid())
            .bind(customer.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::customer_address)
            .transpose()
    }

    async fn list_addresses(&self, customer: UserId) -> Result<Vec<CustomerAddress>> {
        sqlx::query(
            "SELECT * FROM customer_addresses WHERE customer_id = $1 ORDER BY created_at ASC",
        )
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(rows::customer_address)
        .collect()
    }
}

#[async_trait]
impl FeeSettings for PgStore {
    async fn flat_delivery_fee(&self) -> Result<Money> {
        let row = sqlx::query("SELECT flat_fee_cents FROM delivery_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(self.default_fee);
        };
        let cents: i64 = row.try_get("flat_fee_cents").map_err(db_err)?;
        u64::try_from(cents)
            .map(Money::from_cents)
            .map_err(|_| DispatchError::Storage("negative delivery fee".into()))
    }

    async fn set_flat_delivery_fee(&self, fee: Money) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO delivery_settings (id, flat_fee_cents, updated_at)
            VALUES (1, $1, now())
            ON CONFLICT (id) DO UPDATE
            SET flat_fee_cents = EXCLUDED.flat_fee_cents, updated_at = now()
            ",
        )
        .bind(to_cents(fee)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::info!(fee = %fee, "Flat delivery fee updated");
        Ok(())
    }
}

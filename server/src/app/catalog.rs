//! Branches, inventory, customer addresses, the flat fee and merchant analytics.

use super::ServiceContext;
use rush_core::catalog::{Branch, CustomerAddress, InventoryItem, ItemUpdate, validate_address};
use rush_core::store::MerchantAnalytics;
use rush_core::types::{AddressId, AddressSnapshot, BranchId, ItemId};
use rush_core::{Capability, DispatchError, Money, Principal, Result};
use serde::{Deserialize, Serialize};

/// Body of a branch creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBranch {
    /// Display name
    pub name: String,
    /// Pickup address
    #[serde(flatten)]
    pub address: AddressSnapshot,
}

/// Body of an item creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    /// Owning branch
    pub branch_id: BranchId,
    /// Display name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Unit price
    pub price: Money,
    /// Units on hand (informational, never decremented)
    #[serde(default)]
    pub stock: u32,
    /// Whether the item can be ordered
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

/// Body of a customer address creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    /// Short name such as "Home"
    #[serde(default)]
    pub label: String,
    /// The address itself
    #[serde(flatten)]
    pub address: AddressSnapshot,
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(DispatchError::validation("name", "must not be blank"))
    } else {
        Ok(())
    }
}

/// Catalog and settings service.
pub struct CatalogService {
    ctx: ServiceContext,
}

impl CatalogService {
    /// Creates the service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates a branch owned by the caller.
    pub async fn create_branch(&self, principal: &Principal, body: NewBranch) -> Result<Branch> {
        principal.require(Capability::ManageCatalog)?;
        require_name(&body.name)?;
        validate_address(&body.address)?;

        let branch = Branch {
            id: BranchId::new(),
            merchant_id: principal.user_id,
            name: body.name,
            address: body.address,
            created_at: self.ctx.clock.now(),
        };
        self.ctx.store.insert_branch(&branch).await?;
        tracing::info!(branch_id = %branch.id, merchant_id = %principal.user_id, "Branch created");
        Ok(branch)
    }

    /// Branches owned by the caller.
    pub async fn branches(&self, principal: &Principal) -> Result<Vec<Branch>> {
        principal.require(Capability::ManageCatalog)?;
        self.ctx.store.list_branches(principal.user_id).await
    }

    async fn owned_branch(&self, principal: &Principal, id: BranchId) -> Result<Branch> {
        self.ctx
            .store
            .find_branch(id)
            .await?
            .filter(|branch| branch.merchant_id == principal.user_id)
            .ok_or_else(|| DispatchError::not_found("branch"))
    }

    /// Adds an item to one of the caller's branches.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] when the branch is not the caller's.
    pub async fn create_item(&self, principal: &Principal, body: NewItem) -> Result<InventoryItem> {
        principal.require(Capability::ManageCatalog)?;
        require_name(&body.name)?;
        let branch = self.owned_branch(principal, body.branch_id).await?;

        let item = InventoryItem {
            id: ItemId::new(),
            branch_id: branch.id,
            name: body.name,
            description: body.description,
            price: body.price,
            stock: body.stock,
            is_active: body.is_active,
            created_at: self.ctx.clock.now(),
        };
        self.ctx.store.insert_item(&item).await?;
        tracing::info!(item_id = %item.id, branch_id = %branch.id, price = %item.price, "Item created");
        Ok(item)
    }

    /// Partially updates an item of one of the caller's branches.
    ///
    /// Orders already placed keep their snapshotted prices.
    pub async fn update_item(
        &self,
        principal: &Principal,
        id: ItemId,
        update: ItemUpdate,
    ) -> Result<InventoryItem> {
        principal.require(Capability::ManageCatalog)?;
        let mut item = self
            .ctx
            .store
            .find_item(id)
            .await?
            .ok_or_else(|| DispatchError::not_found("item"))?;
        self.owned_branch(principal, item.branch_id)
            .await
            .map_err(|_| DispatchError::not_found("item"))?;

        item.apply(update)?;
        self.ctx.store.update_item(&item).await?;
        tracing::info!(item_id = %item.id, is_active = item.is_active, "Item updated");
        Ok(item)
    }

    /// Saves a delivery address for the caller.
    pub async fn create_address(
        &self,
        principal: &Principal,
        body: NewAddress,
    ) -> Result<CustomerAddress> {
        principal.require(Capability::ManageAddresses)?;
        validate_address(&body.address)?;

        let address = CustomerAddress {
            id: AddressId::new(),
            customer_id: principal.user_id,
            label: body.label,
            address: body.address,
            created_at: self.ctx.clock.now(),
        };
        self.ctx.store.insert_address(&address).await?;
        Ok(address)
    }

    /// The caller's saved addresses.
    pub async fn addresses(&self, principal: &Principal) -> Result<Vec<CustomerAddress>> {
        principal.require(Capability::ManageAddresses)?;
        self.ctx.store.list_addresses(principal.user_id).await
    }

    /// Current flat delivery fee.
    pub async fn delivery_fee(&self, principal: &Principal) -> Result<Money> {
        principal.require(Capability::ConfigureFees)?;
        self.ctx.store.flat_delivery_fee().await
    }

    /// Replaces the flat delivery fee for future quotes.
    pub async fn set_delivery_fee(&self, principal: &Principal, fee: Money) -> Result<Money> {
        principal.require(Capability::ConfigureFees)?;
        self.ctx.store.set_flat_delivery_fee(fee).await?;
        Ok(fee)
    }

    /// Order statistics over the caller's branches.
    pub async fn analytics(&self, principal: &Principal) -> Result<MerchantAnalytics> {
        principal.require(Capability::ViewBranchAnalytics)?;
        self.ctx.store.merchant_analytics(principal.user_id).await
    }
}

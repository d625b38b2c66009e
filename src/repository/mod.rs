use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdminDashboardStats, Cart, CartItem, CartLine, Category, CreateCategoryRequest,
    CreateProductRequest, NewOrder, Order, OrderItem, OrderStatus, Product, Role,
    UpdateCategoryRequest, UpdateProductRequest, UpdateProfileRequest, User,
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failure of the persistence layer. Uniqueness violations surface as a 409,
/// out-of-range values as a 400, everything else as a 500.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint (email, slug) would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value would leave its permitted range (cart line quantity).
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Used by non-SQL backends (and tests) to simulate an outage.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    /// Whether the failure is a uniqueness violation, from either backend.
    pub fn is_conflict(&self) -> bool {
        match self {
            RepoError::Conflict(_) => true,
            RepoError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Whether a write was refused because a value left its range. Postgres
    /// reports this as a CHECK violation or a numeric overflow (22003).
    pub fn is_out_of_range(&self) -> bool {
        match self {
            RepoError::OutOfRange(_) => true,
            RepoError::Database(sqlx::Error::Database(db)) => {
                db.is_check_violation() || db.code().as_deref() == Some("22003")
            }
            _ => false,
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// ProductFilter
///
/// Query parameters accepted by the public product listing.
#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::IntoParams)]
pub struct ProductFilter {
    /// Restrict to one category id.
    pub category: Option<Uuid>,
    /// Case-insensitive match on name and description.
    pub search: Option<String>,
    /// Only featured products when `true`.
    pub featured: Option<bool>,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Lookups that the
/// authorization guard consumes return `Option` so that "absent" stays distinct
/// from "failed".
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn update_user_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> RepoResult<Option<User>>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category>;
    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>>;
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;

    // --- Products ---
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn create_product(&self, req: CreateProductRequest) -> RepoResult<Product>;
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> RepoResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> RepoResult<bool>;

    // --- Cart ---
    async fn get_or_create_cart(&self, user_id: Uuid) -> RepoResult<Cart>;
    async fn get_cart_lines(&self, cart_id: Uuid) -> RepoResult<Vec<CartLine>>;
    // Adds `quantity` to the existing line for the product, or inserts a new line.
    async fn add_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> RepoResult<CartItem>;
    async fn get_cart_item(&self, id: Uuid) -> RepoResult<Option<CartItem>>;
    async fn set_cart_item_quantity(&self, id: Uuid, quantity: i32)
    -> RepoResult<Option<CartItem>>;
    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<bool>;
    async fn clear_cart(&self, cart_id: Uuid) -> RepoResult<u64>;
    // Deletes only the lines of the cart that hold one of `product_ids`.
    async fn remove_cart_products(&self, cart_id: Uuid, product_ids: &[Uuid])
    -> RepoResult<u64>;

    // --- Orders ---
    // Inserts the order and its lines atomically, status PENDING.
    async fn create_order(&self, order: NewOrder) -> RepoResult<Order>;
    async fn attach_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> RepoResult<Option<Order>>;
    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;
    async fn get_order_by_checkout_session(&self, session_id: &str)
    -> RepoResult<Option<Order>>;
    async fn get_order_items(&self, order_id: Uuid) -> RepoResult<Vec<OrderItem>>;
    async fn list_orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>>;
    async fn list_orders(&self) -> RepoResult<Vec<Order>>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus)
    -> RepoResult<Option<Order>>;
    // Moves the order to `next` only while it is still in `expected`.
    async fn transition_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<Option<Order>>;
    async fn delete_order(&self, id: Uuid) -> RepoResult<bool>;

    // --- Dashboard ---
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

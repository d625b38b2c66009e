use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The RBAC level of a user. Stored as the `user_role` Postgres enum and carried
/// inside session tokens as `"USER"` / `"ADMIN"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
    sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Parses a role name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OrderStatus
///
/// Lifecycle of an order, stored as the `order_status` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
    sqlx::Type,
)]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parses a status name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == wanted)
    }

    /// Whether an order in `self` may move to `next`.
    ///
    /// Re-applying the current status is always accepted as a no-op.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Processing)
                | (Paid, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Statuses whose totals count as revenue.
    pub fn is_revenue(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid
                | OrderStatus::Processing
                | OrderStatus::Shipped
                | OrderStatus::Delivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// A customer or administrator account in the `users` table. The `id` is the
/// identifier issued by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Category
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Product
///
/// A catalog entry. Prices are integer minor units (cents) in the store currency.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
    pub image_url: Option<String>,
    // Hosting provider's id for the image, used to delete it with the product.
    pub image_file_id: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_featured: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Cart
///
/// One cart per user, created lazily on first access.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Largest quantity a single cart line may hold. Mirrored by the CHECK on
/// `cart_items.quantity`.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// CartItem
///
/// A row of `cart_items` joined with its cart so the owning user is known.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    // Owner of the cart this item belongs to (loaded via JOIN).
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

/// CartLine
///
/// A cart item enriched with the product fields needed for display and checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub quantity: i32,
    pub stock: i32,
    pub image_url: Option<String>,
}

impl CartLine {
    pub fn subtotal_cents(&self) -> i64 {
        self.price_cents * i64::from(self.quantity)
    }
}

/// CartView
///
/// Response for `GET /api/cart`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_cents: i64,
}

impl CartView {
    pub fn new(cart_id: Uuid, items: Vec<CartLine>) -> Self {
        let total_cents = items.iter().map(CartLine::subtotal_cents).sum();
        Self {
            cart_id,
            items,
            total_cents,
        }
    }
}

/// Order
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    // FK to users.id (Owner).
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    // Hosted checkout session backing this order, once created.
    pub checkout_session_id: Option<String>,
    pub shipping_address: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// OrderItem
///
/// Line of an order. Name and price are snapshots taken at checkout time, so the
/// product may later change or disappear.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

/// OrderDetail
///
/// Response for a single order: the order and its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// NewOrder
///
/// Input to the repository when checkout creates an order.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub total_cents: i64,
    pub shipping_address: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Default)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input for `POST /api/auth/register`. The password is forwarded to the identity
/// provider and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::bad_request("A valid email is required"));
        }
        if self.password.chars().count() < 8 {
            return Err(ApiError::bad_request(
                "Password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

/// UpdateProfileRequest
///
/// Partial update of a customer profile. Roles change only through the admin endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// UpdateRoleRequest
///
/// The role is kept as a raw string so that the self-change rule can be applied
/// before the value is validated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// CreateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Name is required"));
        }
        Ok(())
    }

    pub fn resolved_slug(&self) -> String {
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

/// UpdateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(ApiError::bad_request("Name cannot be empty"));
        }
        Ok(())
    }
}

/// CreateProductRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_featured: bool,
    // Produced by the upload endpoint.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_file_id: Option<String>,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Name is required"));
        }
        if self.price_cents < 0 {
            return Err(ApiError::bad_request("Price cannot be negative"));
        }
        if self.stock < 0 {
            return Err(ApiError::bad_request("Stock cannot be negative"));
        }
        Ok(())
    }

    pub fn resolved_slug(&self) -> String {
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

/// UpdateProductRequest
///
/// Partial update; only `Some` fields are written (`COALESCE` in the repository).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file_id: Option<String>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(ApiError::bad_request("Name cannot be empty"));
        }
        if matches!(self.price_cents, Some(p) if p < 0) {
            return Err(ApiError::bad_request("Price cannot be negative"));
        }
        if matches!(self.stock, Some(s) if s < 0) {
            return Err(ApiError::bad_request("Stock cannot be negative"));
        }
        Ok(())
    }
}

/// AddCartItemRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub quantity: Option<i32>,
}

/// UpdateCartItemRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// CheckoutRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping_address: Option<String>,
}

/// CheckoutResponse
///
/// The hosted payment page the client must be sent to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub url: String,
}

/// ConfirmCheckoutRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ConfirmCheckoutRequest {
    pub session_id: String,
}

/// UpdateOrderStatusRequest
///
/// Raw status string; validated against `OrderStatus` by the handler.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// UploadImageRequest
///
/// `data` is plain base64 or a `data:<mime>;base64,` URL.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadImageRequest {
    pub data: String,
    pub file_name: String,
    #[serde(default)]
    pub folder: Option<String>,
}

/// UploadImageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UploadImageResponse {
    pub url: String,
    pub file_id: String,
}

// --- Dashboard Schemas (Output) ---

/// AdminDashboardStats
///
/// Output schema for `GET /api/admin/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Sum of order totals in revenue-counting statuses, in cents.
    pub revenue_cents: i64,
}

// --- Helpers ---

/// slugify
///
/// Lower-cases ASCII alphanumerics and collapses every other run of characters
/// into a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn resolve_slug(explicit: Option<&str>, name: &str) -> String {
    match explicit.map(slugify) {
        Some(slug) if !slug.is_empty() => slug,
        _ => slugify(name),
    }
}

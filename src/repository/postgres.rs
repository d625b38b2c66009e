use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{ProductFilter, RepoResult, Repository};
use crate::models::{
    AdminDashboardStats, Cart, CartItem, CartLine, Category, CreateCategoryRequest,
    CreateProductRequest, NewOrder, Order, OrderItem, OrderStatus, Product, Role,
    UpdateCategoryRequest, UpdateProductRequest, UpdateProfileRequest, User, slugify,
};

const USER_COLUMNS: &str = "id, email, name, image, role, created_at";
const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at";
const PRODUCT_COLUMNS: &str = "id, name, slug, description, price_cents, stock, image_url, \
     image_file_id, category_id, is_featured, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, status, total_cents, checkout_session_id, \
     shipping_address, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_user
    ///
    /// Mirrors an identity-provider account into the local `users` table.
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, name, image, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(user.email)
            .bind(user.name)
            .bind(user.image)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), image = COALESCE($3, image) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.image)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> RepoResult<Option<User>> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let slug = req.resolved_slug();
        let sql = format!(
            "INSERT INTO categories (id, name, slug, description, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {CATEGORY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name.trim())
            .bind(slug)
            .bind(req.description)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>> {
        let sql = format!(
            "UPDATE categories SET name = COALESCE($2, name), slug = COALESCE($3, slug), \
             description = COALESCE($4, description) WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(req.name.map(|n| n.trim().to_string()))
            .bind(req.slug.map(|s| slugify(&s)))
            .bind(req.description)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- PRODUCTS ---

    /// list_products
    ///
    /// Builds the filter with `QueryBuilder` so every user-supplied value is bound,
    /// never interpolated.
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

        if let Some(category) = filter.category {
            builder.push(" AND category_id = ");
            builder.push_bind(category);
        }

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if filter.featured == Some(true) {
            builder.push(" AND is_featured = TRUE");
        }

        builder.push(" ORDER BY created_at DESC");

        Ok(builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_product(&self, req: CreateProductRequest) -> RepoResult<Product> {
        let slug = req.resolved_slug();
        let sql = format!(
            "INSERT INTO products (id, name, slug, description, price_cents, stock, image_url, \
             image_file_id, category_id, is_featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name.trim())
            .bind(slug)
            .bind(req.description)
            .bind(req.price_cents)
            .bind(req.stock)
            .bind(req.image_url)
            .bind(req.image_file_id)
            .bind(req.category_id)
            .bind(req.is_featured)
            .fetch_one(&self.pool)
            .await?)
    }

    /// update_product
    ///
    /// Partial update: `COALESCE` keeps the stored value for every `None` field.
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> RepoResult<Option<Product>> {
        let sql = format!(
            "UPDATE products SET \
                name = COALESCE($2, name), \
                slug = COALESCE($3, slug), \
                description = COALESCE($4, description), \
                price_cents = COALESCE($5, price_cents), \
                stock = COALESCE($6, stock), \
                category_id = COALESCE($7, category_id), \
                is_featured = COALESCE($8, is_featured), \
                image_url = COALESCE($9, image_url), \
                image_file_id = COALESCE($10, image_file_id), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(req.name.map(|n| n.trim().to_string()))
            .bind(req.slug.map(|s| slugify(&s)))
            .bind(req.description)
            .bind(req.price_cents)
            .bind(req.stock)
            .bind(req.category_id)
            .bind(req.is_featured)
            .bind(req.image_url)
            .bind(req.image_file_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- CART ---

    /// get_or_create_cart
    ///
    /// The no-op `DO UPDATE` makes `RETURNING` yield the existing row on conflict.
    async fn get_or_create_cart(&self, user_id: Uuid) -> RepoResult<Cart> {
        Ok(sqlx::query_as::<_, Cart>(
            "INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id, user_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_cart_lines(&self, cart_id: Uuid) -> RepoResult<Vec<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>(
            r#"
            SELECT ci.id AS item_id, p.id AS product_id, p.name, p.price_cents,
                   ci.quantity, p.stock, p.image_url
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY p.name ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> RepoResult<CartItem> {
        Ok(sqlx::query_as::<_, CartItem>(
            r#"
            WITH upserted AS (
                INSERT INTO cart_items (id, cart_id, product_id, quantity)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (cart_id, product_id)
                DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
                RETURNING id, cart_id, product_id, quantity
            )
            SELECT u.id, u.cart_id, c.user_id, u.product_id, u.quantity
            FROM upserted u JOIN carts c ON c.id = u.cart_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?)
    }

    /// get_cart_item
    ///
    /// Joins the owning cart so the authorization guard can compare `user_id`.
    async fn get_cart_item(&self, id: Uuid) -> RepoResult<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "SELECT ci.id, ci.cart_id, c.user_id, ci.product_id, ci.quantity \
             FROM cart_items ci JOIN carts c ON c.id = ci.cart_id WHERE ci.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> RepoResult<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            r#"
            WITH updated AS (
                UPDATE cart_items SET quantity = $2 WHERE id = $1
                RETURNING id, cart_id, product_id, quantity
            )
            SELECT u.id, u.cart_id, c.user_id, u.product_id, u.quantity
            FROM updated u JOIN carts c ON c.id = u.cart_id
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn remove_cart_products(
        &self,
        cart_id: Uuid,
        product_ids: &[Uuid],
    ) -> RepoResult<u64> {
        if product_ids.is_empty() {
            return Ok(0);
        }
        let res =
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = ANY($2)")
                .bind(cart_id)
                .bind(product_ids.to_vec())
                .execute(&self.pool)
                .await?;
        Ok(res.rows_affected())
    }

    // --- ORDERS ---

    /// create_order
    ///
    /// Inserts the order header and every line inside one transaction.
    async fn create_order(&self, order: NewOrder) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO orders (id, user_id, status, total_cents, shipping_address, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             RETURNING {ORDER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(Uuid::new_v4())
            .bind(order.user_id)
            .bind(OrderStatus::Pending)
            .bind(order.total_cents)
            .bind(order.shipping_address)
            .fetch_one(&mut *tx)
            .await?;

        for item in order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, product_name, \
                 unit_price_cents, quantity) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(item.product_id)
            .bind(item.product_name)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn attach_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> RepoResult<Option<Order>> {
        let sql = format!(
            "UPDATE orders SET checkout_session_id = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_order_by_checkout_session(
        &self,
        session_id: &str,
    ) -> RepoResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE checkout_session_id = $1");
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_order_items(&self, order_id: Uuid) -> RepoResult<Vec<OrderItem>> {
        Ok(sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, product_name, unit_price_cents, quantity \
             FROM order_items WHERE order_id = $1 ORDER BY product_name ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, Order>(&sql).fetch_all(&self.pool).await?)
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let sql = format!(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// transition_order_status
    ///
    /// Compare-and-set on the status column. `None` means the order is gone or
    /// was no longer in `expected` when the UPDATE ran.
    async fn transition_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        let sql = format!(
            "UPDATE orders SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {ORDER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(expected)
            .bind(next)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_order(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// get_stats
    ///
    /// Compiles every dashboard counter in a single round trip.
    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        let (total_users, total_products, total_orders, pending_orders, revenue_cents) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM products),
                    (SELECT COUNT(*) FROM orders),
                    (SELECT COUNT(*) FROM orders WHERE status = 'PENDING'),
                    (SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders
                     WHERE status IN ('PAID', 'PROCESSING', 'SHIPPED', 'DELIVERED'))
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminDashboardStats {
            total_users,
            total_products,
            total_orders,
            pending_orders,
            revenue_cents,
        })
    }
}

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ProductFilter, RepoError, RepoResult, Repository};
use crate::models::{
    AdminDashboardStats, Cart, CartItem, CartLine, Category, CreateCategoryRequest,
    CreateProductRequest, NewOrder, Order, OrderItem, OrderStatus, Product, Role,
    MAX_LINE_QUANTITY, UpdateCategoryRequest, UpdateProductRequest, UpdateProfileRequest, User,
    slugify,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    carts: Vec<Cart>,
    // (id, cart_id, product_id, quantity)
    cart_items: Vec<(Uuid, Uuid, Uuid, i32)>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
}

impl Tables {
    fn category_taken(&self, name: &str, slug: &str, except: Option<Uuid>) -> bool {
        self.categories
            .iter()
            .filter(|c| Some(c.id) != except)
            .any(|c| c.name == name || c.slug == slug)
    }

    fn product_slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.products
            .iter()
            .filter(|p| Some(p.id) != except)
            .any(|p| p.slug == slug)
    }

    fn cart_item(&self, id: Uuid) -> Option<CartItem> {
        let (id, cart_id, product_id, quantity) =
            *self.cart_items.iter().find(|(item_id, ..)| *item_id == id)?;
        let user_id = self.carts.iter().find(|c| c.id == cart_id)?.user_id;
        Some(CartItem {
            id,
            cart_id,
            user_id,
            product_id,
            quantity,
        })
    }
}

/// MemoryRepository
///
/// An in-process implementation of `Repository` with the same semantics as the
/// Postgres one (cascades, upserts, partial updates). Used by the test suites
/// and for running the service without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    /// When true, every operation fails with `RepoError::Unavailable`.
    pub should_fail: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> RepoResult<()> {
        if self.should_fail {
            return Err(RepoError::Unavailable(
                "Memory repository: failure simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        self.check()?;
        let mut t = self.tables.write().await;
        if t.users
            .iter()
            .any(|u| u.id == user.id || u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(RepoError::Conflict(format!("user {} already exists", user.email)));
        }
        let user = User {
            created_at: Utc::now(),
            ..user
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.users.iter().rev().cloned().collect())
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> RepoResult<Option<User>> {
        self.check()?;
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|user| {
            if let Some(name) = req.name {
                user.name = Some(name);
            }
            if let Some(image) = req.image {
                user.image = Some(image);
            }
            user.clone()
        }))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> RepoResult<Option<User>> {
        self.check()?;
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Ok(false);
        }
        // ON DELETE CASCADE: carts, cart items, orders, order items.
        let cart_ids: Vec<Uuid> = t
            .carts
            .iter()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        t.carts.retain(|c| c.user_id != id);
        t.cart_items
            .retain(|(_, cart_id, ..)| !cart_ids.contains(cart_id));
        let order_ids: Vec<Uuid> = t
            .orders
            .iter()
            .filter(|o| o.user_id == id)
            .map(|o| o.id)
            .collect();
        t.orders.retain(|o| o.user_id != id);
        t.order_items.retain(|i| !order_ids.contains(&i.order_id));
        Ok(true)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut categories = t.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        self.check()?;
        let mut t = self.tables.write().await;
        let category = Category {
            id: Uuid::new_v4(),
            slug: req.resolved_slug(),
            name: req.name.trim().to_string(),
            description: req.description,
            created_at: Utc::now(),
        };
        if t.category_taken(&category.name, &category.slug, None) {
            return Err(RepoError::Conflict(format!("category {} already exists", category.slug)));
        }
        t.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> RepoResult<Option<Category>> {
        self.check()?;
        let mut t = self.tables.write().await;
        let Some(current) = t.categories.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        let name = req.name.map(|n| n.trim().to_string()).unwrap_or(current.name);
        let slug = req.slug.map(|s| slugify(&s)).unwrap_or(current.slug);
        if t.category_taken(&name, &slug, Some(id)) {
            return Err(RepoError::Conflict(format!("category {slug} already exists")));
        }
        Ok(t.categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = name;
            c.slug = slug;
            if let Some(description) = req.description {
                c.description = Some(description);
            }
            c.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.categories.len();
        t.categories.retain(|c| c.id != id);
        if t.categories.len() == before {
            return Ok(false);
        }
        // ON DELETE SET NULL
        for product in t.products.iter_mut().filter(|p| p.category_id == Some(id)) {
            product.category_id = None;
        }
        Ok(true)
    }

    // --- PRODUCTS ---

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        self.check()?;
        let t = self.tables.read().await;
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        Ok(t
            .products
            .iter()
            .rev()
            .filter(|p| filter.category.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| filter.featured != Some(true) || p.is_featured)
            .filter(|p| match &needle {
                Some(n) => {
                    p.name.to_lowercase().contains(n) || p.description.to_lowercase().contains(n)
                }
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, req: CreateProductRequest) -> RepoResult<Product> {
        self.check()?;
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            slug: req.resolved_slug(),
            name: req.name.trim().to_string(),
            description: req.description,
            price_cents: req.price_cents,
            stock: req.stock,
            image_url: req.image_url,
            image_file_id: req.image_file_id,
            category_id: req.category_id,
            is_featured: req.is_featured,
            created_at: now,
            updated_at: now,
        };
        if t.product_slug_taken(&product.slug, None) {
            return Err(RepoError::Conflict(format!("product {} already exists", product.slug)));
        }
        t.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> RepoResult<Option<Product>> {
        self.check()?;
        let mut t = self.tables.write().await;
        if let Some(slug) = req.slug.as_deref().map(slugify) {
            if t.product_slug_taken(&slug, Some(id)) {
                return Err(RepoError::Conflict(format!("product {slug} already exists")));
            }
        }
        Ok(t.products.iter_mut().find(|p| p.id == id).map(|p| {
            if let Some(name) = req.name {
                p.name = name.trim().to_string();
            }
            if let Some(slug) = req.slug {
                p.slug = slugify(&slug);
            }
            if let Some(description) = req.description {
                p.description = description;
            }
            if let Some(price) = req.price_cents {
                p.price_cents = price;
            }
            if let Some(stock) = req.stock {
                p.stock = stock;
            }
            if req.category_id.is_some() {
                p.category_id = req.category_id;
            }
            if let Some(featured) = req.is_featured {
                p.is_featured = featured;
            }
            if req.image_url.is_some() {
                p.image_url = req.image_url;
            }
            if req.image_file_id.is_some() {
                p.image_file_id = req.image_file_id;
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        if t.products.len() == before {
            return Ok(false);
        }
        t.cart_items.retain(|(_, _, product_id, _)| *product_id != id);
        for item in t.order_items.iter_mut().filter(|i| i.product_id == Some(id)) {
            item.product_id = None;
        }
        Ok(true)
    }

    // --- CART ---

    async fn get_or_create_cart(&self, user_id: Uuid) -> RepoResult<Cart> {
        self.check()?;
        let mut t = self.tables.write().await;
        if let Some(cart) = t.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let cart = Cart {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        };
        t.carts.push(cart.clone());
        Ok(cart)
    }

    async fn get_cart_lines(&self, cart_id: Uuid) -> RepoResult<Vec<CartLine>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut lines: Vec<CartLine> = t
            .cart_items
            .iter()
            .filter(|(_, c, ..)| *c == cart_id)
            .filter_map(|&(item_id, _, product_id, quantity)| {
                let p = t.products.iter().find(|p| p.id == product_id)?;
                Some(CartLine {
                    item_id,
                    product_id,
                    name: p.name.clone(),
                    price_cents: p.price_cents,
                    quantity,
                    stock: p.stock,
                    image_url: p.image_url.clone(),
                })
            })
            .collect();
        lines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lines)
    }

    async fn add_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> RepoResult<CartItem> {
        self.check()?;
        let mut t = self.tables.write().await;
        let existing = t
            .cart_items
            .iter()
            .position(|(_, c, p, _)| *c == cart_id && *p == product_id);
        let current = existing.map_or(0, |idx| t.cart_items[idx].3);
        let total = current
            .checked_add(quantity)
            .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
            .ok_or_else(|| {
                RepoError::OutOfRange(format!("cart line quantity {current} + {quantity}"))
            })?;
        let id = match existing {
            Some(idx) => {
                t.cart_items[idx].3 = total;
                t.cart_items[idx].0
            }
            None => {
                let id = Uuid::new_v4();
                t.cart_items.push((id, cart_id, product_id, quantity));
                id
            }
        };
        t.cart_item(id).ok_or_else(|| {
            RepoError::Unavailable(format!("cart {cart_id} vanished during insert"))
        })
    }

    async fn get_cart_item(&self, id: Uuid) -> RepoResult<Option<CartItem>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.cart_item(id))
    }

    async fn set_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> RepoResult<Option<CartItem>> {
        self.check()?;
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(RepoError::OutOfRange(format!("cart line quantity {quantity}")));
        }
        let mut t = self.tables.write().await;
        match t.cart_items.iter_mut().find(|(item_id, ..)| *item_id == id) {
            Some(item) => item.3 = quantity,
            None => return Ok(None),
        }
        Ok(t.cart_item(id))
    }

    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.cart_items.len();
        t.cart_items.retain(|(item_id, ..)| *item_id != id);
        Ok(t.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> RepoResult<u64> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.cart_items.len();
        t.cart_items.retain(|(_, c, ..)| *c != cart_id);
        Ok((before - t.cart_items.len()) as u64)
    }

    async fn remove_cart_products(
        &self,
        cart_id: Uuid,
        product_ids: &[Uuid],
    ) -> RepoResult<u64> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.cart_items.len();
        t.cart_items
            .retain(|(_, c, p, _)| *c != cart_id || !product_ids.contains(p));
        Ok((before - t.cart_items.len()) as u64)
    }

    // --- ORDERS ---

    async fn create_order(&self, order: NewOrder) -> RepoResult<Order> {
        self.check()?;
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            status: OrderStatus::Pending,
            total_cents: order.total_cents,
            checkout_session_id: None,
            shipping_address: order.shipping_address,
            created_at: now,
            updated_at: now,
        };
        for item in order.items {
            t.order_items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id: created.id,
                product_id: Some(item.product_id),
                product_name: item.product_name,
                unit_price_cents: item.unit_price_cents,
                quantity: item.quantity,
            });
        }
        t.orders.push(created.clone());
        Ok(created)
    }

    async fn attach_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> RepoResult<Option<Order>> {
        self.check()?;
        let mut t = self.tables.write().await;
        Ok(t.orders.iter_mut().find(|o| o.id == order_id).map(|o| {
            o.checkout_session_id = Some(session_id.to_string());
            o.updated_at = Utc::now();
            o.clone()
        }))
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn get_order_by_checkout_session(
        &self,
        session_id: &str,
    ) -> RepoResult<Option<Order>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t
            .orders
            .iter()
            .find(|o| o.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn get_order_items(&self, order_id: Uuid) -> RepoResult<Vec<OrderItem>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut items: Vec<OrderItem> = t
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.product_name.cmp(&b.product_name));
        Ok(items)
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.orders.iter().rev().cloned().collect())
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        self.check()?;
        let mut t = self.tables.write().await;
        Ok(t.orders.iter_mut().find(|o| o.id == id).map(|o| {
            o.status = status;
            o.updated_at = Utc::now();
            o.clone()
        }))
    }

    async fn transition_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> RepoResult<Option<Order>> {
        self.check()?;
        let mut t = self.tables.write().await;
        Ok(t
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.status == expected)
            .map(|o| {
                o.status = next;
                o.updated_at = Utc::now();
                o.clone()
            }))
    }

    async fn delete_order(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut t = self.tables.write().await;
        let before = t.orders.len();
        t.orders.retain(|o| o.id != id);
        if t.orders.len() == before {
            return Ok(false);
        }
        t.order_items.retain(|i| i.order_id != id);
        Ok(true)
    }

    async fn get_stats(&self) -> RepoResult<AdminDashboardStats> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(AdminDashboardStats {
            total_users: t.users.len() as i64,
            total_products: t.products.len() as i64,
            total_orders: t.orders.len() as i64,
            pending_orders: t
                .orders
                .iter()
                .filter(|o| o.status == OrderStatus::Pending)
                .count() as i64,
            revenue_cents: t
                .orders
                .iter()
                .filter(|o| o.status.is_revenue())
                .map(|o| o.total_cents)
                .sum(),
        })
    }
}

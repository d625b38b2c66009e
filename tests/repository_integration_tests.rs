use chrono::Utc;
use pettech_store::{
    models::{
        CreateCategoryRequest, CreateProductRequest, MAX_LINE_QUANTITY, NewOrder, NewOrderItem,
        OrderStatus, Role, UpdateCategoryRequest, UpdateProductRequest, UpdateProfileRequest, User,
    },
    repository::{MemoryRepository, PostgresRepository, ProductFilter, RepoError, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Connects to `DATABASE_URL` and applies the migrations.
async fn postgres_repository() -> PostgresRepository {
    dotenv::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run integration tests");

    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");

    PostgresRepository::new(pool)
}

// --- Test Data Helpers ---

/// Short random suffix so the same scenarios can run repeatedly against a
/// shared database.
fn unique(label: &str) -> String {
    format!("{label} {}", &Uuid::new_v4().simple().to_string()[..8])
}

async fn create_user<R: Repository>(repo: &R, role: Role) -> User {
    repo.create_user(User {
        id: Uuid::new_v4(),
        email: format!("{}@pettech.test", Uuid::new_v4().simple()),
        name: Some("Test Owner".to_string()),
        image: None,
        role,
        created_at: Utc::now(),
    })
    .await
    .unwrap()
}

async fn create_product<R: Repository>(repo: &R, price_cents: i64, category_id: Option<Uuid>) -> pettech_store::models::Product {
    repo.create_product(CreateProductRequest {
        name: unique("Smart Feeder"),
        description: "Schedules meals for cats and dogs".to_string(),
        price_cents,
        stock: 10,
        category_id,
        ..Default::default()
    })
    .await
    .unwrap()
}

// --- Shared scenarios (run against every backend) ---

async fn users_scenario<R: Repository>(repo: &R) {
    let user = create_user(repo, Role::User).await;

    let by_email = repo
        .get_user_by_email(&user.email.to_uppercase())
        .await
        .unwrap()
        .expect("email lookup is case-insensitive");
    assert_eq!(by_email.id, user.id);

    let duplicate = repo
        .create_user(User {
            id: Uuid::new_v4(),
            ..user.clone()
        })
        .await
        .unwrap_err();
    assert!(duplicate.is_conflict());

    let updated = repo
        .update_user_profile(
            user.id,
            UpdateProfileRequest {
                name: None,
                image: Some("https://cdn.pettech.test/me.png".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Test Owner"));
    assert_eq!(updated.image.as_deref(), Some("https://cdn.pettech.test/me.png"));

    let promoted = repo.set_user_role(user.id, Role::Admin).await.unwrap().unwrap();
    assert_eq!(promoted.role, Role::Admin);

    assert!(repo.set_user_role(Uuid::new_v4(), Role::Admin).await.unwrap().is_none());
}

async fn catalog_scenario<R: Repository>(repo: &R) {
    let name = unique("Cat Toys");
    let category = repo
        .create_category(CreateCategoryRequest {
            name: name.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(category.slug.starts_with("cat-toys-"));

    let clash = repo
        .create_category(CreateCategoryRequest {
            name: format!("{name} again"),
            slug: Some(category.slug.clone()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(clash.is_conflict());

    let renamed = repo
        .update_category(
            category.id,
            UpdateCategoryRequest {
                description: Some("Lasers and feathers".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, name);
    assert_eq!(renamed.description.as_deref(), Some("Lasers and feathers"));

    let product = create_product(repo, 1_299, Some(category.id)).await;
    let in_category = repo
        .list_products(&ProductFilter {
            category: Some(category.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(in_category.len(), 1);

    let searched = repo
        .list_products(&ProductFilter {
            search: Some(product.name.to_uppercase()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(searched.iter().any(|p| p.id == product.id));

    let updated = repo
        .update_product(
            product.id,
            UpdateProductRequest {
                stock: Some(0),
                is_featured: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock, 0);
    assert!(updated.is_featured);
    assert_eq!(updated.price_cents, 1_299);

    // Deleting the category keeps the product, uncategorized.
    assert!(repo.delete_category(category.id).await.unwrap());
    let orphan = repo.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(orphan.category_id, None);

    assert!(repo.delete_product(product.id).await.unwrap());
    assert!(!repo.delete_product(product.id).await.unwrap());
}

async fn cart_scenario<R: Repository>(repo: &R) {
    let user = create_user(repo, Role::User).await;
    let feeder = create_product(repo, 2_500, None).await;
    let collar = create_product(repo, 8_900, None).await;

    let cart = repo.get_or_create_cart(user.id).await.unwrap();
    assert_eq!(repo.get_or_create_cart(user.id).await.unwrap().id, cart.id);

    let first = repo.add_cart_item(cart.id, feeder.id, 1).await.unwrap();
    let merged = repo.add_cart_item(cart.id, feeder.id, 2).await.unwrap();
    assert_eq!(first.id, merged.id);
    assert_eq!(merged.quantity, 3);
    assert_eq!(merged.user_id, user.id);

    repo.add_cart_item(cart.id, collar.id, 1).await.unwrap();
    let lines = repo.get_cart_lines(cart.id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.iter().map(|l| l.subtotal_cents()).sum::<i64>(), 16_400);

    let set = repo.set_cart_item_quantity(merged.id, 5).await.unwrap().unwrap();
    assert_eq!(set.quantity, 5);

    // Quantities past the line maximum are refused, never wrapped.
    let overflow = repo.add_cart_item(cart.id, feeder.id, i32::MAX).await;
    assert!(overflow.unwrap_err().is_out_of_range());
    let too_many = repo.set_cart_item_quantity(merged.id, MAX_LINE_QUANTITY + 1).await;
    assert!(too_many.unwrap_err().is_out_of_range());
    assert_eq!(repo.get_cart_item(merged.id).await.unwrap().unwrap().quantity, 5);

    let leash = create_product(repo, 1_200, None).await;
    repo.add_cart_item(cart.id, leash.id, 1).await.unwrap();
    let removed = repo
        .remove_cart_products(cart.id, &[leash.id, Uuid::new_v4()])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(repo.get_cart_lines(cart.id).await.unwrap().len(), 2);

    // Removing a product removes it from carts.
    repo.delete_product(collar.id).await.unwrap();
    assert_eq!(repo.get_cart_lines(cart.id).await.unwrap().len(), 1);

    assert_eq!(repo.clear_cart(cart.id).await.unwrap(), 1);
    assert!(repo.get_cart_item(merged.id).await.unwrap().is_none());
    assert!(!repo.delete_cart_item(merged.id).await.unwrap());
}

async fn orders_scenario<R: Repository>(repo: &R) {
    let user = create_user(repo, Role::User).await;
    let feeder = create_product(repo, 2_500, None).await;

    let order = repo
        .create_order(NewOrder {
            user_id: user.id,
            total_cents: 5_000,
            shipping_address: Some("1 Kibble Lane".to_string()),
            items: vec![NewOrderItem {
                product_id: feeder.id,
                product_name: feeder.name.clone(),
                unit_price_cents: 2_500,
                quantity: 2,
            }],
        })
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);

    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    repo.attach_checkout_session(order.id, &session_id).await.unwrap();
    let found = repo
        .get_order_by_checkout_session(&session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, order.id);

    // Compare-and-set only moves an order that is still in the expected state.
    let stale = repo
        .transition_order_status(order.id, OrderStatus::Paid, OrderStatus::Shipped)
        .await
        .unwrap();
    assert!(stale.is_none());
    let paid = repo
        .transition_order_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    let repeated = repo
        .transition_order_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
        .await
        .unwrap();
    assert!(repeated.is_none());

    let paid = repo.set_order_status(order.id, OrderStatus::Paid).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    // Product removal keeps the order line and its snapshot.
    repo.delete_product(feeder.id).await.unwrap();
    let items = repo.get_order_items(order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, None);
    assert_eq!(items[0].product_name, feeder.name);

    let mine = repo.list_orders_for_user(user.id).await.unwrap();
    assert_eq!(mine.len(), 1);

    // Deleting the user cascades to their orders.
    assert!(repo.delete_user(user.id).await.unwrap());
    assert!(repo.get_order(order.id).await.unwrap().is_none());
    assert!(repo.get_order_items(order.id).await.unwrap().is_empty());
}

// --- In-memory backend ---

#[tokio::test]
async fn test_memory_users() {
    users_scenario(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_catalog() {
    catalog_scenario(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_cart() {
    cart_scenario(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_orders() {
    orders_scenario(&MemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_stats() {
    let repo = MemoryRepository::new();
    let user = create_user(&repo, Role::User).await;
    create_product(&repo, 100, None).await;
    for (total, status) in [
        (1_000, OrderStatus::Pending),
        (2_000, OrderStatus::Shipped),
        (4_000, OrderStatus::Cancelled),
    ] {
        let order = repo
            .create_order(NewOrder {
                user_id: user.id,
                total_cents: total,
                ..Default::default()
            })
            .await
            .unwrap();
        repo.set_order_status(order.id, status).await.unwrap();
    }

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.total_products, 1);
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.revenue_cents, 2_000);
}

#[tokio::test]
async fn test_memory_failure_simulation() {
    let repo = MemoryRepository::new_failing();
    let err = repo.get_user(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, RepoError::Unavailable(_)));
    assert!(!err.is_conflict());
}

// --- Postgres backend (needs DATABASE_URL) ---

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_postgres_users() {
    users_scenario(&postgres_repository().await).await;
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_postgres_catalog() {
    catalog_scenario(&postgres_repository().await).await;
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_postgres_cart() {
    cart_scenario(&postgres_repository().await).await;
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_postgres_orders() {
    orders_scenario(&postgres_repository().await).await;
}

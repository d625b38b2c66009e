use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    auth::MaybeSession,
    error::{ApiError, ApiResult, ErrorBody},
    extract::{ApiJson, ApiPath, ApiQuery},
    guard::require_admin,
    models::{
        Category, CreateCategoryRequest, CreateProductRequest, Product, UpdateCategoryRequest,
        UpdateProductRequest,
    },
    repository::ProductFilter,
};

// --- Public catalog ---

/// list_products
///
/// [Public Route] Lists products, newest first, filtered by category, search
/// text and the featured flag.
#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductFilter),
    responses((status = 200, description = "Products", body = [Product]))
)]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.repo.list_products(&filter).await?))
}

/// get_product
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = Product),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Product>> {
    state
        .repo
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// list_categories
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// get_category
#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Category>> {
    state
        .repo
        .get_category(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

// --- Catalog management ---

async fn ensure_category_exists(state: &AppState, category_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(id) = category_id {
        if state.repo.get_category(id).await?.is_none() {
            return Err(ApiError::bad_request("Unknown category"));
        }
    }
    Ok(())
}

/// create_category
///
/// [Admin Route] The slug is derived from the name when omitted.
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Duplicate name or slug", body = ErrorBody)
    )
)]
pub async fn create_category(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    require_admin(session.as_ref())?;
    payload.validate()?;
    let category = state.repo.create_category(payload).await?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_category(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCategoryRequest>,
) -> ApiResult<Json<Category>> {
    require_admin(session.as_ref())?;
    payload.validate()?;
    state
        .repo
        .update_category(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// delete_category
///
/// [Admin Route] Products in the category stay and lose their category.
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_category(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(session.as_ref())?;
    if state.repo.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Category not found"))
    }
}

/// create_product
#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Duplicate slug", body = ErrorBody)
    )
)]
pub async fn create_product(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    require_admin(session.as_ref())?;
    payload.validate()?;
    ensure_category_exists(&state, payload.category_id).await?;

    let product = state.repo.create_product(payload).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// update_product
///
/// [Admin Route] Partial update; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_product(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    require_admin(session.as_ref())?;
    payload.validate()?;
    ensure_category_exists(&state, payload.category_id).await?;

    state
        .repo
        .update_product(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// delete_product
///
/// [Admin Route] Also removes the hosted image. Failing to remove the image is
/// logged and does not fail the request: the product row is already gone.
#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_product(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(session.as_ref())?;

    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    if !state.repo.delete_product(id).await? {
        return Err(ApiError::not_found("Product not found"));
    }

    if let Some(file_id) = product.image_file_id.as_deref() {
        if let Err(e) = state.storage.delete_image(file_id).await {
            tracing::warn!(product_id = %id, file_id = %file_id, error = %e, "failed to delete product image");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

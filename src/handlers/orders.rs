use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    auth::MaybeSession,
    error::{ApiError, ApiResult, ErrorBody},
    extract::{ApiJson, ApiPath},
    guard::{Capability, require_admin, require_session},
    models::{
        CheckoutRequest, CheckoutResponse, ConfirmCheckoutRequest, NewOrder, NewOrderItem, Order,
        OrderDetail, OrderStatus, UpdateOrderStatusRequest,
    },
    payment::{CheckoutLine, NewCheckoutSession, PaymentStatus},
};

// --- Checkout ---

/// checkout
///
/// [Authenticated Route] Turns the caller's cart into a `PENDING` order and
/// opens a hosted checkout session for it.
///
/// *Flow*:
/// 1. Load the cart; an empty cart or a line above stock is a 400.
/// 2. Create the order with name/price snapshots of every line.
/// 3. Ask the payment provider for a checkout session. If that fails the
///    order is removed again so no orphan `PENDING` order is left behind.
/// 4. Store the session id on the order and return the payment page URL.
#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout started", body = CheckoutResponse),
        (status = 400, description = "Empty cart or insufficient stock", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn checkout(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let session = require_session(session.as_ref())?;

    let cart = state.repo.get_or_create_cart(session.user_id).await?;
    let lines = state.repo.get_cart_lines(cart.id).await?;
    if lines.is_empty() {
        return Err(ApiError::bad_request("Cart is empty"));
    }
    if let Some(line) = lines.iter().find(|line| line.quantity > line.stock) {
        return Err(ApiError::bad_request(format!(
            "Not enough stock for {}",
            line.name
        )));
    }

    let total_cents = lines.iter().map(|line| line.subtotal_cents()).sum();
    let shipping_address = payload
        .shipping_address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    let order = state
        .repo
        .create_order(NewOrder {
            user_id: session.user_id,
            total_cents,
            shipping_address,
            items: lines
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.product_id,
                    product_name: line.name.clone(),
                    unit_price_cents: line.price_cents,
                    quantity: line.quantity,
                })
                .collect(),
        })
        .await?;

    let public_url = state.config.public_url.trim_end_matches('/');
    let request = NewCheckoutSession {
        order_id: order.id,
        customer_email: session.email.clone(),
        currency: state.config.currency.clone(),
        lines: lines
            .iter()
            .map(|line| CheckoutLine {
                name: line.name.clone(),
                unit_amount_cents: line.price_cents,
                quantity: line.quantity,
            })
            .collect(),
        success_url: format!("{public_url}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{public_url}/cart"),
    };

    let checkout = match state.payments.create_checkout_session(&request).await {
        Ok(checkout) => checkout,
        Err(e) => {
            if let Err(cleanup) = state.repo.delete_order(order.id).await {
                tracing::error!(order_id = %order.id, error = %cleanup, "failed to remove order after payment error");
            }
            return Err(e.into());
        }
    };

    let url = checkout
        .url
        .clone()
        .ok_or_else(|| ApiError::upstream(format!("checkout session {} has no url", checkout.id)))?;

    state
        .repo
        .attach_checkout_session(order.id, &checkout.id)
        .await?;

    tracing::info!(order_id = %order.id, checkout_session = %checkout.id, "checkout started");
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order.id,
            url,
        }),
    ))
}

/// confirm_checkout
///
/// [Authenticated Route] Called when the customer returns from the payment
/// page. Marks the order `PAID` once the provider reports the session paid, and
/// removes the ordered products from the customer's cart. Lines added after
/// checkout stay. The `PENDING -> PAID` step is a compare-and-set, so of two
/// concurrent confirmations only one touches the cart.
///
/// *Authorization*: guard `write` on the order found by session id, before the
/// payment provider is contacted.
#[utoipa::path(
    post,
    path = "/api/checkout/confirm",
    request_body = ConfirmCheckoutRequest,
    responses(
        (status = 200, description = "Order after confirmation", body = Order),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "No order for this session", body = ErrorBody)
    )
)]
pub async fn confirm_checkout(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ConfirmCheckoutRequest>,
) -> ApiResult<Json<Order>> {
    let session_id = payload.session_id.trim();
    let order = state
        .guard
        .authorize(session.as_ref(), Capability::Write, || {
            state.repo.get_order_by_checkout_session(session_id)
        })
        .await?;

    let checkout = state.payments.retrieve_checkout_session(session_id).await?;

    if checkout.payment_status != PaymentStatus::Paid || order.status != OrderStatus::Pending {
        return Ok(Json(order));
    }

    let transitioned = state
        .repo
        .transition_order_status(order.id, OrderStatus::Pending, OrderStatus::Paid)
        .await?;
    let Some(paid) = transitioned else {
        // Another request moved the order first.
        return state
            .repo
            .get_order(order.id)
            .await?
            .map(Json)
            .ok_or_else(|| ApiError::not_found("Order not found"));
    };

    let ordered: Vec<Uuid> = state
        .repo
        .get_order_items(paid.id)
        .await?
        .into_iter()
        .filter_map(|item| item.product_id)
        .collect();
    let cart = state.repo.get_or_create_cart(paid.user_id).await?;
    let removed = state.repo.remove_cart_products(cart.id, &ordered).await?;

    tracing::info!(order_id = %paid.id, removed, "order paid");
    Ok(Json(paid))
}

// --- Customer orders ---

/// list_my_orders
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "My Orders", body = [Order]),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn list_my_orders(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Order>>> {
    let session = require_session(session.as_ref())?;
    Ok(Json(state.repo.list_orders_for_user(session.user_id).await?))
}

/// get_order
///
/// [Authenticated Route] One order with its lines.
///
/// *Authorization*: guard `read`; owners see their orders, admins see all.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Found", body = OrderDetail),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_order(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<OrderDetail>> {
    let order = state
        .guard
        .authorize(session.as_ref(), Capability::Read, || state.repo.get_order(id))
        .await?;
    let items = state.repo.get_order_items(order.id).await?;
    Ok(Json(OrderDetail { order, items }))
}

// --- Order management ---

/// list_all_orders
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    responses(
        (status = 200, description = "All orders", body = [Order]),
        (status = 403, description = "Not Admin", body = ErrorBody)
    )
)]
pub async fn list_all_orders(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Order>>> {
    require_admin(session.as_ref())?;
    Ok(Json(state.repo.list_orders().await?))
}

/// update_order_status
///
/// [Admin Route] Moves an order along its lifecycle. Unknown statuses and
/// transitions the lifecycle does not allow are a 400; re-applying the current
/// status returns the order unchanged.
#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Order),
        (status = 400, description = "Invalid status or transition", body = ErrorBody),
        (status = 403, description = "Not Admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_order_status(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateOrderStatusRequest>,
) -> ApiResult<Json<Order>> {
    require_admin(session.as_ref())?;
    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let order = state
        .guard
        .authorize(session.as_ref(), Capability::Write, || state.repo.get_order(id))
        .await?;

    if order.status == next {
        return Ok(Json(order));
    }
    if !order.status.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "Cannot change order status from {} to {}",
            order.status, next
        )));
    }

    let updated = state
        .repo
        .set_order_status(order.id, next)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    tracing::info!(order_id = %updated.id, from = %order.status, to = %next, "order status changed");
    Ok(Json(updated))
}

/// delete_order
///
/// [Admin Route] Orders are never deleted by their owners.
#[utoipa::path(
    delete,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_order(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(session.as_ref())?;
    let order = state
        .guard
        .authorize(session.as_ref(), Capability::Delete, || state.repo.get_order(id))
        .await?;

    if state.repo.delete_order(order.id).await? {
        tracing::info!(order_id = %order.id, "order deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Order not found"))
    }
}

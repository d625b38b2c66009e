use pettech_store::{
    auth::Session,
    guard::{
        Capability, Decision, Denial, DisclosurePolicy, ResourceGuard, require_admin,
        require_session,
    },
    models::{CartItem, Order, Role, User},
    repository::RepoError,
};
use axum::http::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

// --- Helpers ---

const OWNER: Uuid = Uuid::from_u128(1);
const STRANGER: Uuid = Uuid::from_u128(2);
const ADMIN: Uuid = Uuid::from_u128(3);

fn session(user_id: Uuid, role: Role) -> Session {
    Session {
        user_id,
        email: format!("{user_id}@pettech.test"),
        role,
    }
}

fn order_owned_by(user_id: Uuid) -> Order {
    Order {
        id: Uuid::from_u128(100),
        user_id,
        ..Order::default()
    }
}

fn cart_item_owned_by(user_id: Uuid) -> CartItem {
    CartItem {
        id: Uuid::from_u128(200),
        user_id,
        quantity: 1,
        ..CartItem::default()
    }
}

// --- Pure decisions ---

#[test]
fn test_no_session_is_unauthorized_even_for_missing_resource() {
    let guard = ResourceGuard::default();

    let decision = guard.decide::<Order>(None, None, Capability::Read);
    assert_eq!(decision, Decision::Deny(Denial::Unauthorized));

    let order = order_owned_by(OWNER);
    let decision = guard.decide(None, Some(&order), Capability::Read);
    assert_eq!(decision, Decision::Deny(Denial::Unauthorized));
}

#[test]
fn test_missing_resource_is_not_found() {
    let guard = ResourceGuard::default();
    let admin = session(ADMIN, Role::Admin);

    assert_eq!(
        guard.decide::<Order>(Some(&admin), None, Capability::Read),
        Decision::Deny(Denial::NotFound)
    );
}

#[test]
fn test_admin_holds_every_capability() {
    let guard = ResourceGuard::default();
    let admin = session(ADMIN, Role::Admin);
    let order = order_owned_by(OWNER);

    for capability in [Capability::Read, Capability::Write, Capability::Delete] {
        assert_eq!(guard.decide(Some(&admin), Some(&order), capability), Decision::Allow);
    }
}

#[test]
fn test_owner_reads_and_writes_own_order_but_cannot_delete_it() {
    let guard = ResourceGuard::default();
    let owner = session(OWNER, Role::User);
    let order = order_owned_by(OWNER);

    assert_eq!(guard.decide(Some(&owner), Some(&order), Capability::Read), Decision::Allow);
    assert_eq!(guard.decide(Some(&owner), Some(&order), Capability::Write), Decision::Allow);
    assert_eq!(
        guard.decide(Some(&owner), Some(&order), Capability::Delete),
        Decision::Deny(Denial::Forbidden)
    );
}

#[test]
fn test_owner_may_delete_own_cart_item() {
    let guard = ResourceGuard::default();
    let owner = session(OWNER, Role::User);
    let item = cart_item_owned_by(OWNER);

    assert_eq!(guard.decide(Some(&owner), Some(&item), Capability::Delete), Decision::Allow);
}

#[test]
fn test_customer_profile_owner_is_the_user_itself() {
    let guard = ResourceGuard::default();
    let me = session(OWNER, Role::User);
    let profile = User {
        id: OWNER,
        ..User::default()
    };
    let other = User {
        id: STRANGER,
        ..User::default()
    };

    assert_eq!(guard.decide(Some(&me), Some(&profile), Capability::Write), Decision::Allow);
    assert_eq!(
        guard.decide(Some(&me), Some(&other), Capability::Read),
        Decision::Deny(Denial::Forbidden)
    );
    assert_eq!(
        guard.decide(Some(&me), Some(&profile), Capability::Delete),
        Decision::Deny(Denial::Forbidden)
    );
}

#[test]
fn test_stranger_is_forbidden_under_reveal_policy() {
    let guard = ResourceGuard::new(DisclosurePolicy::RevealForbidden);
    let stranger = session(STRANGER, Role::User);
    let order = order_owned_by(OWNER);

    for capability in [Capability::Read, Capability::Write, Capability::Delete] {
        assert_eq!(
            guard.decide(Some(&stranger), Some(&order), capability),
            Decision::Deny(Denial::Forbidden)
        );
    }
}

#[test]
fn test_stranger_sees_not_found_under_conceal_policy() {
    let guard = ResourceGuard::new(DisclosurePolicy::ConcealAsNotFound);
    let stranger = session(STRANGER, Role::User);
    let owner = session(OWNER, Role::User);
    let order = order_owned_by(OWNER);

    assert_eq!(
        guard.decide(Some(&stranger), Some(&order), Capability::Read),
        Decision::Deny(Denial::NotFound)
    );
    // The owner already knows the order exists.
    assert_eq!(
        guard.decide(Some(&owner), Some(&order), Capability::Delete),
        Decision::Deny(Denial::Forbidden)
    );
}

#[test]
fn test_disclosure_policy_parse() {
    assert_eq!(DisclosurePolicy::parse("reveal"), Some(DisclosurePolicy::RevealForbidden));
    assert_eq!(DisclosurePolicy::parse(" CONCEAL "), Some(DisclosurePolicy::ConcealAsNotFound));
    assert_eq!(DisclosurePolicy::parse("maybe"), None);
    assert_eq!(DisclosurePolicy::default(), DisclosurePolicy::RevealForbidden);
}

// --- Error mapping ---

#[test]
fn test_forbidden_body_says_unauthorized() {
    let guard = ResourceGuard::default();
    let stranger = session(STRANGER, Role::User);
    let order = order_owned_by(OWNER);

    let Decision::Deny(denial) = guard.decide(Some(&stranger), Some(&order), Capability::Read)
    else {
        panic!("stranger must be denied");
    };
    let err = denial.into_api_error(pettech_store::guard::ResourceKind::Order);
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(err.client_message(), "Unauthorized");
}

// --- authorize (lookup + decide) ---

#[tokio::test]
async fn test_authorize_skips_lookup_without_session() {
    let guard = ResourceGuard::default();
    let counter = AtomicUsize::new(0);
    let lookups = &counter;

    let result = guard
        .authorize::<Order, _, _>(None, Capability::Read, || async move {
            lookups.fetch_add(1, Ordering::SeqCst);
            Ok(Some(order_owned_by(OWNER)))
        })
        .await;

    assert_eq!(result.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_authorize_returns_the_looked_up_record_once() {
    let guard = ResourceGuard::default();
    let owner = session(OWNER, Role::User);
    let counter = AtomicUsize::new(0);
    let lookups = &counter;

    let order = guard
        .authorize(Some(&owner), Capability::Read, || async move {
            lookups.fetch_add(1, Ordering::SeqCst);
            Ok(Some(order_owned_by(OWNER)))
        })
        .await
        .unwrap();

    assert_eq!(order.user_id, OWNER);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_authorize_maps_missing_record_to_not_found() {
    let guard = ResourceGuard::default();
    let owner = session(OWNER, Role::User);

    let err = guard
        .authorize::<CartItem, _, _>(Some(&owner), Capability::Write, || async { Ok(None) })
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(err.client_message(), "Cart item not found");
}

#[tokio::test]
async fn test_authorize_surfaces_lookup_failure_as_500() {
    let guard = ResourceGuard::default();
    let admin = session(ADMIN, Role::Admin);

    let err = guard
        .authorize::<Order, _, _>(Some(&admin), Capability::Read, || async {
            Err(RepoError::Unavailable("connection reset".to_string()))
        })
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.client_message(), "Internal server error");
}

// --- Role mutation ---

#[test]
fn test_nobody_may_change_their_own_role() {
    let guard = ResourceGuard::default();
    let admin = session(ADMIN, Role::Admin);

    let err = guard.check_role_change(&admin, ADMIN).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(err.client_message(), "You cannot change your own role");

    assert!(guard.check_role_change(&admin, OWNER).is_ok());
}

// --- Role-only checks ---

#[test]
fn test_require_session_and_admin() {
    let user = session(OWNER, Role::User);
    let admin = session(ADMIN, Role::Admin);

    assert_eq!(
        require_session(None).unwrap_err().status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(require_session(Some(&user)).unwrap().user_id, OWNER);

    assert_eq!(
        require_admin(None).unwrap_err().status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        require_admin(Some(&user)).unwrap_err().status_code(),
        StatusCode::FORBIDDEN
    );
    assert!(require_admin(Some(&admin)).is_ok());
}

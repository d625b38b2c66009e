use pettech_store::{
    auth::Session,
    gatekeeper::{GateDecision, GatePaths, Gatekeeper, RouteCategory, RouteRule, RouteTable},
    models::Role,
};
use uuid::Uuid;

// --- Helpers ---

fn session(role: Role) -> Session {
    Session {
        user_id: Uuid::from_u128(7),
        email: "owner@pettech.test".to_string(),
        role,
    }
}

fn redirect(path: &str) -> GateDecision {
    GateDecision::RedirectTo(path.to_string())
}

// --- Classification ---

#[test]
fn test_route_table_classifies_sections() {
    let table = RouteTable::storefront();

    assert_eq!(table.classify("/admin/products"), RouteCategory::Admin);
    assert_eq!(table.classify("/user/orders/42"), RouteCategory::User);
    assert_eq!(table.classify("/login"), RouteCategory::Auth);
    assert_eq!(table.classify("/signup"), RouteCategory::Auth);
    assert_eq!(table.classify("/forgot-password"), RouteCategory::Auth);
    assert_eq!(table.classify("/products/feeder"), RouteCategory::Public);
    assert_eq!(table.classify("/"), RouteCategory::Public);
}

#[test]
fn test_route_table_matches_whole_segments_only() {
    let table = RouteTable::storefront();

    assert_eq!(table.classify("/administrator"), RouteCategory::Public);
    assert_eq!(table.classify("/users"), RouteCategory::Public);
    assert_eq!(table.classify("/login-help"), RouteCategory::Public);
    // The JSON API is not a page section.
    assert_eq!(table.classify("/api/admin/stats"), RouteCategory::Public);
}

#[test]
fn test_route_table_first_match_wins() {
    let table = RouteTable::new(vec![
        RouteRule::new("/admin/help", RouteCategory::Public),
        RouteRule::new("/admin", RouteCategory::Admin),
    ]);

    assert_eq!(table.classify("/admin/help/faq"), RouteCategory::Public);
    assert_eq!(table.classify("/admin/orders"), RouteCategory::Admin);
}

// --- Canonicalization ---

#[test]
fn test_bare_section_roots_redirect_regardless_of_session() {
    let gate = Gatekeeper::default();

    for current in [None, Some(session(Role::User)), Some(session(Role::Admin))] {
        assert_eq!(gate.decide("/admin", current.as_ref()), redirect("/admin/dashboard"));
        assert_eq!(gate.decide("/user", current.as_ref()), redirect("/user/dashboard"));
        assert_eq!(gate.decide("/admin/", current.as_ref()), redirect("/admin/dashboard"));
    }
}

// --- Decision table ---

#[test]
fn test_anonymous_access_to_protected_pages_goes_to_login() {
    let gate = Gatekeeper::default();

    assert_eq!(gate.decide("/admin/dashboard", None), redirect("/login"));
    assert_eq!(gate.decide("/admin/orders/123", None), redirect("/login"));
    assert_eq!(gate.decide("/user/dashboard", None), redirect("/login"));
    assert_eq!(gate.decide("/user/orders", None), redirect("/login"));
}

#[test]
fn test_anonymous_access_to_auth_and_public_pages_is_allowed() {
    let gate = Gatekeeper::default();

    assert_eq!(gate.decide("/login", None), GateDecision::Allow);
    assert_eq!(gate.decide("/signup", None), GateDecision::Allow);
    assert_eq!(gate.decide("/forgot-password", None), GateDecision::Allow);
    assert_eq!(gate.decide("/products", None), GateDecision::Allow);
    assert_eq!(gate.decide("/", None), GateDecision::Allow);
}

#[test]
fn test_signed_in_users_are_sent_away_from_auth_pages() {
    let gate = Gatekeeper::default();
    let user = session(Role::User);
    let admin = session(Role::Admin);

    assert_eq!(gate.decide("/login", Some(&user)), redirect("/user/dashboard"));
    assert_eq!(gate.decide("/signup", Some(&user)), redirect("/user/dashboard"));
    assert_eq!(gate.decide("/login", Some(&admin)), redirect("/admin/dashboard"));
    assert_eq!(
        gate.decide("/forgot-password", Some(&admin)),
        redirect("/admin/dashboard")
    );
}

#[test]
fn test_non_admin_on_admin_page_goes_to_user_dashboard() {
    let gate = Gatekeeper::default();
    let user = session(Role::User);

    assert_eq!(gate.decide("/admin/dashboard", Some(&user)), redirect("/user/dashboard"));
    assert_eq!(gate.decide("/admin/customers", Some(&user)), redirect("/user/dashboard"));
}

#[test]
fn test_sessions_reach_their_own_sections() {
    let gate = Gatekeeper::default();
    let user = session(Role::User);
    let admin = session(Role::Admin);

    assert_eq!(gate.decide("/user/dashboard", Some(&user)), GateDecision::Allow);
    assert_eq!(gate.decide("/admin/dashboard", Some(&admin)), GateDecision::Allow);
    // Admins may open customer pages too.
    assert_eq!(gate.decide("/user/orders", Some(&admin)), GateDecision::Allow);
    assert_eq!(gate.decide("/products", Some(&user)), GateDecision::Allow);
}

#[test]
fn test_decision_is_deterministic() {
    let gate = Gatekeeper::default();
    let user = session(Role::User);

    let first = gate.decide("/admin/orders", Some(&user));
    for _ in 0..10 {
        assert_eq!(gate.decide("/admin/orders", Some(&user)), first);
    }
}

#[test]
fn test_custom_paths_are_honoured() {
    let gate = Gatekeeper::new(
        RouteTable::new(vec![
            RouteRule::new("/backoffice", RouteCategory::Admin),
            RouteRule::new("/account", RouteCategory::User),
            RouteRule::new("/sign-in", RouteCategory::Auth),
        ]),
        GatePaths {
            login: "/sign-in".to_string(),
            admin_dashboard: "/backoffice/home".to_string(),
            user_dashboard: "/account/home".to_string(),
            section_roots: vec![("/backoffice".to_string(), "/backoffice/home".to_string())],
        },
    );

    assert_eq!(gate.decide("/account/orders", None), redirect("/sign-in"));
    assert_eq!(
        gate.decide("/sign-in", Some(&session(Role::Admin))),
        redirect("/backoffice/home")
    );
    assert_eq!(
        gate.decide("/backoffice/stats", Some(&session(Role::User))),
        redirect("/account/home")
    );
    assert_eq!(gate.decide("/backoffice", None), redirect("/backoffice/home"));
    assert_eq!(gate.routes().rules().len(), 3);
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{AppState, auth::{self, Session}, models::Role};

/// RouteCategory
///
/// How the gatekeeper treats a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    /// Requires an ADMIN session.
    Admin,
    /// Requires any session.
    User,
    /// Only meaningful without a session (login, signup, password reset).
    Auth,
    Public,
}

/// RouteRule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub prefix: String,
    pub category: RouteCategory,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, category: RouteCategory) -> Self {
        Self {
            prefix: prefix.into(),
            category,
        }
    }

    /// Segment-aware prefix match: `/admin` covers `/admin` and `/admin/...`
    /// but not `/administrator`.
    fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }
}

/// RouteTable
///
/// Ordered `{prefix, category}` pairs; the first matching rule wins and
/// unmatched paths are `Public`. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// The storefront's page sections.
    pub fn storefront() -> Self {
        Self::new(vec![
            RouteRule::new("/admin", RouteCategory::Admin),
            RouteRule::new("/user", RouteCategory::User),
            RouteRule::new("/login", RouteCategory::Auth),
            RouteRule::new("/signup", RouteCategory::Auth),
            RouteRule::new("/forgot-password", RouteCategory::Auth),
        ])
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify(&self, path: &str) -> RouteCategory {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.category)
            .unwrap_or(RouteCategory::Public)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::storefront()
    }
}

/// GatePaths
///
/// Redirect targets and the bare section roots that are canonicalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePaths {
    pub login: String,
    pub admin_dashboard: String,
    pub user_dashboard: String,
    // (bare root, canonical target)
    pub section_roots: Vec<(String, String)>,
}

impl Default for GatePaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            admin_dashboard: "/admin/dashboard".to_string(),
            user_dashboard: "/user/dashboard".to_string(),
            section_roots: vec![
                ("/admin".to_string(), "/admin/dashboard".to_string()),
                ("/user".to_string(), "/user/dashboard".to_string()),
            ],
        }
    }
}

/// GateDecision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectTo(String),
}

/// Gatekeeper
///
/// Path-based, pre-handler classifier. Holds no mutable state: the decision
/// depends only on `(path, session)`.
#[derive(Debug, Clone, Default)]
pub struct Gatekeeper {
    routes: RouteTable,
    paths: GatePaths,
}

impl Gatekeeper {
    pub fn new(routes: RouteTable, paths: GatePaths) -> Self {
        Self { routes, paths }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn dashboard_for(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.paths.admin_dashboard,
            Role::User => &self.paths.user_dashboard,
        }
    }

    /// decide
    ///
    /// 1. Bare section roots redirect to their dashboard, session or not.
    /// 2. No session on a protected path: login.
    /// 3. Session on an auth-only path: the caller's dashboard.
    /// 4. Non-admin session on an admin path: the user dashboard.
    /// 5. Anything else is allowed.
    pub fn decide(&self, path: &str, session: Option<&Session>) -> GateDecision {
        let normalized = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        if let Some((_, target)) = self
            .paths
            .section_roots
            .iter()
            .find(|(root, _)| root == normalized)
        {
            return GateDecision::RedirectTo(target.clone());
        }

        let category = self.routes.classify(normalized);

        match (session, category) {
            (None, RouteCategory::Admin | RouteCategory::User) => {
                GateDecision::RedirectTo(self.paths.login.clone())
            }
            (Some(session), RouteCategory::Auth) => {
                GateDecision::RedirectTo(self.dashboard_for(session.role).to_string())
            }
            (Some(session), RouteCategory::Admin) if session.role != Role::Admin => {
                GateDecision::RedirectTo(self.paths.user_dashboard.clone())
            }
            _ => GateDecision::Allow,
        }
    }
}

/// edge_gatekeeper
///
/// Outermost application middleware. Decodes the token from the raw request
/// (no persistence lookup) and either forwards the request or answers with a
/// temporary redirect. An undecodable token counts as no session.
pub async fn edge_gatekeeper(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let session = auth::session_from_headers(request.headers(), &state.config);
    let path = request.uri().path();

    match state.gatekeeper.decide(path, session.as_ref()) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::RedirectTo(target) => {
            tracing::debug!(path = %path, target = %target, "gatekeeper redirect");
            Redirect::temporary(&target).into_response()
        }
    }
}

//! Instance-level authorization for API handlers.
//!
//! One guard serves every owned resource type. A handler states which
//! capability it needs and hands over the lookup; the guard checks the session
//! first, performs the lookup, then decides, and on success returns the record
//! it looked up so the handler never fetches it twice.

use std::future::Future;
use uuid::Uuid;

use crate::{
    auth::Session,
    error::ApiError,
    models::{CartItem, Order, User},
    repository::RepoResult,
};

/// Message returned with every 403 produced by the guard.
pub const FORBIDDEN_MESSAGE: &str = "Unauthorized";
/// Message for the role self-change rule.
pub const SELF_ROLE_CHANGE_MESSAGE: &str = "You cannot change your own role";

/// Capability
///
/// What the handler is about to do with the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
    Delete,
}

/// ResourceKind
///
/// The resource types subject to ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Order,
    CartItem,
    Customer,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Order => "Order",
            ResourceKind::CartItem => "Cart item",
            ResourceKind::Customer => "User",
        }
    }

    /// Whether the owner (not only an admin) holds the delete capability.
    pub fn owner_may_delete(self) -> bool {
        matches!(self, ResourceKind::CartItem)
    }
}

/// OwnedResource
///
/// Implemented by every record the guard can authorize: it names its kind and
/// the user that owns it.
pub trait OwnedResource {
    const KIND: ResourceKind;

    fn owner_id(&self) -> Uuid;
}

impl OwnedResource for Order {
    const KIND: ResourceKind = ResourceKind::Order;

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl OwnedResource for CartItem {
    const KIND: ResourceKind = ResourceKind::CartItem;

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl OwnedResource for User {
    const KIND: ResourceKind = ResourceKind::Customer;

    fn owner_id(&self) -> Uuid {
        self.id
    }
}

/// Denial
///
/// Why the guard refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthorized,
    Forbidden,
    NotFound,
}

impl Denial {
    pub fn into_api_error(self, kind: ResourceKind) -> ApiError {
        match self {
            Denial::Unauthorized => ApiError::unauthorized("Unauthorized"),
            Denial::Forbidden => ApiError::forbidden(FORBIDDEN_MESSAGE),
            Denial::NotFound => ApiError::not_found(format!("{} not found", kind.label())),
        }
    }
}

/// Decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

/// DisclosurePolicy
///
/// What a non-owning, non-admin caller learns about a resource that exists.
/// `RevealForbidden` answers 403 and so confirms existence; `ConcealAsNotFound`
/// answers 404 exactly as for a missing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisclosurePolicy {
    #[default]
    RevealForbidden,
    ConcealAsNotFound,
}

impl DisclosurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reveal" => Some(DisclosurePolicy::RevealForbidden),
            "conceal" => Some(DisclosurePolicy::ConcealAsNotFound),
            _ => None,
        }
    }
}

/// require_session
///
/// The guard's first rule on its own, for handlers acting on "my" data
/// (my cart, my orders) where there is no foreign resource id to check.
pub fn require_session(session: Option<&Session>) -> Result<&Session, ApiError> {
    session.ok_or_else(|| ApiError::unauthorized("Unauthorized"))
}

/// require_admin
///
/// Role check for admin-only endpoints: no session is 401, a USER is 403.
pub fn require_admin(session: Option<&Session>) -> Result<&Session, ApiError> {
    let session = require_session(session)?;
    if !session.is_admin() {
        return Err(ApiError::forbidden(FORBIDDEN_MESSAGE));
    }
    Ok(session)
}

/// ResourceGuard
///
/// Stateless apart from its disclosure policy; cheap to copy into the app state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceGuard {
    disclosure: DisclosurePolicy,
}

impl ResourceGuard {
    pub fn new(disclosure: DisclosurePolicy) -> Self {
        Self { disclosure }
    }

    pub fn disclosure(&self) -> DisclosurePolicy {
        self.disclosure
    }

    /// decide
    ///
    /// The pure policy. `resource` is the result of the lookup (`None` when
    /// absent). Evaluation order: session, existence, role, ownership.
    pub fn decide<R: OwnedResource>(
        &self,
        session: Option<&Session>,
        resource: Option<&R>,
        capability: Capability,
    ) -> Decision {
        let Some(session) = session else {
            return Decision::Deny(Denial::Unauthorized);
        };
        let Some(resource) = resource else {
            return Decision::Deny(Denial::NotFound);
        };

        if session.is_admin() {
            return Decision::Allow;
        }

        let owns = resource.owner_id() == session.user_id;
        let permitted = match capability {
            Capability::Read | Capability::Write => owns,
            Capability::Delete => owns && R::KIND.owner_may_delete(),
        };

        if permitted {
            Decision::Allow
        } else if owns {
            // The owner knows the resource exists; nothing to conceal.
            Decision::Deny(Denial::Forbidden)
        } else {
            match self.disclosure {
                DisclosurePolicy::RevealForbidden => Decision::Deny(Denial::Forbidden),
                DisclosurePolicy::ConcealAsNotFound => Decision::Deny(Denial::NotFound),
            }
        }
    }

    /// authorize
    ///
    /// Runs the full check around a lookup. No lookup is performed without a
    /// session. On `Allow` the looked-up record is returned.
    pub async fn authorize<R, F, Fut>(
        &self,
        session: Option<&Session>,
        capability: Capability,
        lookup: F,
    ) -> Result<R, ApiError>
    where
        R: OwnedResource,
        F: FnOnce() -> Fut,
        Fut: Future<Output = RepoResult<Option<R>>>,
    {
        if session.is_none() {
            return Err(Denial::Unauthorized.into_api_error(R::KIND));
        }

        let resource = lookup().await?;

        match self.decide(session, resource.as_ref(), capability) {
            Decision::Allow => {
                resource.ok_or_else(|| Denial::NotFound.into_api_error(R::KIND))
            }
            Decision::Deny(denial) => {
                tracing::debug!(
                    kind = R::KIND.label(),
                    ?capability,
                    ?denial,
                    "resource access denied"
                );
                Err(denial.into_api_error(R::KIND))
            }
        }
    }

    /// check_role_change
    ///
    /// Nobody may change their own role, whatever the requested value and
    /// whatever the general ownership rules would allow.
    pub fn check_role_change(&self, session: &Session, target_user_id: Uuid) -> Result<(), ApiError> {
        if session.user_id == target_user_id {
            return Err(ApiError::bad_request(SELF_ROLE_CHANGE_MESSAGE));
        }
        Ok(())
    }
}

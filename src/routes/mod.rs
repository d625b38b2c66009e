/// Router Module Index
///
/// Splits the API into routers by the access they require. Page-level access
/// control is the edge gatekeeper's job; the routers below only cover the
/// JSON API under `/api`, and every protected handler still runs the
/// authorization guard itself.

/// Routes open to everyone: health, registration, the catalog.
pub mod public;

/// Routes that need a session. Wrapped in the session layer, which answers 401
/// before the handler runs.
pub mod authenticated;

/// Routes restricted to ADMIN sessions. Mounted under `/api/admin`.
pub mod admin;

/// Router Module Index
///
/// Splits the API by how much identity a route needs before its handler runs.

/// Routes open to anonymous callers: job browsing, registration, login/logout.
pub mod public;

/// Routes wrapped in the authentication middleware. Anonymous requests are
/// rejected with 401 before the handler runs.
pub mod authenticated;

/// Role-gated routes. No middleware: the handlers consult the authorization policy,
/// which answers 403 to anonymous and wrong-role callers alike.
pub mod restricted;

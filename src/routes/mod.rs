/// Router Module Index
///
/// Organizes the routing logic into security-segregated modules so access
/// control is applied explicitly at the module level rather than per-route.
///
/// The three modules map directly to the access tiers of the API.

/// Routes accessible to anonymous clients: health, registration, login.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a live (unrevoked) bearer token.
pub mod authenticated;

/// Routes restricted to users with the admin role. The role check happens in
/// the handlers, after the authentication layer resolves the token.
pub mod admin;

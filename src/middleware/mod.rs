pub mod auth;
pub mod rate_limit;

pub use auth::{AuthenticatedUser, IdentityResolver, SessionTokenResolver};
pub use rate_limit::rate_limit;

//! HTTP middleware components.
//!
//! Provides bearer authentication guards and contact form rate limiting.

pub mod auth;
pub mod rate_limit;

pub use auth::{AuthUser, authenticate, require_admin};
pub use rate_limit::{RateLimiter, get_client_id};

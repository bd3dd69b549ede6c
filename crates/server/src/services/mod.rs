//! Services shared by the route handlers.

pub mod email;
pub mod token;

pub use email::EmailService;
pub use token::{TokenClaims, TokenService};

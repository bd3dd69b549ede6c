//! Database models.

pub mod category;
pub mod collection;
pub mod material;
pub mod product;
pub mod tag;
pub mod user;

pub use category::Category;
pub use collection::Collection;
pub use material::Material;
pub use product::{Product, ProductImage};
pub use tag::Tag;
pub use user::User;

/// Result of deleting a row that other rows may still reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Deletion refused; `dependents` rows still reference the record.
    InUse { dependents: i64 },
}

//! Product catalog reads.
//!
//! Request parameters flow through four stages:
//! - [`ProductFilter::from_query`] normalizes the query string
//! - [`ProductQueryBuilder`] composes the page and COUNT statements
//! - [`CatalogService`] runs them against PostgreSQL
//! - [`view`] shapes rows into listing items and detail views

pub mod filter;
pub mod pagination;
pub mod query_builder;
pub mod service;
pub mod view;

pub use filter::{FilterError, PageLimits, ProductFilter, ProductSort};
pub use pagination::Pagination;
pub use query_builder::ProductQueryBuilder;
pub use service::{CatalogError, CatalogService, ProductPage};
pub use view::{ProductDetail, ProductListItem, StockStatus, TaxonomyRef, render_wa_template};

//! Alahas catalog library.
//!
//! Storefront read API and admin back-office API for a jewelry catalog. The
//! library is exposed for integration testing; the `alahas` binary runs the
//! server.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
pub mod validation;

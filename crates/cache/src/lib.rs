//! SQLite cache of share scopes and directory listings.
//!
//! This crate provides the cache database that records what a search has
//! observed: the scopes (live share and snapshots) of each share, and the
//! immediate children of every directory listed within them. The database is
//! not the source of truth - the share itself is. If the cache is deleted,
//! the next search simply lists everything again.
//!
//! # Schema
//! There are no migrations. When the cache is opened, each table's persisted
//! structure is compared with the expected one (see [`schema`]) and any
//! table that no longer fits is dropped and recreated, together with the
//! rows that depend on it. What happened is reported as a [`Reconciliation`].

mod db;
pub mod error;
mod models;
mod repo;
pub mod schema;

pub use crate::db::Database;
pub use crate::repo::Repository;
pub use crate::schema::Reconciliation;

//! SQLite persistence layer for vidmill.
//!
//! The job record store and its sibling tables (users, videos) live here.
//! All access goes through an r2d2 connection pool; every status mutation
//! funnels through the guarded update paths in [`queries::transcode_jobs`],
//! which enforce the queued → processing → {completed, failed} ordering.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};

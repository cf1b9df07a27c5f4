//! Database repositories
//!
//! Repositories are cheap `Clone` wrappers around a `PgPool`. Every audit
//! query is scoped by the owner's email.

pub mod audit;
pub mod migrate;
pub mod user;

pub use audit::{AuditRepository, AuditTable};
pub use migrate::run_migrations;
pub use user::UserRepository;

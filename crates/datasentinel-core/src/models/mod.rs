//! Data models shared by the database layer and the HTTP API

mod audit;
mod user;

pub use audit::*;
pub use user::*;

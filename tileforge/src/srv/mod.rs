//! HTTP surface: tile, status and search endpoints.

mod search;
mod server;
mod tiles;

pub use crate::srv::server::{new_server, router, AppState};

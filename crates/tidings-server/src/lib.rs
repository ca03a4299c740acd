//! Read API: serves the cached headlines of every outlet over HTTP.

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

//! REST API server: job parsing routes, rate limiting, DTOs, and OpenAPI documentation.

pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod rate_limit;
pub mod routes;
pub mod state;

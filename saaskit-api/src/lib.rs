//! # SaaSKit API Server Library
//!
//! This library provides the HTTP layer of the SaaSKit multi-tenant backend.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `billing`: Payment webhook verification and processing
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Authenticated session and validated JSON extractors
//! - `middleware`: Response security headers
//! - `routes`: API route handlers
//! - `services`: Identity provider and payment gateway clients

pub mod app;
pub mod billing;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod services;

/// Version reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

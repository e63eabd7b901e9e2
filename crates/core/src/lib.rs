//! Core types and shared functionality for kiri-offline.
//!
//! This crate provides:
//! - Generation-scoped cache store with SQLite backend
//! - Install-time asset manifest
//! - Layered configuration
//! - Unified error types

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;

pub use cache::{CacheDb, StoredResponse};
pub use config::AppConfig;
pub use error::Error;
pub use manifest::AssetManifest;

//! Client code for kiri-offline.
//!
//! This crate provides the HTTP fetch pipeline the worker uses for
//! install-time population and request relay, plus URL resolution against
//! the configured origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, UrlError, resolve};

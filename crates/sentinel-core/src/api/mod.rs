//! REST API client module for the Sentinel backend.
//!
//! This module provides the `ApiClient` for fetching sensor readings, news,
//! profile and device history, plus the unauthenticated login and password
//! recovery calls.
//!
//! Data calls use bearer token authentication. A rejected token surfaces as
//! `ApiError::AuthRejected`, distinct from every other failure.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginData, LoginResponse};
pub use error::{ApiError, RequestFailure};

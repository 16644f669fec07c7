//! Integration test utilities for the Socket.IO gateway
//!
//! This crate provides helpers for running end-to-end tests against
//! the HTTP routes and the WebSocket endpoint.

pub mod client;
pub mod helpers;

pub use client::SioClient;
pub use helpers::*;

//! Fleetclaim Dashboard - REST client for the cloud device directory
//!
//! This crate wraps the dashboard API with reqwest and exposes it through
//! the `Directory` trait from fleetclaim-core:
//! - Bearer-token authentication
//! - `Link: rel=next` pagination for organization-wide listings
//! - Retry on HTTP 429 honoring `Retry-After`

pub mod client;

pub use client::{DashboardClient, DEFAULT_BASE_URL};

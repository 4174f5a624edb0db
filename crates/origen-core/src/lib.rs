//! Core types and trait definitions for the Origen loan-origination engine.
//!
//! This crate carries no HTTP or database dependencies. Every other crate in
//! the workspace depends on it; it depends only on serde, chrono, uuid, and
//! thiserror.

#![allow(async_fn_in_trait)]

pub mod application;
pub mod document;
pub mod error;
pub mod history;
pub mod store;
pub mod trust;

pub use error::{Error, Result};

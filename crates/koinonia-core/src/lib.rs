//! Core types and trait definitions for the Koinonia church-management
//! back end.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.
//! Client-facing error messages are Spanish, matching the wire contract
//! the front end already speaks; identifiers are English.

pub mod course;
pub mod error;
pub mod event;
pub mod ministry;
pub mod notification;
pub mod person;
pub mod role;
pub mod store;

pub use error::{Error, Result};

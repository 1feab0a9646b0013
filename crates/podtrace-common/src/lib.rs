//! # podtrace-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the podtrace workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the container identity and error vocabulary
//! that the event and core crates build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod selector;
pub mod types;

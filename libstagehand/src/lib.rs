#![forbid(unsafe_code)]

//! # stagehand
//!
//! The shared code for the stagehand console. Encapsulates abstractions for
//! things like:
//!
//! - The typed data model mirrored from the automation backend's REST API
//! - The REST client seam and its reqwest implementation
//! - Session handling: token storage and the auth gate
//! - Inventory and playbook CRUD shells
//! - Task execution polling
//!   - Log retrieval is driven by the observed task status, and polling stops
//!     at the first terminal status.

pub mod api;
pub mod config;
pub mod crud;
pub mod error;
pub mod log;
pub mod model;
pub mod poll;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

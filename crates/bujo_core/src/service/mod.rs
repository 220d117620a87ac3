//! Use-case services over the repositories.
//!
//! # Responsibility
//! - Orchestrate repository calls into journal workflows.
//! - Stay storage-agnostic by depending on repository traits only.

pub mod changeset_service;
pub mod list_service;

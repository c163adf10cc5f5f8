//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate rule, conflict and precondition checks around store calls.
//! - Keep transport layers decoupled from storage details.

pub mod error;
pub mod event_service;

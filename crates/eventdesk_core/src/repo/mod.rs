//! Event store contract and implementations.
//!
//! # Responsibility
//! - Define the use-case oriented store contract (`EventStore`).
//! - Isolate SQLite query details from service orchestration.
//! - Provide an in-memory store with identical semantics.
//!
//! # Invariants
//! - Conditional writes are compare-and-swap on `version`.
//! - `in_write_transaction` serializes writers for the duration of the
//!   closure; reads inside it observe the closure's own writes.
//! - Store APIs return semantic errors (`NotFound`, `VersionMismatch`) in
//!   addition to transport errors.

pub mod event_repo;
pub mod memory_repo;

//! Search filter composition and paging.
//!
//! # Responsibility
//! - Compose optional search parameters into one store-evaluated filter.
//! - Describe page/sort requests and paged results.
//!
//! # See also
//! - `repo::event_repo` for the SQL rendering of filter clauses.

pub mod filter;
pub mod page;

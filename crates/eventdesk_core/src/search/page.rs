//! Paging and sorting for event queries.
//!
//! # Invariants
//! - Pages are 0-based.
//! - Sorting is total: ties on the sort key are broken by `id` ascending.

use crate::model::event::Event;
use std::cmp::Ordering;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    StartAt,
    EndAt,
    Title,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Desc,
        }
    }

    /// Total order over events for this sort.
    pub fn compare(&self, left: &Event, right: &Event) -> Ordering {
        let by_key = match self.key {
            SortKey::StartAt => left.start_at.cmp(&right.start_at),
            SortKey::EndAt => left.end_at.cmp(&right.end_at),
            SortKey::Title => left.title.cmp(&right.title),
            SortKey::CreatedAt => left.created_at.cmp(&right.created_at),
            SortKey::UpdatedAt => left.updated_at.cmp(&right.updated_at),
        };
        let by_key = match self.direction {
            SortDirection::Asc => by_key,
            SortDirection::Desc => by_key.reverse(),
        };
        by_key.then_with(|| left.id.cmp(&right.id))
    }
}

/// Requested page. `sort = None` means "the operation's default order".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Option<Sort>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: None,
        }
    }

    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Effective sort, falling back to `fallback`.
    pub fn sort_or(&self, fallback: Sort) -> Sort {
        self.sort.unwrap_or(fallback)
    }

    /// Row offset of the first item.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// Applies default/maximum sizes: 0 becomes `default_size`, larger
    /// values clamp to `max_size`. Unsorted requests get `fallback`.
    pub fn normalized(self, default_size: u32, max_size: u32, fallback: Sort) -> Self {
        let size = match self.size {
            0 => default_size,
            value if value > max_size => max_size,
            value => value,
        };
        Self {
            page: self.page,
            size,
            sort: Some(self.sort_or(fallback)),
        }
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        let total_pages = if request.size == 0 {
            0
        } else {
            let pages = total_elements.div_ceil(u64::from(request.size));
            u32::try_from(pages).unwrap_or(u32::MAX)
        };
        Self {
            items,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

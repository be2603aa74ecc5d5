//! Core business logic - framework-agnostic portal operations.
//!
//! Every function takes a `SeaORM` connection and returns [`crate::errors::Result`];
//! the HTTP layer in [`crate::server`] is a thin adapter over this module.

pub mod audit;
pub mod notifications;
pub mod services;
pub mod users;
pub mod workflow;

use crate::errors::Result;
use sea_orm::{ConnectionTrait, Paginator, SelectorTrait};
use serde::Serialize;

/// Largest page size accepted by listing functions.
pub const MAX_PAGE_SIZE: u64 = 100;

/// One page of database rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paged<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u64,
    /// Requested page size
    pub limit: u64,
    /// Rows across all pages
    pub total: u64,
    /// Number of pages
    pub total_pages: u64,
}

/// Clamps a caller-supplied page size to `1..=MAX_PAGE_SIZE`.
pub(crate) const fn page_size(limit: u64) -> u64 {
    if limit == 0 {
        1
    } else if limit > MAX_PAGE_SIZE {
        MAX_PAGE_SIZE
    } else {
        limit
    }
}

/// Runs the count and the page query for `paginator`.
pub(crate) async fn collect_page<'db, C, S>(
    paginator: Paginator<'db, C, S>,
    page: u64,
    limit: u64,
) -> Result<Paged<S::Item>>
where
    C: ConnectionTrait,
    S: SelectorTrait + 'db,
{
    let page = page.max(1);
    let totals = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(page - 1).await?;
    Ok(Paged {
        items,
        page,
        limit,
        total: totals.number_of_items,
        total_pages: totals.number_of_pages,
    })
}

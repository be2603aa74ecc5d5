//! Paginated, filterable views over MyJKKN resources.
//!
//! A [`Directory`] owns the state a list screen needs (records, loading flag, error,
//! pagination, and the active search or filter) and exposes the actions that change
//! it. Each action performs exactly one fetch. Search and filters are mutually
//! exclusive: setting one clears the other and returns to page 1.
//!
//! When the MyJKKN API configuration changes, [`Directory::watch_config`] refetches
//! the current page once the changes have settled for [`CONFIG_DEBOUNCE`].

use crate::config::api::ApiConfig;
use crate::myjkkn::{ApiResult, MyJkknClient, Page, Resource};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Quiet period after the last config change before refetching.
pub const CONFIG_DEBOUNCE: Duration = Duration::from_millis(500);

/// Page size used until [`Directory::set_page_size`] is called.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// What the directory is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryQuery<F> {
    /// Unfiltered listing
    All,
    /// Free-text search
    Search(String),
    /// A single resource filter
    Filter(F),
}

/// Current pagination position and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Pages reported (or computed) for the last fetch
    pub total_pages: u32,
    /// Records reported for the last fetch
    pub total: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            total_pages: 0,
            total: 0,
        }
    }
}

impl Pagination {
    /// "Showing X to Y of Z" bounds for this position.
    #[must_use]
    pub const fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.limit, self.total)
    }

    /// Another page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// This is not the first page.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// 1-based item range shown on a page. `end_item < start_item` means nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    /// First item on the page
    pub start_item: u64,
    /// Last item on the page
    pub end_item: u64,
}

impl PageWindow {
    /// `start = (page-1)*limit + 1`, `end = min(page*limit, total)`.
    #[must_use]
    pub const fn new(page: u32, limit: u32, total: u64) -> Self {
        let page = if page == 0 { 1 } else { page as u64 };
        let limit = limit as u64;
        let start_item = (page - 1).saturating_mul(limit).saturating_add(1);
        let last_on_page = page.saturating_mul(limit);
        let end_item = if last_on_page < total {
            last_on_page
        } else {
            total
        };
        Self {
            start_item,
            end_item,
        }
    }

    /// Nothing to show.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end_item < self.start_item
    }
}

/// Snapshot of a directory.
#[derive(Debug)]
pub struct DirectoryState<R: Resource> {
    /// Records of the current page
    pub records: Vec<R::Record>,
    /// A fetch is in flight
    pub loading: bool,
    /// Message of the last failed fetch
    pub error: Option<String>,
    /// Position and totals
    pub pagination: Pagination,
    /// Active search or filter
    pub query: DirectoryQuery<R::Filter>,
}

impl<R: Resource> Clone for DirectoryState<R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            loading: self.loading,
            error: self.error.clone(),
            pagination: self.pagination,
            query: self.query.clone(),
        }
    }
}

impl<R: Resource> Default for DirectoryState<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            loading: false,
            error: None,
            pagination: Pagination::default(),
            query: DirectoryQuery::All,
        }
    }
}

/// A stateful, paginated view over resource `R`.
pub struct Directory<R: Resource> {
    client: Arc<MyJkknClient>,
    state: RwLock<DirectoryState<R>>,
    generation: AtomicU64,
}

impl<R: Resource> std::fmt::Debug for Directory<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("resource", &R::PATH)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<R: Resource> Directory<R> {
    /// Empty directory on page 1. Nothing is fetched until an action runs.
    #[must_use]
    pub fn new(client: Arc<MyJkknClient>) -> Self {
        Self {
            client,
            state: RwLock::new(DirectoryState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> DirectoryState<R> {
        self.state.read().await.clone()
    }

    /// Item range of the current page.
    pub async fn window(&self) -> PageWindow {
        self.state.read().await.pagination.window()
    }

    /// Fetches the current page with the current query.
    ///
    /// If another fetch starts before this one finishes, this one's response is
    /// discarded and the state reflects only the newer fetch.
    #[instrument(skip(self), fields(resource = R::PATH))]
    async fn load(&self) -> ApiResult<()> {
        let (generation, page, limit, query) = {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            (
                generation,
                state.pagination.page,
                state.pagination.limit,
                state.query.clone(),
            )
        };

        let result: ApiResult<Page<R::Record>> = match &query {
            DirectoryQuery::All => self.client.list::<R>(page, limit).await,
            DirectoryQuery::Search(text) => self.client.search::<R>(text, page, limit).await,
            DirectoryQuery::Filter(filter) => self.client.filter::<R>(filter, page, limit).await,
        };

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Discarding stale {} response for page {}", R::PATH, page);
            return Ok(());
        }
        state.loading = false;
        match result {
            Ok(fetched) => {
                state.records = fetched.data;
                state.pagination.page = fetched.metadata.page;
                state.pagination.total_pages = fetched.metadata.total_pages;
                state.pagination.total = fetched.metadata.total;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load {}: {e}", R::PATH);
                state.records.clear();
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Reloads the current page.
    pub async fn refetch(&self) -> ApiResult<()> {
        self.load().await
    }

    /// Moves to page `page` (clamped to at least 1).
    pub async fn fetch_page(&self, page: u32) -> ApiResult<()> {
        self.state.write().await.pagination.page = page.max(1);
        self.load().await
    }

    /// Searches from page 1, clearing any filter. A blank query lists everything.
    pub async fn search(&self, text: &str) -> ApiResult<()> {
        {
            let mut state = self.state.write().await;
            let text = text.trim();
            state.query = if text.is_empty() {
                DirectoryQuery::All
            } else {
                DirectoryQuery::Search(text.to_string())
            };
            state.pagination.page = 1;
        }
        self.load().await
    }

    /// Applies `filter` from page 1, replacing any search or other filter.
    pub async fn filter_by(&self, filter: R::Filter) -> ApiResult<()> {
        {
            let mut state = self.state.write().await;
            state.query = DirectoryQuery::Filter(filter);
            state.pagination.page = 1;
        }
        self.load().await
    }

    /// Drops search and filters and returns to page 1.
    pub async fn clear_filters(&self) -> ApiResult<()> {
        {
            let mut state = self.state.write().await;
            state.query = DirectoryQuery::All;
            state.pagination.page = 1;
        }
        self.load().await
    }

    /// Changes the page size and returns to page 1.
    pub async fn set_page_size(&self, limit: u32) -> ApiResult<()> {
        {
            let mut state = self.state.write().await;
            state.pagination.limit = limit.max(1);
            state.pagination.page = 1;
        }
        self.load().await
    }

    /// Refetches whenever the API configuration changes, debounced by [`CONFIG_DEBOUNCE`].
    ///
    /// The task ends when the configuration store is dropped.
    pub fn watch_config(self: &Arc<Self>, mut changes: watch::Receiver<ApiConfig>) -> JoinHandle<()> {
        changes.borrow_and_update();
        let directory = Arc::clone(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                loop {
                    tokio::select! {
                        changed = changes.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        () = tokio::time::sleep(CONFIG_DEBOUNCE) => break,
                    }
                }
                changes.borrow_and_update();
                debug!("MyJKKN config changed, refetching {}", R::PATH);
                if let Err(e) = directory.refetch().await {
                    warn!("Refetch of {} after config change failed: {e}", R::PATH);
                }
            }
        })
    }
}

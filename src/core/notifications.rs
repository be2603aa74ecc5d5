//! In-portal notifications and the per-user notification cache.
//!
//! The header bell polls the unread count constantly, so [`NotificationCache`]
//! keeps a short-lived summary per user in a [`TtlCache`]. Writes that change a
//! user's notifications should call [`NotificationCache::invalidate`]. Entries
//! that have expired are dropped whenever a new user is added, so the map only
//! holds users seen within the last TTL.

use crate::{
    cache::{Clock, SystemClock, TtlCache},
    entities::{Notification, NotificationModel, notification},
    errors::{Error, Result},
};
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    prelude::*, sea_query::Expr,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Number of notifications kept in a cached summary.
pub const RECENT_LIMIT: u64 = 10;

/// Inserts an unread notification for `user_id`.
pub async fn create_notification<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    title: &str,
    message: &str,
) -> Result<NotificationModel> {
    if title.trim().is_empty() {
        return Err(Error::validation("Notification title cannot be empty"));
    }
    let model = notification::ActiveModel {
        user_id: Set(user_id.to_string()),
        title: Set(title.trim().to_string()),
        message: Set(message.to_string()),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let created = model.insert(db).await?;
    debug!("Notification {} queued for {}", created.id, user_id);
    Ok(created)
}

/// Newest notifications for a user.
pub async fn list_notifications(
    db: &DatabaseConnection,
    user_id: &str,
    unread_only: bool,
    limit: u64,
) -> Result<Vec<NotificationModel>> {
    let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
    if unread_only {
        query = query.filter(notification::Column::IsRead.eq(false));
    }
    query
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .limit(super::page_size(limit))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of unread notifications of a user.
pub async fn unread_count(db: &DatabaseConnection, user_id: &str) -> Result<u64> {
    Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Marks one of the user's notifications as read.
pub async fn mark_read(
    db: &DatabaseConnection,
    user_id: &str,
    notification_id: i64,
) -> Result<NotificationModel> {
    let existing = Notification::find_by_id(notification_id)
        .filter(notification::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("notification", notification_id))?;
    if existing.is_read {
        return Ok(existing);
    }
    let mut model: notification::ActiveModel = existing.into();
    model.is_read = Set(true);
    Ok(model.update(db).await?)
}

/// Marks every unread notification of the user as read. Returns how many changed.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: &str) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// What the header bell renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    /// Unread notifications
    pub unread_count: u64,
    /// Newest notifications, read or not
    pub recent: Vec<NotificationModel>,
}

async fn load_summary(db: &DatabaseConnection, user_id: &str) -> Result<NotificationSummary> {
    Ok(NotificationSummary {
        unread_count: unread_count(db, user_id).await?,
        recent: list_notifications(db, user_id, false, RECENT_LIMIT).await?,
    })
}

/// Per-user cache of [`NotificationSummary`] values.
pub struct NotificationCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Arc<TtlCache<NotificationSummary>>>>,
}

impl std::fmt::Debug for NotificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl NotificationCache {
    /// Empty cache using the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Empty cache using `clock` for expiry.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, user_id: &str) -> Arc<TtlCache<NotificationSummary>> {
        if let Some(entry) = self.entries.read().await.get(user_id) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write().await;
        if !entries.contains_key(user_id) {
            let before = entries.len();
            entries.retain(|_, entry| Arc::strong_count(entry) > 1 || !entry.is_expired());
            if entries.len() < before {
                debug!("Evicted {} expired notification summaries", before - entries.len());
            }
        }
        let entry = entries.entry(user_id.to_string()).or_insert_with(|| {
            Arc::new(TtlCache::with_clock(self.ttl, Arc::clone(&self.clock)))
        });
        Arc::clone(entry)
    }

    /// Cached summary for `user_id`, refreshed from the database once it expires.
    ///
    /// If another caller is already refreshing this user's entry, the last known
    /// summary (or an empty one) is returned instead of querying again.
    #[instrument(skip(self, db))]
    pub async fn summary(
        &self,
        db: &DatabaseConnection,
        user_id: &str,
    ) -> Result<NotificationSummary> {
        let entry = self.entry(user_id).await;
        let summary = entry
            .get_or_refresh(|| load_summary(db, user_id))
            .await?;
        Ok(summary.unwrap_or_default())
    }

    /// Number of users that currently have a cache entry.
    pub async fn tracked_users(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drops the cached summary so the next read goes to the database.
    pub async fn invalidate(&self, user_id: &str) {
        let entry = self.entries.read().await.get(user_id).cloned();
        if let Some(entry) = entry {
            entry.invalidate().await;
        }
    }
}

/*!
 * Ingest Pipeline
 * Paginated, bounded-concurrency retrieval from the external record source
 *
 * The four record feeds are pipelined concurrently; a semaphore caps the
 * in-flight requests because the directory service is rate-limited. The
 * cancel token is checked between pages: cancellation discards the partial
 * builder, so a half-built snapshot is never exposed to readers.
 */

use crate::core::errors::{EngineError, Result};
use crate::core::limits::{
    DEFAULT_MAX_CONCURRENT_REQUESTS, MAX_PAGES_PER_FEED, MAX_RECORDS_PER_PAGE,
};
use crate::graph::records::{
    AssignmentRecord, GrantEntityRecord, MembershipRecord, PermissionRecord,
};
use crate::graph::store::{GraphBuilder, IntegrityPolicy, PermissionGraph};
use futures::future::BoxFuture;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One page of records plus the cursor for the next page (None = last)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    /// Final page of a feed
    pub fn last(records: Vec<T>) -> Self {
        Self {
            records,
            cursor: None,
        }
    }

    /// Page with a continuation cursor
    pub fn more(records: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            records,
            cursor: Some(cursor.into()),
        }
    }
}

/// The external query collaborator's boundary: four cursor-paginated feeds.
///
/// Retries, timeouts, and authentication are the source's policy; the
/// engine only consumes pages and maps failures to `EngineError::Source`.
pub trait RecordSource: Send + Sync {
    fn entities(&self, cursor: Option<String>) -> BoxFuture<'_, Result<Page<GrantEntityRecord>>>;
    fn assignments(&self, cursor: Option<String>) -> BoxFuture<'_, Result<Page<AssignmentRecord>>>;
    fn memberships(&self, cursor: Option<String>) -> BoxFuture<'_, Result<Page<MembershipRecord>>>;
    fn permissions(&self, cursor: Option<String>) -> BoxFuture<'_, Result<Page<PermissionRecord>>>;
}

/// Cooperative cancellation flag, checked between pages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Ingest tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Cap on concurrently in-flight page requests across all feeds
    pub max_concurrent_requests: usize,
    /// Per-feed page cap; a looping cursor must not ingest forever
    pub max_pages_per_feed: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_pages_per_feed: MAX_PAGES_PER_FEED,
        }
    }
}

/// Drives a `RecordSource` into a `GraphBuilder`
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    config: IngestConfig,
    cancel: CancelToken,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Attach an externally-owned cancel token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts this ingestor between pages
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fetch every feed to exhaustion and return the loaded builder.
    /// On any error (including cancellation) the partial builder is
    /// dropped, never returned.
    pub async fn run<S: RecordSource + ?Sized>(&self, source: &S) -> Result<GraphBuilder> {
        let builder = Mutex::new(GraphBuilder::new());
        let semaphore = Semaphore::new(self.config.max_concurrent_requests.max(1));

        futures::future::try_join4(
            self.drive_feed("entities", &semaphore, |c| source.entities(c), &builder, |b, r| {
                b.push_entities(r)
            }),
            self.drive_feed(
                "assignments",
                &semaphore,
                |c| source.assignments(c),
                &builder,
                |b, r| b.push_assignments(r),
            ),
            self.drive_feed(
                "memberships",
                &semaphore,
                |c| source.memberships(c),
                &builder,
                |b, r| b.push_memberships(r),
            ),
            self.drive_feed(
                "permissions",
                &semaphore,
                |c| source.permissions(c),
                &builder,
                |b, r| b.push_permissions(r),
            ),
        )
        .await?;

        let builder = builder.into_inner();
        debug!("ingest complete: {} raw rows", builder.raw_len());
        Ok(builder)
    }

    /// Convenience: ingest and freeze in one call
    pub async fn snapshot<S: RecordSource + ?Sized>(
        &self,
        source: &S,
        policy: IntegrityPolicy,
    ) -> Result<PermissionGraph> {
        self.run(source).await?.freeze(policy)
    }

    async fn drive_feed<'a, T>(
        &self,
        name: &str,
        semaphore: &Semaphore,
        fetch: impl Fn(Option<String>) -> BoxFuture<'a, Result<Page<T>>>,
        builder: &Mutex<GraphBuilder>,
        sink: impl Fn(&mut GraphBuilder, Vec<T>),
    ) -> Result<()> {
        let mut cursor: Option<String> = None;
        for _ in 0..self.config.max_pages_per_feed {
            if self.cancel.is_cancelled() {
                debug!("{name} feed cancelled; discarding partial ingest");
                return Err(EngineError::IngestCancelled);
            }
            let page = {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| EngineError::source("ingest semaphore closed"))?;
                fetch(cursor.take()).await?
            };
            if page.records.len() > MAX_RECORDS_PER_PAGE {
                return Err(EngineError::source(format!(
                    "{name} page exceeded {MAX_RECORDS_PER_PAGE} records"
                )));
            }
            // Lock is held only for the in-memory append, never across await
            sink(&mut builder.lock(), page.records);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
        warn!("{name} feed hit the page cap; treating source as runaway");
        Err(EngineError::source(format!("{name} feed exceeded page cap")))
    }
}

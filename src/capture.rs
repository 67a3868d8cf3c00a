// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change capture and the per-unit-of-work sync queue.
//!
//! Host mutations are filtered by the eligibility rules and collected in a
//! [`SyncQueue`]. Nothing is written to the engine here; the queue is
//! drained once when the unit of work finishes (see [`crate::session`]),
//! so several mutations of one item collapse into a single write.
//!
//! # Example
//!
//! ```
//! use search_sync::capture::SyncQueue;
//!
//! let mut queue = SyncQueue::new();
//! queue.enqueue(3);
//! queue.enqueue(7);
//! queue.enqueue(3);
//! queue.enqueue_removal(5);
//!
//! assert_eq!(queue.drain(), vec![7, 3]);
//! assert_eq!(queue.drain_removals(), vec![5]);
//! assert!(queue.is_empty());
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::IndexerConfig;
use crate::content::{ContentError, ContentStore};
use crate::document::Document;

/// Set of ids waiting for an index write, plus ids waiting for removal.
///
/// An id is never in both sets: the most recent request wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncQueue {
    pending: BTreeSet<u64>,
    removals: BTreeSet<u64>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an index write. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, id: u64) -> bool {
        self.removals.remove(&id);
        self.pending.insert(id)
    }

    /// Queue a removal. Returns `false` if it was already queued.
    pub fn enqueue_removal(&mut self, id: u64) -> bool {
        self.pending.remove(&id);
        self.removals.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains(&id)
    }

    #[must_use]
    pub fn is_removal_pending(&self, id: u64) -> bool {
        self.removals.contains(&id)
    }

    /// Number of queued index writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn removal_len(&self) -> usize {
        self.removals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.removals.is_empty()
    }

    /// Take queued index writes, highest id first.
    pub fn drain(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.pending).into_iter().rev().collect()
    }

    /// Take queued removals, highest id first.
    pub fn drain_removals(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.removals).into_iter().rev().collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.removals.clear();
    }
}

/// A host-side change to one content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Saved {
        id: u64,
        status: String,
        post_type: String,
        is_revision: bool,
    },
    MetaChanged { id: u64, key: String },
    TermsChanged { id: u64 },
    Deleted { id: u64 },
}

impl Mutation {
    #[must_use]
    pub fn id(&self) -> u64 {
        match *self {
            Mutation::Saved { id, .. }
            | Mutation::MetaChanged { id, .. }
            | Mutation::TermsChanged { id }
            | Mutation::Deleted { id } => id,
        }
    }
}

/// Transient host states during which saves are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureContext {
    pub importing: bool,
    pub autosave: bool,
}

impl CaptureContext {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.importing || self.autosave
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Transient,
    Revision,
    TypeNotIndexable,
    MetaNotProjected,
    NotEligible,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Queued,
    QueuedRemoval,
    Skipped(SkipReason),
}

/// Status and type allow-lists taken from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    statuses: Vec<String>,
    status_exceptions: Vec<String>,
    attachment_types: Vec<String>,
    types: Vec<String>,
}

impl Eligibility {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            statuses: config.indexable_statuses.clone(),
            status_exceptions: config.status_exceptions.clone(),
            attachment_types: config.attachment_types.clone(),
            types: config.indexable_types.clone(),
        }
    }

    #[must_use]
    pub fn type_indexable(&self, post_type: &str) -> bool {
        self.types.iter().any(|t| t == post_type)
    }

    /// Whether an item of `post_type` in `status` belongs in the index.
    /// Status exceptions only apply to attachment types.
    #[must_use]
    pub fn status_indexable(&self, post_type: &str, status: &str) -> bool {
        if self.statuses.iter().any(|s| s == status) {
            return true;
        }
        self.attachment_types.iter().any(|t| t == post_type) && self.status_exceptions.iter().any(|s| s == status)
    }

    #[must_use]
    pub fn document_indexable(&self, doc: &Document) -> bool {
        self.type_indexable(&doc.post_type) && self.status_indexable(&doc.post_type, &doc.post_status)
    }
}

/// Applies eligibility rules to mutations and feeds a queue.
pub struct ChangeCapture {
    eligibility: Eligibility,
    content: Arc<dyn ContentStore>,
    context: CaptureContext,
}

impl ChangeCapture {
    pub fn new(config: &IndexerConfig, content: Arc<dyn ContentStore>) -> Self {
        Self {
            eligibility: Eligibility::from_config(config),
            content,
            context: CaptureContext::default(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: CaptureContext) -> Self {
        self.context = context;
        self
    }

    pub fn set_context(&mut self, context: CaptureContext) {
        self.context = context;
    }

    pub fn eligibility(&self) -> &Eligibility {
        &self.eligibility
    }

    pub async fn capture(&self, queue: &mut SyncQueue, mutation: Mutation) -> Result<CaptureOutcome, ContentError> {
        let id = mutation.id();
        let outcome = self.evaluate(mutation).await?;

        match outcome {
            CaptureOutcome::Queued => {
                queue.enqueue(id);
            }
            CaptureOutcome::QueuedRemoval => {
                queue.enqueue_removal(id);
            }
            CaptureOutcome::Skipped(reason) => debug!(id, ?reason, "Mutation not queued"),
        }
        Ok(outcome)
    }

    async fn evaluate(&self, mutation: Mutation) -> Result<CaptureOutcome, ContentError> {
        if let Mutation::Deleted { .. } = mutation {
            return Ok(CaptureOutcome::QueuedRemoval);
        }
        if self.context.is_transient() {
            return Ok(CaptureOutcome::Skipped(SkipReason::Transient));
        }

        match mutation {
            Mutation::Saved {
                status,
                post_type,
                is_revision,
                ..
            } => {
                if is_revision {
                    return Ok(CaptureOutcome::Skipped(SkipReason::Revision));
                }
                if !self.eligibility.type_indexable(&post_type) {
                    return Ok(CaptureOutcome::Skipped(SkipReason::TypeNotIndexable));
                }
                if self.eligibility.status_indexable(&post_type, &status) {
                    Ok(CaptureOutcome::Queued)
                } else {
                    // Unpublished items must leave the index.
                    Ok(CaptureOutcome::QueuedRemoval)
                }
            }
            Mutation::MetaChanged { id, key } => match self.content.prepare(id).await? {
                None => Ok(CaptureOutcome::Skipped(SkipReason::Missing)),
                Some(doc) if !doc.has_meta(&key) => Ok(CaptureOutcome::Skipped(SkipReason::MetaNotProjected)),
                Some(doc) if !self.eligibility.document_indexable(&doc) => {
                    Ok(CaptureOutcome::Skipped(SkipReason::NotEligible))
                }
                Some(_) => Ok(CaptureOutcome::Queued),
            },
            Mutation::TermsChanged { id } => {
                if self.content.is_eligible(id).await? {
                    Ok(CaptureOutcome::Queued)
                } else {
                    Ok(CaptureOutcome::Skipped(SkipReason::NotEligible))
                }
            }
            Mutation::Deleted { .. } => Ok(CaptureOutcome::QueuedRemoval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PageRequest;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct FakeContent {
        docs: HashMap<u64, Document>,
    }

    impl FakeContent {
        fn with(docs: Vec<Document>) -> Arc<Self> {
            Arc::new(Self {
                docs: docs.into_iter().map(|d| (d.id, d)).collect(),
            })
        }
    }

    #[async_trait]
    impl ContentStore for FakeContent {
        async fn prepare(&self, id: u64) -> Result<Option<Document>, ContentError> {
            Ok(self.docs.get(&id).cloned())
        }

        async fn is_eligible(&self, id: u64) -> Result<bool, ContentError> {
            Ok(self.docs.get(&id).map(|d| d.post_status == "publish").unwrap_or(false))
        }

        async fn query_ids(&self, _page: &PageRequest) -> Result<Vec<u64>, ContentError> {
            Ok(vec![])
        }

        async fn count(&self, _scope: Option<&str>) -> Result<u64, ContentError> {
            Ok(self.docs.len() as u64)
        }
    }

    fn doc(id: u64) -> Document {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(9, 0, 0).unwrap();
        Document::new(id, "post", date)
    }

    fn saved(id: u64, status: &str, post_type: &str) -> Mutation {
        Mutation::Saved {
            id,
            status: status.into(),
            post_type: post_type.into(),
            is_revision: false,
        }
    }

    fn capture_with(docs: Vec<Document>) -> ChangeCapture {
        ChangeCapture::new(&IndexerConfig::default(), FakeContent::with(docs))
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = SyncQueue::new();
        assert!(queue.enqueue(9));
        assert!(!queue.enqueue(9));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(), vec![9]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_removal_and_index_override_each_other() {
        let mut queue = SyncQueue::new();
        queue.enqueue(4);
        queue.enqueue_removal(4);
        assert!(!queue.contains(4));
        assert!(queue.is_removal_pending(4));

        queue.enqueue(4);
        assert!(queue.contains(4));
        assert_eq!(queue.removal_len(), 0);
    }

    #[tokio::test]
    async fn test_saved_rules() {
        let capture = capture_with(vec![]);
        let mut queue = SyncQueue::new();

        assert_eq!(capture.capture(&mut queue, saved(1, "publish", "post")).await.unwrap(), CaptureOutcome::Queued);
        assert_eq!(
            capture.capture(&mut queue, saved(2, "publish", "page")).await.unwrap(),
            CaptureOutcome::Queued
        );
        assert_eq!(
            capture.capture(&mut queue, saved(3, "publish", "nav_menu_item")).await.unwrap(),
            CaptureOutcome::Skipped(SkipReason::TypeNotIndexable)
        );
        assert_eq!(
            capture.capture(&mut queue, saved(1, "draft", "post")).await.unwrap(),
            CaptureOutcome::QueuedRemoval
        );

        let revision = Mutation::Saved {
            id: 5,
            status: "publish".into(),
            post_type: "post".into(),
            is_revision: true,
        };
        assert_eq!(
            capture.capture(&mut queue, revision).await.unwrap(),
            CaptureOutcome::Skipped(SkipReason::Revision)
        );

        assert_eq!(queue.drain(), vec![2]);
        assert_eq!(queue.drain_removals(), vec![1]);
    }

    #[tokio::test]
    async fn test_inherit_status_only_for_attachments() {
        let config = IndexerConfig {
            indexable_types: vec!["post".into(), "attachment".into()],
            ..Default::default()
        };
        let capture = ChangeCapture::new(&config, FakeContent::with(vec![]));
        let mut queue = SyncQueue::new();

        assert_eq!(
            capture.capture(&mut queue, saved(8, "inherit", "attachment")).await.unwrap(),
            CaptureOutcome::Queued
        );
        assert_eq!(
            capture.capture(&mut queue, saved(9, "inherit", "post")).await.unwrap(),
            CaptureOutcome::QueuedRemoval
        );
        assert!(capture.eligibility().status_indexable("attachment", "inherit"));
        assert!(!capture.eligibility().status_indexable("post", "inherit"));
        assert_eq!(queue.drain(), vec![8]);
        assert_eq!(queue.drain_removals(), vec![9]);
    }

    #[tokio::test]
    async fn test_transient_context_skips_but_deletes_still_queue() {
        let capture = capture_with(vec![]).with_context(CaptureContext {
            importing: true,
            autosave: false,
        });
        let mut queue = SyncQueue::new();

        assert_eq!(
            capture.capture(&mut queue, saved(1, "publish", "post")).await.unwrap(),
            CaptureOutcome::Skipped(SkipReason::Transient)
        );
        assert_eq!(
            capture.capture(&mut queue, Mutation::Deleted { id: 1 }).await.unwrap(),
            CaptureOutcome::QueuedRemoval
        );
    }

    #[tokio::test]
    async fn test_meta_change_requires_projected_key() {
        let capture = capture_with(vec![doc(10).with_meta("price", &["12"]), doc(11).with_status("draft").with_meta("price", &["3"])]);
        let mut queue = SyncQueue::new();

        let changed = |id: u64, key: &str| Mutation::MetaChanged { id, key: key.into() };
        assert_eq!(
            capture.capture(&mut queue, changed(10, "_edit_lock")).await.unwrap(),
            CaptureOutcome::Skipped(SkipReason::MetaNotProjected)
        );
        assert_eq!(capture.capture(&mut queue, changed(10, "price")).await.unwrap(), CaptureOutcome::Queued);
        assert_eq!(
            capture.capture(&mut queue, changed(11, "price")).await.unwrap(),
            CaptureOutcome::Skipped(SkipReason::NotEligible)
        );
        assert_eq!(
            capture.capture(&mut queue, changed(99, "price")).await.unwrap(),
            CaptureOutcome::Skipped(SkipReason::Missing)
        );
        assert_eq!(queue.drain(), vec![10]);
    }

    #[tokio::test]
    async fn test_terms_change_checks_eligibility() {
        let capture = capture_with(vec![doc(20), doc(21).with_status("draft")]);
        let mut queue = SyncQueue::new();
        capture.capture(&mut queue, Mutation::TermsChanged { id: 20 }).await.unwrap();
        capture.capture(&mut queue, Mutation::TermsChanged { id: 21 }).await.unwrap();
        assert_eq!(queue.drain(), vec![20]);
    }
}

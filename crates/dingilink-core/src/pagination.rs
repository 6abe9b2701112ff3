//! Keyset pagination over chat history
//!
//! A page is a slice of the history in descending id order. The cursor is the
//! id of the last item of the previous page, and the next page holds items
//! strictly older than it.

use std::time::Instant;

use dingilink_common::{DingilinkError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::message::{Message, MessageRecord};
use crate::traits::MessageHistory;
use crate::types::{ChatTarget, MessageId, UserId};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_LIMIT: i64 = 30;

/// Opaque pagination cursor; textually the decimal id of the boundary item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(pub MessageId);

impl Cursor {
    pub fn parse(raw: &str) -> Result<Self> {
        raw.parse::<i64>()
            .map(|id| Cursor(MessageId(id)))
            .map_err(|_| DingilinkError::InvalidCursor(raw.to_string()))
    }

    pub fn encode(self) -> String {
        self.0.to_string()
    }
}

/// One item of a page with its own cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// A bounded slice of history plus the boundary flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }

    /// Convert every node, failing the whole page on the first error
    pub fn try_map<U, F>(self, mut f: F) -> Result<Page<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        let edges = self
            .edges
            .into_iter()
            .map(|edge| {
                Ok(Edge {
                    node: f(edge.node)?,
                    cursor: edge.cursor,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            edges,
            page_info: self.page_info,
        })
    }
}

/// Parameters of one history query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub target: ChatTarget,
    pub viewer: UserId,
    pub before: Option<Cursor>,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(target: ChatTarget, viewer: UserId) -> Self {
        Self {
            target,
            viewer,
            before: None,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn before(mut self, cursor: Cursor) -> Self {
        self.before = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Fetch one page of raw records.
///
/// The boundary checks only run when the page is non-empty: `has_next_page`
/// asks for anything older than the last item, `has_previous_page` for
/// anything newer than the first.
#[instrument(level = "debug", skip(history))]
pub async fn paginate<H>(history: &H, request: PageRequest) -> Result<Page<MessageRecord>>
where
    H: MessageHistory + ?Sized,
{
    let start = Instant::now();

    if request.limit <= 0 {
        return Err(DingilinkError::Validation(format!(
            "page limit must be positive, got {}",
            request.limit
        )));
    }

    let records = history
        .fetch_page(
            request.target,
            request.viewer,
            request.before.map(|cursor| cursor.0),
            request.limit,
        )
        .await?;

    let (first_id, last_id) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first.id, last.id),
        _ => {
            debug!("🔧 Empty page for {} in {:?}", request.target, start.elapsed());
            return Ok(Page::empty());
        }
    };

    let has_next_page = history
        .has_older(request.target, request.viewer, last_id)
        .await?;
    let has_previous_page = history
        .has_newer(request.target, request.viewer, first_id)
        .await?;

    let edges: Vec<_> = records
        .into_iter()
        .map(|record| Edge {
            cursor: Cursor(record.id).encode(),
            node: record,
        })
        .collect();

    debug!(
        "✅ Page of {} for {} in {:?}",
        edges.len(),
        request.target,
        start.elapsed()
    );

    Ok(Page {
        edges,
        page_info: PageInfo {
            end_cursor: Some(Cursor(last_id).encode()),
            has_next_page,
            has_previous_page,
        },
    })
}

/// Fetch one page and build every record into a typed message
pub async fn paginate_messages<H>(history: &H, request: PageRequest) -> Result<Page<Message>>
where
    H: MessageHistory + ?Sized,
{
    paginate(history, request).await?.try_map(Message::build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A single-chat history with ids 1..=n
    struct FixedHistory {
        ids: Vec<i64>,
        boundary_checks: AtomicUsize,
    }

    impl FixedHistory {
        fn with_messages(n: i64) -> Self {
            Self {
                ids: (1..=n).collect(),
                boundary_checks: AtomicUsize::new(0),
            }
        }

        fn record(id: i64) -> MessageRecord {
            MessageRecord {
                id: MessageId(id),
                sender_id: UserId(1),
                recipient_id: Some(UserId(2)),
                group_id: None,
                message_type: "text".to_string(),
                text_content: Some(format!("message {id}")),
                media: None,
                location: None,
                reply_for_message_id: None,
                sent_at: Utc::now(),
                deleted_at: None,
                deleted_by: None,
            }
        }
    }

    #[async_trait]
    impl MessageHistory for FixedHistory {
        async fn fetch_page(
            &self,
            _target: ChatTarget,
            _viewer: UserId,
            before: Option<MessageId>,
            limit: i64,
        ) -> Result<Vec<MessageRecord>> {
            Ok(self
                .ids
                .iter()
                .rev()
                .filter(|id| before.map_or(true, |b| **id < b.0))
                .take(limit as usize)
                .map(|id| Self::record(*id))
                .collect())
        }

        async fn has_older(&self, _: ChatTarget, _: UserId, before_id: MessageId) -> Result<bool> {
            self.boundary_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.ids.iter().any(|id| *id < before_id.0))
        }

        async fn has_newer(&self, _: ChatTarget, _: UserId, after_id: MessageId) -> Result<bool> {
            self.boundary_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.ids.iter().any(|id| *id > after_id.0))
        }
    }

    fn request() -> PageRequest {
        PageRequest::new(ChatTarget::Direct(UserId(2)), UserId(1))
    }

    #[tokio::test]
    async fn test_forty_messages_in_two_pages() {
        let history = FixedHistory::with_messages(40);

        let first = paginate(&history, request()).await.unwrap();
        assert_eq!(first.len(), 30);
        assert_eq!(first.edges[0].node.id, MessageId(40));
        assert!(first.page_info.has_next_page);
        assert!(!first.page_info.has_previous_page);
        assert_eq!(first.page_info.end_cursor.as_deref(), Some("11"));

        let cursor = Cursor::parse(first.page_info.end_cursor.as_deref().unwrap()).unwrap();
        let second = paginate(&history, request().before(cursor)).await.unwrap();
        assert_eq!(second.len(), 10);
        assert_eq!(second.edges[0].node.id, MessageId(10));
        assert!(!second.page_info.has_next_page);
        assert!(second.page_info.has_previous_page);
        assert_eq!(second.page_info.end_cursor.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_empty_page_skips_boundary_checks() {
        let history = FixedHistory::with_messages(0);

        let page = paginate(&history, request()).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.page_info, PageInfo::default());
        assert_eq!(history.boundary_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cursor_past_the_end_yields_empty_page() {
        let history = FixedHistory::with_messages(5);
        let page = paginate(&history, request().before(Cursor(MessageId(1))))
            .await
            .unwrap();
        assert!(page.is_empty());
        assert!(page.page_info.end_cursor.is_none());
    }

    #[tokio::test]
    async fn test_non_positive_limit_is_rejected() {
        let history = FixedHistory::with_messages(5);
        let err = paginate(&history, request().limit(0)).await.unwrap_err();
        assert!(matches!(err, DingilinkError::Validation(_)));
    }

    #[tokio::test]
    async fn test_paginate_messages_builds_variants() {
        let history = FixedHistory::with_messages(3);
        let page = paginate_messages(&history, request()).await.unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.nodes().all(|message| message.kind_name() == "text"));
    }

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(Cursor::parse("11").unwrap(), Cursor(MessageId(11)));
        assert_eq!(Cursor(MessageId(11)).encode(), "11");
        assert!(matches!(
            Cursor::parse("eleven"),
            Err(DingilinkError::InvalidCursor(_))
        ));
        assert!(matches!(Cursor::parse(""), Err(DingilinkError::InvalidCursor(_))));
        for padded in [" 11", "11 ", " 11 ", "11\n"] {
            assert_eq!(
                Cursor::parse(padded),
                Err(DingilinkError::InvalidCursor(padded.to_string()))
            );
        }
    }
}

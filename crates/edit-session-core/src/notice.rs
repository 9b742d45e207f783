// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded notice queue with dedupe, drained by the host's toast layer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note.
    Info,
    /// Recoverable problem (malformed input, validation).
    Warn,
    /// Failed operation (transport).
    Error,
}

/// What a notice is about; part of the dedupe key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeTopic {
    /// Edit rejected by the authorization gate.
    AccessDenied,
    /// A field's raw value could not be read.
    MalformedInput {
        /// Field name.
        field: String,
    },
    /// Submission blocked by local validation.
    Validation,
    /// An upload failed.
    Upload {
        /// Field name.
        field: String,
    },
    /// Load, save, delete or lookup failed.
    Transport,
    /// Save or delete succeeded.
    Saved,
}

/// Identifier for a notice entry.
pub type NoticeId = u64;

/// One message for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Topic.
    pub topic: NoticeTopic,
    /// Short title line.
    pub title: String,
    /// Optional body text.
    pub body: Option<String>,
    /// Creation (or last refresh) time.
    pub created: Instant,
}

/// In-memory notice queue. Oldest entries are dropped once `max` is reached.
#[derive(Debug)]
pub struct NoticeQueue {
    queue: VecDeque<Notice>,
    max: usize,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl NoticeQueue {
    /// Create a queue holding at most `max` notices.
    pub fn new(max: usize, dedupe_window: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window,
            next_id: 1,
        }
    }

    /// Push a notice, refreshing an identical one (same kind/topic/title/body)
    /// seen within the dedupe window instead of adding a duplicate.
    pub fn push<S, B>(
        &mut self,
        kind: NoticeKind,
        topic: NoticeTopic,
        title: S,
        body: B,
        now: Instant,
    ) -> NoticeId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let title = title.into();
        let body = body.into();

        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.topic == topic
                && n.title == title
                && n.body == body
                && now.saturating_duration_since(n.created) <= self.dedupe_window
        }) {
            existing.created = now;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            id,
            kind,
            topic,
            title,
            body,
            created: now,
        });
        id
    }

    /// Pending notices, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    /// Remove and return every pending notice.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }

    /// Number of pending notices.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

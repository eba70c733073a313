//! Message page store: the definitive, gap-free, time-ordered window of one
//! conversation's messages.
//!
//! Pages arrive from the store newest-first and are held oldest-first for
//! display. Live insert events are merged idempotently and placed by creation
//! timestamp, since delivery order is not guaranteed to match creation order
//! under clock skew or transport reordering.

use crate::store::Message;

pub(crate) struct MessagePages {
    messages: Vec<Message>,
    has_more: bool,
    loading_older: bool,
    page_size: usize,
}

impl MessagePages {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            has_more: false,
            loading_older: false,
            page_size,
        }
    }

    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn has_more(&self) -> bool {
        self.has_more
    }

    /// Replace the window with the newest page (delivered descending by
    /// creation time; stored ascending).
    pub(crate) fn apply_initial(&mut self, mut page_desc: Vec<Message>) {
        self.has_more = page_desc.len() == self.page_size;
        page_desc.reverse();
        self.messages = page_desc;
        self.loading_older = false;
    }

    /// Start an older-page fetch. Returns the exclusive cursor (creation
    /// timestamp of the oldest held message), or `None` when the window is
    /// empty or a fetch is already in flight — the caller must treat `None`
    /// as a no-op. The in-flight flag serializes concurrent loads.
    pub(crate) fn begin_older(&mut self) -> Option<i64> {
        if self.loading_older {
            return None;
        }
        let cursor = self.messages.first().map(|m| m.created_at)?;
        self.loading_older = true;
        Some(cursor)
    }

    /// Prepend an older page (delivered descending). `has_more` is recomputed
    /// from the raw page length before dedup.
    pub(crate) fn apply_older(&mut self, mut page_desc: Vec<Message>) {
        self.has_more = page_desc.len() == self.page_size;
        self.loading_older = false;
        page_desc.reverse();
        page_desc.retain(|m| !self.contains(&m.id));
        page_desc.append(&mut self.messages);
        self.messages = page_desc;
    }

    /// Clear the in-flight flag after a failed older-page fetch, leaving the
    /// window untouched so the operation can be retried.
    pub(crate) fn abort_older(&mut self) {
        self.loading_older = false;
    }

    /// Merge a live insert event. Returns false for duplicate identifiers —
    /// duplicate delivery must not duplicate content. Out-of-order arrivals
    /// are placed by `(created_at, id)` to keep the window ascending.
    pub(crate) fn merge_insert(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        let at = self.messages.partition_point(|m| {
            (m.created_at, m.id.as_str()) <= (message.created_at, message.id.as_str())
        });
        self.messages.insert(at, message);
        true
    }

    /// Replace the stored message with a matching identifier in place (read
    /// receipt propagation). Unknown identifiers are a silent no-op.
    pub(crate) fn apply_update(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of items rendered on a single status page
pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

/// Stable external identifier of a collaborating group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Toggles stored on a session.
///
/// Mutually exclusive pairs (`Loop`/`LoopQueue`) are enforced by the commands
/// that flip them, not by the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionFlag {
    Loop,
    LoopQueue,
    Editing,
    Expanded,
    StopRequest,
    ClearRequest,
}

/// A single entry of the session's item list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: Option<String>,
}

impl Item {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} <{}>", self.title, url),
            None => f.write_str(&self.title),
        }
    }
}

/// Per-group coordination state.
///
/// The head of `items` is the item currently playing; `offset` pages through
/// the items that follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Session {
    pub session_id: SessionId,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub message_id: Option<String>,
    pub offset: usize,
    pub flags: Vec<SessionFlag>,
    pub items: Vec<Item>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<SessionId>, channel_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            channel_id: channel_id.into(),
            thread_id: None,
            message_id: None,
            offset: 0,
            flags: Vec::new(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_items<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = Item>,
    {
        self.items.extend(items);
        self
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn head(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn has_flag(&self, flag: SessionFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn set_flag(&mut self, flag: SessionFlag) {
        if !self.has_flag(flag) {
            self.flags.push(flag);
        }
    }

    pub fn remove_flag(&mut self, flag: SessionFlag) {
        self.flags.retain(|f| *f != flag);
    }

    /// Flip `flag` and return whether it is now set
    pub fn toggle_flag(&mut self, flag: SessionFlag) -> bool {
        if self.has_flag(flag) {
            self.remove_flag(flag);
            false
        } else {
            self.flags.push(flag);
            true
        }
    }

    /// Items after the head that are visible on the current page
    pub fn page(&self, per_page: usize) -> &[Item] {
        let rest = self.items.get(1..).unwrap_or_default();
        let start = self.offset.min(rest.len());
        let end = (start + per_page).min(rest.len());
        &rest[start..end]
    }

    pub fn can_page_forward(&self, per_page: usize) -> bool {
        self.size().saturating_sub(1) > per_page
    }

    pub fn can_page_backward(&self) -> bool {
        self.offset > 0
    }

    /// Advance the paging cursor, wrapping to the first page after the last one
    pub fn page_forward(&mut self, per_page: usize) -> bool {
        if !self.can_page_forward(per_page) {
            return false;
        }
        self.offset += per_page;
        if self.offset >= self.size() - 1 {
            self.offset = 0;
        }
        true
    }

    pub fn page_backward(&mut self, per_page: usize) -> bool {
        if !self.can_page_backward() {
            return false;
        }
        self.offset = self.offset.saturating_sub(per_page);
        true
    }

    /// Pull the cursor back inside the item list after removals
    pub fn normalize_offset(&mut self, per_page: usize) {
        if per_page == 0 {
            self.offset = 0;
            return;
        }
        while self.offset > 0 && self.offset + 1 >= self.size() {
            self.offset = self.offset.saturating_sub(per_page);
        }
    }

    /// Move past the head item, honouring the loop flags.
    ///
    /// Returns the new head, if any.
    pub fn advance(&mut self) -> Option<&Item> {
        if self.items.is_empty() {
            return None;
        }
        if self.has_flag(SessionFlag::Loop) {
            return self.items.first();
        }
        let previous = self.items.remove(0);
        if self.has_flag(SessionFlag::LoopQueue) {
            self.items.push(previous);
        }
        self.items.first()
    }
}

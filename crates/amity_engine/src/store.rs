use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{ActorId, BookmarkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: String,
    pub content: String,
    /// Permalink: the original URL.
    pub guid: String,
    pub date: DateTime<Utc>,
    pub visibility: Visibility,
    pub actor: ActorId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub content: String,
    pub guid: String,
    pub date: DateTime<Utc>,
    pub visibility: Visibility,
    pub actor: ActorId,
}

/// Storage for extracted bookmarks. The narrow surface keeps the backing
/// CMS out of the core.
pub trait ContentStore: Send + Sync {
    fn find_by_url(&self, url: &str, actor: ActorId) -> Option<BookmarkId>;
    fn create(&self, bookmark: NewBookmark) -> BookmarkId;
    fn get(&self, id: BookmarkId) -> Option<Bookmark>;
}

#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    inner: Mutex<ContentInner>,
}

#[derive(Debug, Default)]
struct ContentInner {
    next_id: BookmarkId,
    bookmarks: HashMap<BookmarkId, Bookmark>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for InMemoryContentStore {
    fn find_by_url(&self, url: &str, actor: ActorId) -> Option<BookmarkId> {
        let inner = self.inner.lock().unwrap();
        inner
            .bookmarks
            .values()
            .find(|bookmark| bookmark.guid == url && bookmark.actor == actor)
            .map(|bookmark| bookmark.id)
    }

    fn create(&self, bookmark: NewBookmark) -> BookmarkId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.bookmarks.insert(
            id,
            Bookmark {
                id,
                title: bookmark.title,
                content: bookmark.content,
                guid: bookmark.guid,
                date: bookmark.date,
                visibility: bookmark.visibility,
                actor: bookmark.actor,
            },
        );
        id
    }

    fn get(&self, id: BookmarkId) -> Option<Bookmark> {
        self.inner.lock().unwrap().bookmarks.get(&id).cloned()
    }
}

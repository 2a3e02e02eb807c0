use std::sync::Arc;

use amity_logging::{amity_debug, amity_info, amity_warn};
use chrono::Utc;
use url::Url;

use crate::extract::ContentExtractor;
use crate::fetch::Fetcher;
use crate::site_config::SiteConfigResolver;
use crate::store::{ContentStore, NewBookmark, Visibility};
use crate::{decode::decode_body, ActorId, BookmarkError, BookmarkId, ExtractedItem};

/// Identifying user agent for bookmark downloads. Site-config headers can
/// override it.
pub const BOOKMARK_USER_AGENT: &str = "Amity Bookmarks";

/// Orchestrates one bookmark save: validate, resolve config, download,
/// extract, persist.
pub struct BookmarkSaver {
    fetcher: Arc<dyn Fetcher>,
    resolver: SiteConfigResolver,
    store: Arc<dyn ContentStore>,
    extractor: ContentExtractor,
}

impl BookmarkSaver {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        resolver: SiteConfigResolver,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            store,
            extractor: ContentExtractor,
        }
    }

    pub async fn save_bookmark(
        &self,
        url: &str,
        actor: ActorId,
    ) -> Result<BookmarkId, BookmarkError> {
        validate_http_url(url)?;

        // Idempotent re-save: an existing item for this URL and actor wins
        // without touching the network.
        if let Some(existing) = self.store.find_by_url(url, actor) {
            amity_debug!("bookmark for {url} already stored as {existing}");
            return Ok(existing);
        }

        let item = self.download(url).await?;

        if item.title.is_empty() && item.content.is_empty() {
            return Err(BookmarkError::InvalidContent);
        }

        let id = self.store.create(NewBookmark {
            title: item.title.trim().to_string(),
            content: item.content.trim().to_string(),
            guid: item.url,
            date: Utc::now(),
            visibility: Visibility::Private,
            actor,
        });
        amity_info!("stored bookmark {id} for {url}");
        Ok(id)
    }

    /// Download and extract one page, with site-config headers applied.
    pub async fn download(&self, url: &str) -> Result<ExtractedItem, BookmarkError> {
        let config = self.resolver.resolve(url).await;

        let mut headers = vec![("user-agent".to_string(), BOOKMARK_USER_AGENT.to_string())];
        if let Some(config) = &config {
            headers.extend(config.http_headers.iter().cloned());
        }

        let response = self.fetcher.get(url, &headers).await.map_err(|err| {
            amity_warn!("could not download {url}: {err}");
            BookmarkError::CouldNotDownload
        })?;

        let html = decode_body(&response.bytes, response.content_type.as_deref());
        let extracted = self.extractor.extract(&html, config.as_ref());
        Ok(ExtractedItem {
            title: extracted.title,
            content: extracted.content,
            date: extracted.date,
            url: url.to_string(),
        })
    }
}

fn validate_http_url(url: &str) -> Result<(), BookmarkError> {
    let parsed = Url::parse(url).map_err(|_| BookmarkError::InvalidUrl)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BookmarkError::InvalidUrl);
    }
    if parsed.host_str().is_none() {
        return Err(BookmarkError::InvalidUrl);
    }
    Ok(())
}

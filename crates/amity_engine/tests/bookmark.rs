use std::sync::Arc;

use amity_engine::{
    BookmarkError, BookmarkSaver, ContentStore, FetchSettings, InMemoryContentStore,
    ReqwestFetcher, SiteConfigResolver, Visibility, BOOKMARK_USER_AGENT,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(amity_logging::initialize_for_tests);
}

const PAGE: &str = concat!(
    "<html><head><title>Fallback</title></head><body>",
    "<h1>Big News</h1>",
    r#"<div class="article"><p>The story.</p></div>"#,
    "</body></html>"
);

/// Saver wired to a mock server; rule files are expected under `/configs`.
fn saver_for(server: &MockServer) -> (BookmarkSaver, Arc<InMemoryContentStore>) {
    let fetcher = Arc::new(ReqwestFetcher::new(FetchSettings::default()));
    let resolver = SiteConfigResolver::with_base(
        fetcher.clone(),
        format!("{}/configs", server.uri()),
    );
    let store = Arc::new(InMemoryContentStore::new());
    let saver = BookmarkSaver::new(fetcher, resolver, store.clone());
    (saver, store)
}

#[tokio::test]
async fn saving_stores_a_private_extracted_bookmark() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .and(header("user-agent", BOOKMARK_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .mount(&server)
        .await;

    let (saver, store) = saver_for(&server);
    let url = format!("{}/article", server.uri());
    let id = saver.save_bookmark(&url, 7).await.unwrap();

    let bookmark = store.get(id).expect("bookmark should be stored");
    assert_eq!(bookmark.title, "Big News");
    assert_eq!(bookmark.content, "The story.");
    assert_eq!(bookmark.guid, url);
    assert_eq!(bookmark.visibility, Visibility::Private);
    assert_eq!(bookmark.actor, 7);
}

#[tokio::test]
async fn resaving_the_same_url_is_idempotent() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let (saver, _store) = saver_for(&server);
    let url = format!("{}/article", server.uri());
    let first = saver.save_bookmark(&url, 1).await.unwrap();
    let second = saver.save_bookmark(&url, 1).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn the_same_url_is_stored_separately_per_actor() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .mount(&server)
        .await;

    let (saver, _store) = saver_for(&server);
    let url = format!("{}/article", server.uri());
    let first = saver.save_bookmark(&url, 1).await.unwrap();
    let second = saver.save_bookmark(&url, 2).await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn invalid_urls_are_rejected_without_io() {
    init_logging();
    let server = MockServer::start().await;
    let (saver, _store) = saver_for(&server);

    assert_eq!(
        saver.save_bookmark("not a url", 1).await,
        Err(BookmarkError::InvalidUrl)
    );
    assert_eq!(
        saver.save_bookmark("ftp://example.com/file", 1).await,
        Err(BookmarkError::InvalidUrl)
    );
}

#[tokio::test]
async fn pages_without_title_or_content_are_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("", "text/html"))
        .mount(&server)
        .await;

    let (saver, _store) = saver_for(&server);
    let url = format!("{}/empty", server.uri());
    assert_eq!(
        saver.save_bookmark(&url, 1).await,
        Err(BookmarkError::InvalidContent)
    );
}

#[tokio::test]
async fn download_failures_map_to_could_not_download() {
    init_logging();
    let server = MockServer::start().await;
    let (saver, _store) = saver_for(&server);
    let url = format!("{}/gone", server.uri());
    assert_eq!(
        saver.save_bookmark(&url, 1).await,
        Err(BookmarkError::CouldNotDownload)
    );
}

#[tokio::test]
async fn site_config_headers_are_sent_with_the_page_request() {
    init_logging();
    let server = MockServer::start().await;
    // Rule file for the mock server's own host.
    Mock::given(method("GET"))
        .and(path("/configs/127.0.0.1.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("http_header(X-Amity-Check): yes\n", "text/plain"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .and(header("user-agent", BOOKMARK_USER_AGENT))
        .and(header("x-amity-check", "yes"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let (saver, store) = saver_for(&server);
    let url = format!("{}/article", server.uri());
    let id = saver.save_bookmark(&url, 1).await.unwrap();
    assert_eq!(store.get(id).unwrap().title, "Big News");
}

#[tokio::test]
async fn download_returns_the_extracted_item_without_storing() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
        .mount(&server)
        .await;

    let (saver, store) = saver_for(&server);
    let url = format!("{}/article", server.uri());
    let item = saver.download(&url).await.unwrap();
    assert_eq!(item.title, "Big News");
    assert_eq!(item.content, "The story.");
    assert_eq!(item.url, url);
    assert!(store.find_by_url(&url, 1).is_none());
}

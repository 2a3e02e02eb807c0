//! Amity engine: IO pipeline for bookmark extraction and the friend
//! handshake.
mod bookmark;
mod dates;
mod decode;
mod extract;
mod fetch;
mod handshake;
mod identity;
mod sanitize;
mod site_config;
mod store;
mod token;
mod types;

pub use bookmark::{BookmarkSaver, BOOKMARK_USER_AGENT};
pub use dates::parse_loose;
pub use decode::decode_body;
pub use extract::{ContentExtractor, ExtractedContent};
pub use fetch::{FetchResponse, FetchSettings, Fetcher, HandshakeTransport, ReqwestFetcher};
pub use handshake::{
    AcceptReply, AcceptRequest, FriendRequest, FriendRequestReply, HandshakeConfig,
    HandshakeService, FRIEND_REQUEST_ACCEPTED_PATH, FRIEND_REQUEST_PATH,
};
pub use identity::{
    login_for_site_url, Identity, IdentityStore, InMemoryIdentityStore, TokenKind,
};
pub use sanitize::{sanitize_html, strip_tags};
pub use site_config::{SiteConfigResolver, DEFAULT_CONFIG_BASE};
pub use store::{Bookmark, ContentStore, InMemoryContentStore, NewBookmark, Visibility};
pub use token::{generate_token, site_key};
pub use types::{
    ActorId, BookmarkError, BookmarkId, ExtractedItem, FetchError, FetchFailure, HandshakeError,
    IdentityId,
};

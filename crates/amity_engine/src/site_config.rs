use std::sync::Arc;

use amity_logging::amity_debug;
use amity_core::{config_filenames, SiteConfig};

use crate::decode::decode_body;
use crate::fetch::Fetcher;

/// Where per-site rule files are published. Overridable for mirrors and
/// tests.
pub const DEFAULT_CONFIG_BASE: &str =
    "https://raw.githubusercontent.com/fivefilters/ftr-site-config/master";

/// Resolves the extraction overrides for a URL by trying the candidate
/// rule filenames against a remote rule-file collection.
pub struct SiteConfigResolver {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
}

impl SiteConfigResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_base(fetcher, DEFAULT_CONFIG_BASE)
    }

    pub fn with_base(fetcher: Arc<dyn Fetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Fetch and parse the first resolvable candidate. Every failure is
    /// silent; `None` tells the caller to extract with defaults.
    pub async fn resolve(&self, url: &str) -> Option<SiteConfig> {
        for filename in config_filenames(url) {
            let target = format!("{}/{}", self.base_url.trim_end_matches('/'), filename);
            let response = match self.fetcher.get(&target, &[]).await {
                Ok(response) => response,
                Err(err) => {
                    amity_debug!("no site config at {target}: {err}");
                    continue;
                }
            };
            let text = decode_body(&response.bytes, response.content_type.as_deref());
            if text.trim().is_empty() {
                continue;
            }
            return Some(SiteConfig::parse(&text));
        }
        None
    }
}

use url::Url;

/// Per-domain extraction overrides, parsed from a remote rule file.
///
/// All fields default to "not configured"; the extractor supplies built-in
/// queries for anything left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteConfig {
    /// Query expression selecting the title element(s).
    pub title: Option<String>,
    /// Query expression selecting the body element(s).
    pub body: Option<String>,
    /// Query expression selecting the date element(s).
    pub date: Option<String>,
    /// Verbatim search/replace pairs applied to the raw HTML, in file order.
    pub replace: Vec<(String, String)>,
    /// Extra request headers, keyed by the name inside `http_header(...)`.
    pub http_headers: Vec<(String, String)>,
    /// Query expressions whose matches are removed from the document.
    pub strip: Vec<String>,
    /// Class/id substrings whose matching elements are removed.
    pub strip_id_or_class: Vec<String>,
}

impl SiteConfig {
    /// Parses the line-oriented `key: value` rule DSL.
    ///
    /// Lines without a `:` and lines whose first non-whitespace character is
    /// `#` are skipped. Keys are case-insensitive. A `replace_string` line
    /// pairs with the most recent `find_string`; with no pending search it is
    /// dropped silently.
    pub fn parse(text: &str) -> Self {
        let mut config = SiteConfig::default();
        let mut search: Option<String> = None;

        for line in text.lines() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "find_string" => search = Some(value.to_string()),
                "replace_string" => {
                    if let Some(pending) = search.take() {
                        config.replace.push((pending, value.to_string()));
                    }
                }
                // Scalar queries: the last occurrence wins.
                "title" => config.title = Some(value.to_string()),
                "date" => config.date = Some(value.to_string()),
                "body" => config.body = Some(value.to_string()),
                "strip" => config.strip.push(value.to_string()),
                "strip_id_or_class" => config.strip_id_or_class.push(value.to_string()),
                other => {
                    if let Some(name) = other
                        .strip_prefix("http_header(")
                        .and_then(|rest| rest.strip_suffix(')'))
                    {
                        config
                            .http_headers
                            .push((name.to_string(), value.to_string()));
                    }
                }
            }
        }

        config
    }
}

/// Candidate rule-file names for a URL, most specific first.
///
/// The host (minus a leading `www.`) yields `{host}.txt`; hosts with more
/// than one dot additionally yield the broader `{from-first-dot}.txt` shared
/// config. No public-suffix awareness: `example.co.uk` falls back to
/// `.co.uk.txt`, matching the upstream rule-file convention.
pub fn config_filenames(url: &str) -> Vec<String> {
    let host = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(ToOwned::to_owned))
        .unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut filenames = vec![format!("{host}.txt")];
    if host.matches('.').count() > 1 {
        if let Some(first_dot) = host.find('.') {
            filenames.push(format!("{}.txt", &host[first_dot..]));
        }
    }
    filenames
}

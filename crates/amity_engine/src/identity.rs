use std::collections::HashMap;
use std::sync::Mutex;

use amity_core::TrustLevel;

use crate::{HandshakeError, IdentityId};

/// A local record standing in for a remote site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    pub login: String,
    pub site_url: String,
    pub trust: TrustLevel,
}

/// The token slots attached to an identity. `In` and `Out` outlive the
/// handshake; the other two are transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Minted locally; the peer presents it to read our feed.
    In,
    /// Received from the peer; presented when reading their feed.
    Out,
    /// The receiver-minted accept token for an in-flight handshake.
    RequestToken,
    /// The requester's signature for an in-flight handshake.
    AcceptSignature,
}

/// Derive the login under which a remote site is stored. Deterministic so
/// repeated contact with the same site resolves to the same identity.
pub fn login_for_site_url(site_url: &str) -> String {
    let trimmed = site_url.trim().trim_end_matches('/');
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let folded: String = without_scheme
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '.'
            }
        })
        .collect();
    format!("site.{folded}")
}

/// Identity and capability storage, plus the process-wide transient
/// handshake state (request tokens and the accept-token lookup).
pub trait IdentityStore: Send + Sync {
    fn find_by_login(&self, login: &str) -> Option<Identity>;
    fn get(&self, id: IdentityId) -> Option<Identity>;
    fn create(&self, site_url: &str, trust: TrustLevel) -> Identity;
    fn set_trust(&self, id: IdentityId, trust: TrustLevel);
    fn token(&self, id: IdentityId, kind: TokenKind) -> Option<String>;
    fn set_token(&self, id: IdentityId, kind: TokenKind, value: &str);
    fn delete_token(&self, id: IdentityId, kind: TokenKind);
    fn identity_count(&self) -> usize;
    fn identities_with_trust(&self, trust: TrustLevel) -> Vec<Identity>;

    /// Store the request signature minted when a request goes out, keyed by
    /// a digest of the peer URL.
    fn put_request_token(&self, site_key: &str, token: &str);
    /// Remove and return the transient request signature, if any.
    fn take_request_token(&self, site_key: &str) -> Option<String>;
    /// Record the global `accept token -> identity` entry.
    fn put_accept_lookup(&self, token: &str, id: IdentityId);
    /// Remove a registered accept-token entry, if present. Called when the
    /// handshake it belongs to ends without the token being redeemed.
    fn drop_accept_lookup(&self, token: &str);
    /// Atomically resolve and consume an accept token.
    ///
    /// Lookup, the caller's verification against the identity's stored
    /// accept signature, and deletion must happen under a single lock so
    /// two concurrent accept calls cannot both pass. On verification
    /// failure the entry is retained and nothing changes.
    fn redeem_accept_token(
        &self,
        token: &str,
        verify: &dyn Fn(&Identity, &str) -> bool,
    ) -> Result<IdentityId, HandshakeError>;
}

#[derive(Debug, Default)]
struct IdentityRecord {
    site_url: String,
    login: String,
    trust: TrustLevel,
    tokens: HashMap<TokenKind, String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: IdentityId,
    identities: HashMap<IdentityId, IdentityRecord>,
    logins: HashMap<String, IdentityId>,
    request_tokens: HashMap<String, String>,
    accept_lookup: HashMap<String, IdentityId>,
}

impl Inner {
    fn identity(&self, id: IdentityId) -> Option<Identity> {
        self.identities.get(&id).map(|record| Identity {
            id,
            login: record.login.clone(),
            site_url: record.site_url.clone(),
            trust: record.trust,
        })
    }
}

/// Single-mutex in-memory store. The one lock is what makes
/// `redeem_accept_token` the compare-and-delete primitive the handshake
/// relies on.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: Mutex<Inner>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn find_by_login(&self, login: &str) -> Option<Identity> {
        let inner = self.inner.lock().unwrap();
        let id = *inner.logins.get(login)?;
        inner.identity(id)
    }

    fn get(&self, id: IdentityId) -> Option<Identity> {
        self.inner.lock().unwrap().identity(id)
    }

    fn create(&self, site_url: &str, trust: TrustLevel) -> Identity {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let login = login_for_site_url(site_url);
        inner.identities.insert(
            id,
            IdentityRecord {
                site_url: site_url.to_string(),
                login: login.clone(),
                trust,
                tokens: HashMap::new(),
            },
        );
        inner.logins.insert(login.clone(), id);
        Identity {
            id,
            login,
            site_url: site_url.to_string(),
            trust,
        }
    }

    fn set_trust(&self, id: IdentityId, trust: TrustLevel) {
        if let Some(record) = self.inner.lock().unwrap().identities.get_mut(&id) {
            record.trust = trust;
        }
    }

    fn token(&self, id: IdentityId, kind: TokenKind) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .identities
            .get(&id)
            .and_then(|record| record.tokens.get(&kind).cloned())
    }

    fn set_token(&self, id: IdentityId, kind: TokenKind, value: &str) {
        if let Some(record) = self.inner.lock().unwrap().identities.get_mut(&id) {
            record.tokens.insert(kind, value.to_string());
        }
    }

    fn delete_token(&self, id: IdentityId, kind: TokenKind) {
        if let Some(record) = self.inner.lock().unwrap().identities.get_mut(&id) {
            record.tokens.remove(&kind);
        }
    }

    fn identity_count(&self) -> usize {
        self.inner.lock().unwrap().identities.len()
    }

    fn identities_with_trust(&self, trust: TrustLevel) -> Vec<Identity> {
        let inner = self.inner.lock().unwrap();
        let mut found: Vec<Identity> = inner
            .identities
            .keys()
            .filter_map(|&id| inner.identity(id))
            .filter(|identity| identity.trust == trust)
            .collect();
        found.sort_by_key(|identity| identity.id);
        found
    }

    fn put_request_token(&self, site_key: &str, token: &str) {
        self.inner
            .lock()
            .unwrap()
            .request_tokens
            .insert(site_key.to_string(), token.to_string());
    }

    fn take_request_token(&self, site_key: &str) -> Option<String> {
        self.inner.lock().unwrap().request_tokens.remove(site_key)
    }

    fn put_accept_lookup(&self, token: &str, id: IdentityId) {
        self.inner
            .lock()
            .unwrap()
            .accept_lookup
            .insert(token.to_string(), id);
    }

    fn drop_accept_lookup(&self, token: &str) {
        self.inner.lock().unwrap().accept_lookup.remove(token);
    }

    fn redeem_accept_token(
        &self,
        token: &str,
        verify: &dyn Fn(&Identity, &str) -> bool,
    ) -> Result<IdentityId, HandshakeError> {
        let mut inner = self.inner.lock().unwrap();
        let id = *inner
            .accept_lookup
            .get(token)
            .ok_or(HandshakeError::NotFound)?;
        let identity = inner.identity(id).ok_or(HandshakeError::NotFound)?;
        let signature = inner
            .identities
            .get(&id)
            .and_then(|record| record.tokens.get(&TokenKind::AcceptSignature).cloned())
            .ok_or(HandshakeError::NotFound)?;
        if !verify(&identity, &signature) {
            return Err(HandshakeError::VerificationFailed);
        }
        inner.accept_lookup.remove(token);
        Ok(id)
    }
}

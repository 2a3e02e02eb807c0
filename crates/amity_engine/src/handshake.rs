use std::sync::Arc;

use amity_logging::{amity_debug, amity_info, amity_warn, clear_request_id, set_request_id};
use amity_core::{
    accept_proof, transition, HandshakeAction, HandshakeEvent, RelationshipState, TrustLevel,
};
use serde::{Deserialize, Serialize};

use crate::fetch::HandshakeTransport;
use crate::identity::{login_for_site_url, Identity, IdentityStore, TokenKind};
use crate::token::{generate_token, site_key};
use crate::{HandshakeError, IdentityId};

/// Relative wire paths under the service namespace.
pub const FRIEND_REQUEST_PATH: &str = "friend-request";
pub const FRIEND_REQUEST_ACCEPTED_PATH: &str = "friend-request-accepted";

/// `POST {peer}/{ns}/friend-request`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub site_url: String,
    pub signature: String,
}

/// Reply to a friend request. `friend_request_pending` means the request
/// awaits operator approval; `friend` means the receiver had its own
/// request in flight and befriended directly. With neither field this is
/// the generic ack sent when incoming requests are disabled; the initiator
/// cannot tell the difference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_request_pending: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend: Option<String>,
}

/// `POST {peer}/{ns}/friend-request-accepted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub token: String,
    pub friend: String,
    pub proof: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptReply {
    pub friend: String,
}

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Our own public site URL, sent with outgoing requests.
    pub site_url: String,
    /// When false, inbound requests are acknowledged without creating any
    /// identity or token.
    pub accept_incoming: bool,
    /// Versioned wire namespace under which peers mount the endpoints.
    pub namespace: String,
}

impl HandshakeConfig {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            accept_incoming: true,
            namespace: "amity/v1".to_string(),
        }
    }
}

/// Wires the pure handshake state machine to an identity store and a
/// transport. One instance per local site.
pub struct HandshakeService {
    config: HandshakeConfig,
    identities: Arc<dyn IdentityStore>,
    transport: Arc<dyn HandshakeTransport>,
}

impl HandshakeService {
    pub fn new(
        config: HandshakeConfig,
        identities: Arc<dyn IdentityStore>,
        transport: Arc<dyn HandshakeTransport>,
    ) -> Self {
        Self {
            config,
            identities,
            transport,
        }
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    /// Initiate the handshake towards a peer. Returns the local identity
    /// standing in for it, at `PendingFriendRequest` (or `Friend` once the
    /// peer's reply has been recorded and the peer later approves).
    pub async fn send_friend_request(&self, peer_url: &str) -> Result<Identity, HandshakeError> {
        let identity = self.find_or_create(peer_url, TrustLevel::PendingFriendRequest);
        if identity.trust == TrustLevel::Friend {
            amity_debug!("already friends with {peer_url}");
            return Ok(identity);
        }

        let signature = generate_token();
        self.identities
            .put_request_token(&site_key(peer_url), &signature);

        let state = self.relationship_state(identity.id);
        let (state, actions) = transition(state, HandshakeEvent::SendRequest { signature })?;
        self.apply(identity.id, &state);

        for action in actions {
            if let HandshakeAction::CallRequest { signature } = action {
                self.deliver_request(&identity, peer_url, signature).await?;
            }
        }

        self.identities.get(identity.id).ok_or(HandshakeError::NotFound)
    }

    async fn deliver_request(
        &self,
        identity: &Identity,
        peer_url: &str,
        signature: String,
    ) -> Result<(), HandshakeError> {
        let body = serde_json::json!(FriendRequest {
            site_url: self.config.site_url.clone(),
            signature,
        });
        let reply = self
            .transport
            .post_json(&self.endpoint(peer_url, FRIEND_REQUEST_PATH), body)
            .await;
        // The outgoing request is no longer in flight, delivered or not.
        let _ = self.identities.take_request_token(&site_key(peer_url));
        let reply = reply.map_err(|err| {
            amity_warn!("friend request to {peer_url} failed: {err}");
            HandshakeError::PeerUnreachable(err.to_string())
        })?;
        let reply: FriendRequestReply = serde_json::from_value(reply).unwrap_or_default();

        let state = self.relationship_state(identity.id);
        let (state, actions) = transition(
            state,
            HandshakeEvent::RequestAcknowledged {
                accept_token: reply.friend_request_pending,
                friend: reply.friend,
            },
        )?;
        self.apply(identity.id, &state);

        for action in actions {
            if let HandshakeAction::RegisterAcceptLookup { accept_token } = action {
                self.identities.put_accept_lookup(&accept_token, identity.id);
            }
        }
        Ok(())
    }

    /// Inbound half of the Request message.
    pub fn handle_friend_request(
        &self,
        request: &FriendRequest,
    ) -> Result<FriendRequestReply, HandshakeError> {
        set_request_id(site_key(&request.site_url));
        let result = self.handle_friend_request_inner(request);
        clear_request_id();
        result
    }

    fn handle_friend_request_inner(
        &self,
        request: &FriendRequest,
    ) -> Result<FriendRequestReply, HandshakeError> {
        // A request from a site we already know resolves against the stored
        // relationship before the incoming gate applies.
        if let Some(existing) = self
            .identities
            .find_by_login(&login_for_site_url(&request.site_url))
        {
            match existing.trust {
                // An established friendship is acknowledged, never demoted.
                TrustLevel::Friend => {
                    amity_debug!("friend request from established friend {}", request.site_url);
                    return Ok(FriendRequestReply::default());
                }
                TrustLevel::PendingFriendRequest => {
                    return self.handle_crossed_request(&existing, request);
                }
                TrustLevel::None | TrustLevel::FriendRequest => {}
            }
        }

        if !self.config.accept_incoming {
            // Silent no-op: no identity, no token, no hint for enumeration.
            amity_debug!("ignoring friend request from {}", request.site_url);
            return Ok(FriendRequestReply::default());
        }

        let identity = self.find_or_create(&request.site_url, TrustLevel::FriendRequest);
        let state = self.relationship_state(identity.id);
        let (state, actions) = transition(
            state,
            HandshakeEvent::RequestReceived {
                signature: request.signature.clone(),
                minted_accept_token: generate_token(),
            },
        )?;
        self.apply(identity.id, &state);
        amity_info!("friend request from {} recorded", request.site_url);

        for action in actions {
            if let HandshakeAction::ReplyPending { accept_token } = action {
                return Ok(FriendRequestReply {
                    friend_request_pending: Some(accept_token),
                    ..FriendRequestReply::default()
                });
            }
        }
        Ok(FriendRequestReply::default())
    }

    /// Both sides have requests in flight. Each operator's intent is
    /// already on record, so the handshake completes without approval,
    /// even when incoming requests are otherwise disabled: the inbound
    /// signature becomes the peer's read token and the reply carries ours.
    fn handle_crossed_request(
        &self,
        identity: &Identity,
        request: &FriendRequest,
    ) -> Result<FriendRequestReply, HandshakeError> {
        let state = self.relationship_state(identity.id);
        let (state, actions) = transition(
            state,
            HandshakeEvent::CrossedRequestReceived {
                signature: request.signature.clone(),
                minted_in_token: generate_token(),
            },
        )?;
        self.apply(identity.id, &state);
        // Our own outgoing request is superseded; drop its transient too.
        let _ = self
            .identities
            .take_request_token(&site_key(&identity.site_url));
        amity_info!(
            "crossed friend request from {}; befriending directly",
            request.site_url
        );

        let mut reply = FriendRequestReply::default();
        for action in actions {
            match action {
                HandshakeAction::DropAcceptLookup { accept_token } => {
                    self.identities.drop_accept_lookup(&accept_token);
                }
                HandshakeAction::ReplyFriend { in_token } => {
                    reply.friend = Some(in_token);
                }
                _ => {}
            }
        }
        Ok(reply)
    }

    /// Approve one pending incoming request: mint our read token, prove we
    /// saw the original signature, and complete against the peer's reply.
    pub async fn approve(&self, id: IdentityId) -> Result<(), HandshakeError> {
        let identity = self.identities.get(id).ok_or(HandshakeError::NotFound)?;

        let state = self.relationship_state(id);
        let (state, actions) = transition(
            state,
            HandshakeEvent::Approve {
                minted_in_token: generate_token(),
            },
        )?;
        self.apply(id, &state);

        for action in actions {
            if let HandshakeAction::CallAccept {
                token,
                friend,
                proof,
            } = action
            {
                self.deliver_accept(&identity, token, friend, proof).await?;
            }
        }
        Ok(())
    }

    async fn deliver_accept(
        &self,
        identity: &Identity,
        token: String,
        friend: String,
        proof: String,
    ) -> Result<(), HandshakeError> {
        let body = serde_json::json!(AcceptRequest {
            token,
            friend,
            proof,
        });
        let reply = self
            .transport
            .post_json(
                &self.endpoint(&identity.site_url, FRIEND_REQUEST_ACCEPTED_PATH),
                body,
            )
            .await
            .map_err(|err| {
                amity_warn!("accept call to {} failed: {err}", identity.site_url);
                HandshakeError::PeerUnreachable(err.to_string())
            })?;
        let reply: AcceptReply = serde_json::from_value(reply)
            .map_err(|_| HandshakeError::PeerRejected("malformed accept reply".to_string()))?;

        let state = self.relationship_state(identity.id);
        let (state, _) = transition(
            state,
            HandshakeEvent::AcceptAcknowledged {
                friend: reply.friend,
            },
        )?;
        self.apply(identity.id, &state);
        amity_info!("established friendship with {}", identity.site_url);
        Ok(())
    }

    /// Approve a batch of pending incoming requests. One bad id never
    /// aborts the batch; each entry reports its own outcome.
    pub async fn approve_batch(
        &self,
        ids: &[IdentityId],
    ) -> Vec<(IdentityId, Result<(), HandshakeError>)> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let outcome = self.approve(id).await;
            if let Err(err) = &outcome {
                amity_warn!("bulk approval of identity {id} failed: {err}");
            }
            results.push((id, outcome));
        }
        results
    }

    /// Inbound half of the Accept message, running on the original
    /// requester.
    pub fn handle_accept(&self, request: &AcceptRequest) -> Result<AcceptReply, HandshakeError> {
        set_request_id(request.token.clone());
        let result = self.handle_accept_inner(request);
        clear_request_id();
        result
    }

    fn handle_accept_inner(&self, request: &AcceptRequest) -> Result<AcceptReply, HandshakeError> {
        // Compare-and-delete: resolve, verify and consume the accept token
        // under one store lock. A replayed token is gone by now and maps to
        // NotFound; a bad proof leaves the entry (and all state) in place.
        let id = self.identities.redeem_accept_token(&request.token, &|_, signature| {
            request.proof == accept_proof(&request.token, signature)
        })?;

        let state = self.relationship_state(id);
        let (state, actions) = transition(
            state,
            HandshakeEvent::AcceptReceived {
                token: request.token.clone(),
                friend: request.friend.clone(),
                proof: request.proof.clone(),
                minted_in_token: generate_token(),
            },
        )?;
        self.apply(id, &state);
        amity_info!("accepted handshake for identity {id}");

        for action in actions {
            match action {
                // Already consumed by the atomic redeem above.
                HandshakeAction::DropAcceptLookup { .. } => {}
                HandshakeAction::ReplyFriend { in_token } => {
                    return Ok(AcceptReply { friend: in_token });
                }
                _ => {}
            }
        }
        Err(HandshakeError::InvalidState)
    }

    /// Tear a relationship down: trust, every stored secret, and any
    /// outstanding accept-token lookup are removed.
    pub fn remove(&self, id: IdentityId) -> Result<(), HandshakeError> {
        self.identities.get(id).ok_or(HandshakeError::NotFound)?;
        let state = self.relationship_state(id);
        let (state, actions) = transition(state, HandshakeEvent::Remove)?;
        self.apply(id, &state);
        for action in actions {
            if let HandshakeAction::DropAcceptLookup { accept_token } = action {
                self.identities.drop_accept_lookup(&accept_token);
            }
        }
        Ok(())
    }

    /// Pending incoming requests, for the approval surface.
    pub fn pending_incoming(&self) -> Vec<Identity> {
        self.identities.identities_with_trust(TrustLevel::FriendRequest)
    }

    fn endpoint(&self, peer_url: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            peer_url.trim_end_matches('/'),
            self.config.namespace,
            path
        )
    }

    fn find_or_create(&self, site_url: &str, trust: TrustLevel) -> Identity {
        match self.identities.find_by_login(&login_for_site_url(site_url)) {
            Some(existing) => existing,
            None => self.identities.create(site_url, trust),
        }
    }

    fn relationship_state(&self, id: IdentityId) -> RelationshipState {
        RelationshipState {
            trust: self
                .identities
                .get(id)
                .map(|identity| identity.trust)
                .unwrap_or_default(),
            accept_signature: self.identities.token(id, TokenKind::AcceptSignature),
            accept_token: self.identities.token(id, TokenKind::RequestToken),
            in_token: self.identities.token(id, TokenKind::In),
            out_token: self.identities.token(id, TokenKind::Out),
        }
    }

    fn apply(&self, id: IdentityId, state: &RelationshipState) {
        self.identities.set_trust(id, state.trust);
        self.write_token(id, TokenKind::AcceptSignature, state.accept_signature.as_deref());
        self.write_token(id, TokenKind::RequestToken, state.accept_token.as_deref());
        self.write_token(id, TokenKind::In, state.in_token.as_deref());
        self.write_token(id, TokenKind::Out, state.out_token.as_deref());
    }

    fn write_token(&self, id: IdentityId, kind: TokenKind, value: Option<&str>) {
        match value {
            Some(value) => self.identities.set_token(id, kind, value),
            None => self.identities.delete_token(id, kind),
        }
    }
}
